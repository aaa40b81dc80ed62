//! Entity state as reported by the remote instance

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of `GET /api/states`
///
/// The entity_id is kept as a plain string: the remote side may report
/// entities whose ids this crate would not accept as [`crate::EntityId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: String,

    /// The state value (e.g., "on", "off", "23.5", "unavailable")
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_changed: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl State {
    /// Whether the remote side currently considers the entity reachable
    pub fn is_available(&self) -> bool {
        self.state != crate::STATE_UNAVAILABLE
    }
}
