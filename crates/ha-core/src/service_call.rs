//! Service call sent to the remote Home Assistant instance

use crate::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request to run one service against one entity
///
/// Serialised on the wire as `POST /api/services/{domain}/{service}` with
/// [`ServiceCall::payload`] as the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    /// Service domain (e.g., "switch", "light", "cover")
    pub domain: String,

    /// Service name (e.g., "turn_on", "set_cover_position")
    pub service: String,

    /// Target entity
    pub entity_id: EntityId,

    /// Extra service data merged into the payload (e.g., `{"position": 50}`)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl ServiceCall {
    pub fn new(domain: impl Into<String>, service: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            entity_id,
            data: Map::new(),
        }
    }

    /// Attach extra service data
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// JSON body for the call
    ///
    /// `entity_id` always targets this call's entity, even if the extra data
    /// carries its own `entity_id` key.
    pub fn payload(&self) -> Value {
        let mut body = self.data.clone();
        body.insert(
            "entity_id".to_string(),
            Value::String(self.entity_id.to_string()),
        );
        Value::Object(body)
    }
}
