//! Rules file loading
//!
//! The rules file is a JSON object keyed by entity id, kept in file order:
//!
//! ```json
//! {
//!   "switch.kitchen": {
//!     "logic": [{"stat_name": "time", "value": 905, "action": "turn_on"}]
//!   }
//! }
//! ```
//!
//! Entries that cannot be used are skipped and reported; the rest still load.

use ha_core::{EntityId, Rule};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{ConfigError, ConfigResult};

/// Rules configured for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct EntityRules {
    pub entity_id: EntityId,
    pub rules: Vec<Rule>,
}

/// An entry left out of the result and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEntry {
    pub key: String,
    pub reason: String,
}

impl From<ConfigError> for SkippedEntry {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MalformedEntry { key, reason } => Self { key, reason },
            other => Self {
                key: String::new(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulesFile {
    /// Well-formed entries in file order
    pub entities: Vec<EntityRules>,
    pub skipped: Vec<SkippedEntry>,
}

impl RulesFile {
    pub fn rule_count(&self) -> usize {
        self.entities.iter().map(|e| e.rules.len()).sum()
    }
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    logic: Vec<Rule>,
}

/// Read and parse a rules file
///
/// A missing or unparseable file is an error; malformed entries are not.
pub fn load_rules(path: impl AsRef<Path>) -> ConfigResult<RulesFile> {
    let path = path.as_ref();
    debug!("Loading rules file: {:?}", path);

    let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    parse_rules(&content, path)
}

/// Parse rules JSON; `path` is only used in error messages
pub fn parse_rules(content: &str, path: &Path) -> ConfigResult<RulesFile> {
    let raw: IndexMap<String, Value> =
        serde_json::from_str(content).map_err(|e| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut file = RulesFile::default();
    for (key, value) in raw {
        match parse_entry(&key, value) {
            Ok(entry) => file.entities.push(entry),
            Err(err) => {
                warn!("Skipping rules entry: {}", err);
                file.skipped.push(err.into());
            }
        }
    }

    debug!(
        "Loaded {} rules for {} entities from {:?} ({} skipped)",
        file.rule_count(),
        file.entities.len(),
        path,
        file.skipped.len()
    );
    Ok(file)
}

fn parse_entry(key: &str, value: Value) -> ConfigResult<EntityRules> {
    let malformed = |reason: String| ConfigError::MalformedEntry {
        key: key.to_string(),
        reason,
    };

    let entity_id: EntityId = key.parse().map_err(|e| malformed(format!("{}", e)))?;
    let raw: RawEntry = serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;

    if let Some(rule) = raw.logic.iter().find(|r| r.stat_name.trim().is_empty()) {
        return Err(malformed(format!(
            "rule for action '{}' has an empty stat_name",
            rule.action
        )));
    }

    Ok(EntityRules {
        entity_id,
        rules: raw.logic,
    })
}
