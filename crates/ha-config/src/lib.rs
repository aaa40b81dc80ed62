//! Configuration loading for the stat rules engine
//!
//! Two inputs live in the config directory:
//!
//! - `configuration.yaml`, the server configuration, loaded through
//!   [`YamlLoader`] with support for these tags:
//!   - `!include path` - Include another YAML file
//!   - `!secret key` - Substitute from secrets.yaml
//!   - `!env_var VAR` - Environment variable substitution
//! - the rules file (JSON, default `lights_logic.json`) mapping entity ids
//!   to their stat rules
//!
//! # Example
//!
//! ```ignore
//! use ha_config::{load_rules, ServerConfig};
//!
//! let config = ServerConfig::load("/config")?;
//! let rules = load_rules(config.rules_path())?;
//! for skipped in &rules.skipped {
//!     eprintln!("skipped {}: {}", skipped.key, skipped.reason);
//! }
//! ```

mod error;
mod loader;
mod rules;
mod secrets;
mod server_config;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};
pub use rules::{load_rules, parse_rules, EntityRules, RulesFile, SkippedEntry};
pub use secrets::Secrets;
pub use server_config::{HomeAssistantConfig, ServerConfig, CONFIG_FILE};

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
