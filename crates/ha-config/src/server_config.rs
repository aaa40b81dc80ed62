//! Server configuration
//!
//! Parsed from `configuration.yaml` in the config directory.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

pub const CONFIG_FILE: &str = "configuration.yaml";

/// Connection to the Home Assistant instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeAssistantConfig {
    /// Base URL, e.g. `http://192.168.1.30:8123`
    pub url: String,

    /// Long-lived access token
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub homeassistant: HomeAssistantConfig,

    /// Rules file, relative to the config directory unless absolute
    #[serde(default = "default_rules")]
    pub rules: PathBuf,

    /// Seconds between evaluation passes
    #[serde(default = "default_interval")]
    pub interval: f64,

    /// Seconds allowed per action invocation
    #[serde(default = "default_action_timeout")]
    pub action_timeout: f64,

    /// Check configured entities against `/api/states` at startup
    #[serde(default = "default_verify_entities")]
    pub verify_entities: bool,

    #[serde(skip)]
    config_dir: PathBuf,
}

fn default_rules() -> PathBuf {
    PathBuf::from("lights_logic.json")
}

fn default_interval() -> f64 {
    1.0
}

fn default_action_timeout() -> f64 {
    10.0
}

fn default_verify_entities() -> bool {
    true
}

impl ServerConfig {
    /// Load `configuration.yaml` from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let config_dir = config_dir.as_ref();
        let yaml = load_yaml(config_dir, CONFIG_FILE)?;

        let mut config = Self::from_yaml(yaml)?;
        config.config_dir = config_dir.to_path_buf();
        Ok(config)
    }

    /// Parse and validate from an already loaded YAML value
    pub fn from_yaml(yaml: Value) -> ConfigResult<Self> {
        if !yaml.is_mapping() {
            return Err(ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: "configuration must be a mapping".to_string(),
            });
        }

        let config: ServerConfig =
            serde_yaml::from_value(yaml).map_err(|e| ConfigError::InvalidValue {
                key: "root".to_string(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        positive_seconds("interval", self.interval)?;
        positive_seconds("action_timeout", self.action_timeout)?;

        if self.homeassistant.url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "homeassistant.url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.homeassistant.token.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "homeassistant.token".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        seconds_or(self.interval, default_interval())
    }

    pub fn action_timeout(&self) -> Duration {
        seconds_or(self.action_timeout, default_action_timeout())
    }

    /// The rules file path resolved against the config directory
    pub fn rules_path(&self) -> PathBuf {
        if self.rules.is_absolute() {
            self.rules.clone()
        } else {
            self.config_dir.join(&self.rules)
        }
    }
}

fn positive_seconds(key: &str, value: f64) -> ConfigResult<()> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if !duration.is_zero() => Ok(()),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("must be a positive number of seconds, got {}", value),
        }),
    }
}

/// `value` seconds, or `fallback` seconds if out of range
fn seconds_or(value: f64, fallback: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_else(|_| Duration::from_secs_f64(fallback))
}
