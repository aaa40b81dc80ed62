//! YAML loader with Home Assistant style tags
//!
//! Supported tags:
//! - `!include path` - Replace the node with another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Substitute an environment variable

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// YAML loader rooted at a config directory
pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files currently being loaded, innermost last
    include_stack: Vec<PathBuf>,
}

impl YamlLoader {
    /// Create a loader, reading `secrets.yaml` from `config_dir` if present
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            include_stack: Vec::new(),
        }
    }

    /// Load a file, resolving relative paths against the config directory
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = resolve(&self.config_dir, path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::ReadFile {
            path: path.clone(),
            source: e,
        })?;

        self.include_stack.push(path.clone());
        let result = self.load_string(&content, &path);
        self.include_stack.pop();
        result
    }

    /// Parse YAML text; `source_path` anchors relative includes
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;
        self.process(value, source_path)
    }

    fn process(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => self.process_tagged(*tagged, source_path),
            Value::Mapping(map) => {
                let mut result = Mapping::with_capacity(map.len());
                for (k, v) in map {
                    result.insert(k, self.process(v, source_path)?);
                }
                Ok(Value::Mapping(result))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn process_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let tag = tagged.tag.to_string();
        trace!("Processing tag '{}'", tag);

        match tag.as_str() {
            "!include" => {
                let target = tag_argument(&tag, tagged.value)?;
                let base = source_path.parent().unwrap_or(&self.config_dir);
                let path = resolve(base, Path::new(&target));
                debug!("Including file: {:?}", path);
                self.load_file(path)
            }
            "!secret" => {
                let key = tag_argument(&tag, tagged.value)?;
                let secret = self.secrets.get(&key)?;
                debug!("Substituted secret: {}", key);
                Ok(Value::String(secret.to_string()))
            }
            "!env_var" => {
                let var = tag_argument(&tag, tagged.value)?;
                let value = std::env::var(&var)
                    .map_err(|_| ConfigError::EnvVarNotFound { var: var.clone() })?;
                debug!("Substituted env var: {}", var);
                Ok(Value::String(value))
            }
            _ => {
                // Unknown tags are kept, with their contents processed
                let value = self.process(tagged.value, source_path)?;
                Ok(Value::Tagged(Box::new(TaggedValue {
                    tag: tagged.tag,
                    value,
                })))
            }
        }
    }
}

/// The string argument of a custom tag
fn tag_argument(tag: &str, value: Value) -> ConfigResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other if tag == "!include" => Err(ConfigError::InvalidIncludePath {
            path: format!("{:?}", other),
            reason: "path must be a string".to_string(),
        }),
        _ => Err(ConfigError::InvalidValue {
            key: tag.to_string(),
            reason: "argument must be a string".to_string(),
        }),
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Load a YAML file from `config_dir` with tag processing
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir)?.load_file(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn get<'a>(value: &'a Value, key: &str) -> &'a Value {
        value
            .as_mapping()
            .and_then(|m| m.get(key))
            .unwrap_or_else(|| panic!("missing key {key}"))
    }

    #[test]
    fn test_plain_yaml() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("configuration.yaml"), "interval: 1\nrules: a.json\n").unwrap();

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(get(&value, "interval").as_u64(), Some(1));
        assert_eq!(get(&value, "rules").as_str(), Some("a.json"));
    }

    #[test]
    fn test_secret() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("secrets.yaml"), "ha_token: s3cr3t\n").unwrap();
        fs::write(
            dir.path().join("configuration.yaml"),
            "homeassistant:\n  token: !secret ha_token\n",
        )
        .unwrap();

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(get(get(&value, "homeassistant"), "token").as_str(), Some("s3cr3t"));
    }

    #[test]
    fn test_missing_secret() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("configuration.yaml"), "token: !secret nope\n").unwrap();

        let result = load_yaml(dir.path(), "configuration.yaml");
        assert!(matches!(result, Err(ConfigError::SecretNotFound { .. })));
    }

    #[test]
    fn test_env_var() {
        let dir = TempDir::new().unwrap();
        std::env::set_var("HA_RULES_TEST_URL", "http://ha.test:8123");
        fs::write(
            dir.path().join("configuration.yaml"),
            "url: !env_var HA_RULES_TEST_URL\nother: !env_var HA_RULES_TEST_UNSET_VAR\n",
        )
        .unwrap();

        let result = load_yaml(dir.path(), "configuration.yaml");
        assert!(matches!(
            result,
            Err(ConfigError::EnvVarNotFound { ref var }) if var == "HA_RULES_TEST_UNSET_VAR"
        ));

        let mut loader = YamlLoader::new(dir.path()).unwrap();
        let value = loader
            .load_string("url: !env_var HA_RULES_TEST_URL\n", Path::new("inline.yaml"))
            .unwrap();
        assert_eq!(get(&value, "url").as_str(), Some("http://ha.test:8123"));
    }

    #[test]
    fn test_include_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("conf/ha.yaml"), "url: http://ha:8123\n").unwrap();
        fs::write(
            dir.path().join("configuration.yaml"),
            "homeassistant: !include conf/ha.yaml\n",
        )
        .unwrap();

        let value = load_yaml(dir.path(), "configuration.yaml").unwrap();
        assert_eq!(
            get(get(&value, "homeassistant"), "url").as_str(),
            Some("http://ha:8123")
        );
    }

    #[test]
    fn test_circular_include() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), "b: !include b.yaml\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "a: !include a.yaml\n").unwrap();

        let result = load_yaml(dir.path(), "a.yaml");
        assert!(matches!(result, Err(ConfigError::CircularInclude { .. })));
    }

    #[test]
    fn test_unknown_tag_is_kept() {
        let dir = TempDir::new().unwrap();
        let mut loader = YamlLoader::new(dir.path()).unwrap();
        let value = loader
            .load_string("x: !custom 5\n", Path::new("inline.yaml"))
            .unwrap();
        assert!(matches!(get(&value, "x"), Value::Tagged(_)));
    }
}
