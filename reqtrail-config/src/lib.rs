//! Configuration management for reqtrail.
//!
//! [`ConfigManager`] is a thread-safe key/value store fed from JSON, TOML and
//! `.env` files or the process environment. [`RequestLoggingConfig`] resolves
//! the typed request logging settings out of it, falling back to defaults for
//! anything missing or malformed.

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::{
    CONFIG_NAMESPACE, DEFAULT_REQUEST_LOG_FORMAT, DEFAULT_RESPONSE_LOG_FORMAT,
    DatabaseLoggingConfig, DurationLimit, RequestLoggingConfig, is_sql_identifier,
};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Main configuration manager
#[derive(Clone)]
pub struct ConfigManager {
    config: Arc<RwLock<HashMap<String, Value>>>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: None,
        }
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Arc::new(RwLock::new(HashMap::new())),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Load configuration from environment variables
    pub fn load_env(&self) -> Result<()> {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.insert_strings(loader.load()?);
        Ok(())
    }

    /// Load configuration from an explicit set of variables, as if they were the environment
    pub fn load_vars<I>(&self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let loader = EnvLoader::new(self.env_prefix.clone());
        self.insert_strings(loader.load_from(vars));
    }

    /// Load configuration from .env file
    pub fn load_dotenv(&self, path: Option<&str>) -> Result<()> {
        if let Some(path) = path {
            dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
        } else {
            dotenvy::dotenv().ok(); // Ignore if .env doesn't exist
        }
        self.load_env()
    }

    /// Load configuration from file
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path.as_ref())?;
        self.merge_value(data);
        tracing::debug!(path = %path.as_ref().display(), ?format, "Loaded configuration file");
        Ok(())
    }

    /// Merge the top-level entries of a JSON object into the store
    pub fn merge_value(&self, data: Value) {
        if let Value::Object(map) = data {
            let mut config = self.config.write();
            for (key, value) in map {
                config.insert(key, value);
            }
        }
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;

        self.config.write().insert(key.to_string(), json_value);

        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a string value
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    /// Get a boolean value
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// Raw value at `key`.
    ///
    /// An exact key wins. Otherwise the key is read as a dotted path: the
    /// longest stored prefix is taken and the rest is walked through nested
    /// objects, so `a.b.c` resolves against `{"a": {"b": {"c": ..}}}` as well
    /// as against a flat `a.b` entry holding `{"c": ..}`.
    pub fn lookup(&self, key: &str) -> Option<Value> {
        let config = self.config.read();
        if let Some(value) = config.get(key) {
            return Some(value.clone());
        }

        let segments: Vec<&str> = key.split('.').collect();
        for split in (1..segments.len()).rev() {
            let head = segments[..split].join(".");
            let Some(mut current) = config.get(&head) else {
                continue;
            };
            let mut found = true;
            for segment in &segments[split..] {
                match current.get(*segment) {
                    Some(next) => current = next,
                    None => {
                        found = false;
                        break;
                    }
                }
            }
            if found {
                return Some(current.clone());
            }
        }

        None
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Get all top-level configuration keys
    pub fn keys(&self) -> Vec<String> {
        self.config.read().keys().cloned().collect()
    }

    /// Merge configuration from another manager
    pub fn merge(&self, other: &ConfigManager) {
        if Arc::ptr_eq(&self.config, &other.config) {
            return;
        }
        let other_config = other.config.read();
        let mut config = self.config.write();

        for (key, value) in other_config.iter() {
            config.insert(key.clone(), value.clone());
        }
    }

    fn insert_strings(&self, vars: HashMap<String, String>) {
        let mut config = self.config.write();
        for (key, value) in vars {
            config.insert(key, Value::String(value));
        }
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let manager = ConfigManager::new();
        manager.set("test_key", "test_value").unwrap();

        let value: String = manager.get("test_key").unwrap();
        assert_eq!(value, "test_value");
    }

    #[test]
    fn test_get_or_default() {
        let manager = ConfigManager::new();

        let value: String = manager.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_nested_lookup() {
        let manager = ConfigManager::new();
        manager
            .set("request-logging", json!({"database-logging": {"enabled": true}}))
            .unwrap();

        assert!(manager.get_bool("request-logging.database-logging.enabled").unwrap());
        assert!(manager.has("request-logging.database-logging"));
        assert!(!manager.has("request-logging.missing"));
    }

    #[test]
    fn test_flat_dotted_key_wins() {
        let manager = ConfigManager::new();
        manager
            .set("request-logging", json!({"log-level": "info"}))
            .unwrap();
        manager.set("request-logging.log-level", "debug").unwrap();

        assert_eq!(manager.get_string("request-logging.log-level").unwrap(), "debug");
    }

    #[test]
    fn test_partial_flat_prefix() {
        let manager = ConfigManager::new();
        manager
            .set("request-logging.database-logging", json!({"table": "audit"}))
            .unwrap();

        assert_eq!(
            manager.get_string("request-logging.database-logging.table").unwrap(),
            "audit"
        );
    }

    #[test]
    fn test_load_vars_and_merge() {
        let base = ConfigManager::new();
        let overrides = ConfigManager::new();
        overrides.load_vars([("REQUEST_LOGGING_ENABLED".to_string(), "false".to_string())]);

        base.merge(&overrides);
        base.merge(&base.clone());
        assert_eq!(base.get_string("request_logging_enabled").unwrap(), "false");
        assert_eq!(base.keys(), vec!["request_logging_enabled".to_string()]);
    }

    #[test]
    fn test_get_wrong_type() {
        let manager = ConfigManager::new();
        manager.set("flag", "yes").unwrap();
        assert!(matches!(
            manager.get_bool("flag"),
            Err(ConfigError::DeserializationError(_))
        ));
        assert!(matches!(
            manager.get_bool("nope"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }
}
