//! Typed request logging settings.
//!
//! Every key is optional. A missing key takes its default silently; a key
//! holding a value of the wrong shape logs a warning and takes its default.

use crate::ConfigManager;
use reqtrail_core::LogLevel;
use serde_json::Value;
use tracing::warn;

/// Namespace the request logging keys live under.
pub const CONFIG_NAMESPACE: &str = "request-logging";

/// Environment key (after [`crate::EnvLoader`] lowercasing) that overrides `enabled`
/// when the namespace does not set it.
const ENABLED_ENV_KEY: &str = "request_logging_enabled";

pub const DEFAULT_REQUEST_LOG_FORMAT: &str =
    "#{requestId} IP: {ip} {method} {uri} - Body: {requestBody} - Files: {files}";

pub const DEFAULT_RESPONSE_LOG_FORMAT: &str = "#{requestId} User: #{userId} IP: {ip} DB: #{databaseId} {responseStatusCode} - Duration: {duration} - Body: {responseBody} {isRedirecting}";

const DEFAULT_TABLE: &str = "requests";

/// Slow-request threshold.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DurationLimit {
    #[default]
    Disabled,
    /// Warn when a request takes strictly longer than this many milliseconds.
    Millis(f64),
}

impl DurationLimit {
    /// A positive, finite number of milliseconds enables the limit; anything else disables it.
    pub fn from_millis(ms: f64) -> Self {
        if ms.is_finite() && ms > 0.0 {
            DurationLimit::Millis(ms)
        } else {
            DurationLimit::Disabled
        }
    }

    pub fn millis(&self) -> Option<f64> {
        match self {
            DurationLimit::Disabled => None,
            DurationLimit::Millis(ms) => Some(*ms),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.millis().is_some()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null | Value::Bool(false) => Some(DurationLimit::Disabled),
            Value::Number(n) => n.as_f64().map(Self::from_millis),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Self::from_millis),
            _ => None,
        }
    }
}

/// Audit table persistence settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseLoggingConfig {
    pub enabled: bool,
    pub table: String,
    /// Rows older than this many days are pruned.
    pub persistence_days: u32,
    /// Maximum stored response length in characters; 0 stores the whole body.
    pub limit_response: usize,
}

impl Default for DatabaseLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            table: DEFAULT_TABLE.to_string(),
            persistence_days: 2,
            limit_response: 2000,
        }
    }
}

impl DatabaseLoggingConfig {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the table name. Anything that is not a plain SQL identifier keeps the current name.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        if is_sql_identifier(&table) {
            self.table = table;
        } else {
            warn!(table = %table, "Rejected audit table name, keeping {}", self.table);
        }
        self
    }

    pub fn persistence_days(mut self, days: u32) -> Self {
        self.persistence_days = days;
        self
    }

    pub fn limit_response(mut self, chars: usize) -> Self {
        self.limit_response = chars;
        self
    }
}

/// Resolved request logging settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLoggingConfig {
    pub enabled: bool,
    pub methods: Vec<String>,
    pub exclude_routes: Vec<String>,
    pub exclude_request_fields: Vec<String>,
    pub exclude_response_fields: Vec<String>,
    pub request_duration_limit: DurationLimit,
    pub show_response_html: bool,
    pub log_channels: Vec<String>,
    pub log_level: LogLevel,
    pub warning_log_channels: Vec<String>,
    pub warning_log_level: LogLevel,
    pub database_logging: DatabaseLoggingConfig,
    pub request_log_format: String,
    pub response_log_format: String,
}

impl Default for RequestLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            methods: strings(&["GET", "POST", "PUT", "DELETE"]),
            exclude_routes: Vec::new(),
            exclude_request_fields: strings(&["password", "password_confirmation"]),
            exclude_response_fields: Vec::new(),
            request_duration_limit: DurationLimit::Disabled,
            show_response_html: false,
            log_channels: strings(&["stack"]),
            log_level: LogLevel::Info,
            warning_log_channels: strings(&["stack"]),
            warning_log_level: LogLevel::Warning,
            database_logging: DatabaseLoggingConfig::default(),
            request_log_format: DEFAULT_REQUEST_LOG_FORMAT.to_string(),
            response_log_format: DEFAULT_RESPONSE_LOG_FORMAT.to_string(),
        }
    }
}

impl RequestLoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve settings from the `request-logging` namespace of a config manager.
    ///
    /// Both a nested `request-logging` object and flat `request-logging.<key>`
    /// entries are understood. `REQUEST_LOGGING_ENABLED` loaded from the
    /// environment applies when the namespace leaves `enabled` unset.
    pub fn from_manager(manager: &ConfigManager) -> Self {
        let mut config = Self::resolve(|key| manager.lookup(&format!("{CONFIG_NAMESPACE}.{key}")));

        if manager.lookup(&format!("{CONFIG_NAMESPACE}.enabled")).is_none()
            && let Some(value) = manager.lookup(ENABLED_ENV_KEY)
        {
            config.enabled = setting(ENABLED_ENV_KEY, Some(value), read_bool, config.enabled);
        }

        config
    }

    /// Resolve settings from the contents of the namespace object itself.
    pub fn from_value(value: &Value) -> Self {
        let manager = ConfigManager::new();
        manager.merge_value(value.clone());
        Self::resolve(|key| manager.lookup(key))
    }

    fn resolve(get: impl Fn(&str) -> Option<Value>) -> Self {
        let d = Self::default();
        let db = d.database_logging.clone();

        let database_logging = DatabaseLoggingConfig {
            enabled: setting(
                "database-logging.enabled",
                get("database-logging.enabled"),
                read_bool,
                db.enabled,
            ),
            table: setting(
                "database-logging.table",
                get("database-logging.table"),
                read_table,
                db.table,
            ),
            persistence_days: setting(
                "database-logging.persistence",
                get("database-logging.persistence"),
                read_u32,
                db.persistence_days,
            ),
            limit_response: setting(
                "database-logging.limit-response",
                get("database-logging.limit-response"),
                read_usize,
                db.limit_response,
            ),
        };

        Self {
            enabled: setting("enabled", get("enabled"), read_bool, d.enabled),
            methods: setting("methods", get("methods"), read_list, d.methods),
            exclude_routes: setting(
                "exclude-routes",
                get("exclude-routes"),
                read_list,
                d.exclude_routes,
            ),
            exclude_request_fields: setting(
                "exclude-request-fields",
                get("exclude-request-fields"),
                read_list,
                d.exclude_request_fields,
            ),
            exclude_response_fields: setting(
                "exclude-response-fields",
                get("exclude-response-fields"),
                read_list,
                d.exclude_response_fields,
            ),
            request_duration_limit: setting(
                "request-duration-limit",
                get("request-duration-limit"),
                DurationLimit::from_value,
                d.request_duration_limit,
            ),
            show_response_html: setting(
                "show-response-html",
                get("show-response-html"),
                read_bool,
                d.show_response_html,
            ),
            log_channels: setting("log-channels", get("log-channels"), read_list, d.log_channels),
            log_level: setting("log-level", get("log-level"), read_level, d.log_level),
            warning_log_channels: setting(
                "warning-log-channels",
                get("warning-log-channels"),
                read_list,
                d.warning_log_channels,
            ),
            warning_log_level: setting(
                "warning-log-level",
                get("warning-log-level"),
                read_level,
                d.warning_log_level,
            ),
            database_logging,
            request_log_format: setting(
                "request-log-format",
                get("request-log-format"),
                read_string,
                d.request_log_format,
            ),
            response_log_format: setting(
                "response-log-format",
                get("response-log-format"),
                read_string,
                d.response_log_format,
            ),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods = methods.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude_request_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_request_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude_response_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_response_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn request_duration_limit(mut self, limit: DurationLimit) -> Self {
        self.request_duration_limit = limit;
        self
    }

    pub fn show_response_html(mut self, show: bool) -> Self {
        self.show_response_html = show;
        self
    }

    pub fn log_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn warning_log_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.warning_log_channels = channels.into_iter().map(Into::into).collect();
        self
    }

    pub fn warning_log_level(mut self, level: LogLevel) -> Self {
        self.warning_log_level = level;
        self
    }

    pub fn database_logging(mut self, database: DatabaseLoggingConfig) -> Self {
        self.database_logging = database;
        self
    }

    pub fn request_log_format(mut self, format: impl Into<String>) -> Self {
        self.request_log_format = format.into();
        self
    }

    pub fn response_log_format(mut self, format: impl Into<String>) -> Self {
        self.response_log_format = format.into();
        self
    }
}

/// `true` for a plain SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn setting<T>(key: &str, value: Option<Value>, read: impl Fn(&Value) -> Option<T>, default: T) -> T {
    let Some(value) = value else {
        return default;
    };
    match read(&value) {
        Some(parsed) => parsed,
        None => {
            warn!(
                key = %format!("{CONFIG_NAMESPACE}.{key}"),
                value = %value,
                "Invalid request logging setting, using default"
            );
            default
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn read_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// An array of strings, or a comma separated string as it arrives from the environment.
fn read_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => Some(
            s.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

fn read_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn read_level(value: &Value) -> Option<LogLevel> {
    value.as_str().and_then(LogLevel::parse)
}

fn read_table(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|name| is_sql_identifier(name))
        .map(str::to_string)
}

fn read_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn read_u32(value: &Value) -> Option<u32> {
    read_u64(value).and_then(|n| u32::try_from(n).ok())
}

fn read_usize(value: &Value) -> Option<usize> {
    read_u64(value).and_then(|n| usize::try_from(n).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = RequestLoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.methods, vec!["GET", "POST", "PUT", "DELETE"]);
        assert_eq!(
            config.exclude_request_fields,
            vec!["password", "password_confirmation"]
        );
        assert!(config.exclude_response_fields.is_empty());
        assert_eq!(config.request_duration_limit, DurationLimit::Disabled);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.warning_log_level, LogLevel::Warning);
        assert_eq!(config.log_channels, vec!["stack"]);
        assert!(!config.database_logging.enabled);
        assert_eq!(config.database_logging.table, "requests");
        assert_eq!(config.database_logging.persistence_days, 2);
        assert_eq!(config.database_logging.limit_response, 2000);
    }

    #[test]
    fn test_from_value_overrides() {
        let config = RequestLoggingConfig::from_value(&json!({
            "enabled": false,
            "methods": ["get"],
            "exclude-routes": ["/health"],
            "request-duration-limit": 250,
            "log-level": "DEBUG",
            "database-logging": {"enabled": true, "table": "audit_log", "limit-response": 0}
        }));

        assert!(!config.enabled);
        assert_eq!(config.methods, vec!["get"]);
        assert_eq!(config.exclude_routes, vec!["/health"]);
        assert_eq!(config.request_duration_limit, DurationLimit::Millis(250.0));
        assert_eq!(config.log_level, LogLevel::Debug);
        assert!(config.database_logging.enabled);
        assert_eq!(config.database_logging.table, "audit_log");
        assert_eq!(config.database_logging.limit_response, 0);
        assert_eq!(config.database_logging.persistence_days, 2);
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let config = RequestLoggingConfig::from_value(&json!({
            "enabled": "perhaps",
            "methods": [1, 2],
            "log-level": "fatal",
            "request-duration-limit": [100],
            "database-logging": {"table": "requests; DROP TABLE users", "persistence": -3}
        }));

        assert!(config.enabled);
        assert_eq!(config.methods, RequestLoggingConfig::default().methods);
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.request_duration_limit, DurationLimit::Disabled);
        assert_eq!(config.database_logging.table, "requests");
        assert_eq!(config.database_logging.persistence_days, 2);
    }

    #[test]
    fn test_duration_limit_values() {
        let read = |v: Value| RequestLoggingConfig::from_value(&json!({"request-duration-limit": v}))
            .request_duration_limit;

        assert_eq!(read(json!(false)), DurationLimit::Disabled);
        assert_eq!(read(Value::Null), DurationLimit::Disabled);
        assert_eq!(read(json!(0)), DurationLimit::Disabled);
        assert_eq!(read(json!(-5)), DurationLimit::Disabled);
        assert_eq!(read(json!(12.5)), DurationLimit::Millis(12.5));
        assert_eq!(read(json!("300")), DurationLimit::Millis(300.0));
        assert!(!DurationLimit::from_millis(f64::NAN).is_enabled());
    }

    #[test]
    fn test_string_lists_from_env_style_values() {
        let config = RequestLoggingConfig::from_value(&json!({
            "log-channels": "daily, slack",
            "show-response-html": "on"
        }));
        assert_eq!(config.log_channels, vec!["daily", "slack"]);
        assert!(config.show_response_html);
    }

    #[test]
    fn test_builder() {
        let config = RequestLoggingConfig::new()
            .methods(["POST"])
            .exclude_response_fields(["token"])
            .request_duration_limit(DurationLimit::from_millis(100.0))
            .warning_log_channels(["slack"])
            .database_logging(
                DatabaseLoggingConfig::default()
                    .enabled(true)
                    .table("bad name")
                    .limit_response(5),
            );

        assert_eq!(config.methods, vec!["POST"]);
        assert_eq!(config.exclude_response_fields, vec!["token"]);
        assert_eq!(config.request_duration_limit.millis(), Some(100.0));
        assert_eq!(config.warning_log_channels, vec!["slack"]);
        assert_eq!(config.database_logging.table, "requests");
        assert_eq!(config.database_logging.limit_response, 5);
    }

    #[test]
    fn test_sql_identifier() {
        assert!(is_sql_identifier("requests"));
        assert!(is_sql_identifier("_audit_2"));
        assert!(!is_sql_identifier("2fast"));
        assert!(!is_sql_identifier("audit-log"));
        assert!(!is_sql_identifier(""));
    }
}
