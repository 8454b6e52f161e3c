//! Integration tests for reqtrail-config

use reqtrail_config::*;
use reqtrail_core::LogLevel;
use std::io::Write;
use tempfile::NamedTempFile;

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_request_logging_from_json_file() {
    let file = temp_file(
        ".json",
        r#"{
            "request-logging": {
                "methods": ["POST", "PATCH"],
                "exclude-routes": ["admin/*"],
                "warning-log-level": "critical",
                "database-logging": {"enabled": true, "persistence": 7}
            }
        }"#,
    );

    let manager = ConfigManager::new();
    let format = FileFormat::from_path(file.path()).unwrap();
    manager.load_file(file.path(), format).unwrap();

    let config = RequestLoggingConfig::from_manager(&manager);
    assert_eq!(config.methods, vec!["POST", "PATCH"]);
    assert_eq!(config.exclude_routes, vec!["admin/*"]);
    assert_eq!(config.warning_log_level, LogLevel::Critical);
    assert!(config.database_logging.enabled);
    assert_eq!(config.database_logging.persistence_days, 7);
    assert_eq!(config.request_log_format, DEFAULT_REQUEST_LOG_FORMAT);
}

#[test]
fn test_request_logging_from_toml_file() {
    let file = temp_file(
        ".toml",
        r#"
            [request-logging]
            show-response-html = true
            request-duration-limit = 1500
            response-log-format = "{requestId} {responseStatusCode}"
        "#,
    );

    let manager = ConfigManager::new();
    manager.load_file(file.path(), FileFormat::Toml).unwrap();

    let config = RequestLoggingConfig::from_manager(&manager);
    assert!(config.show_response_html);
    assert_eq!(config.request_duration_limit, DurationLimit::Millis(1500.0));
    assert_eq!(config.response_log_format, "{requestId} {responseStatusCode}");
}

#[test]
fn test_flat_dotted_keys() {
    let manager = ConfigManager::new();
    manager.set("request-logging.enabled", false).unwrap();
    manager
        .set("request-logging.database-logging.table", "http_audit")
        .unwrap();

    let config = RequestLoggingConfig::from_manager(&manager);
    assert!(!config.enabled);
    assert_eq!(config.database_logging.table, "http_audit");
}

#[test]
fn test_enabled_from_environment() {
    let manager = ConfigManager::new();
    manager.load_vars([(
        "REQUEST_LOGGING_ENABLED".to_string(),
        "false".to_string(),
    )]);

    assert!(!RequestLoggingConfig::from_manager(&manager).enabled);

    // An explicit namespace value wins over the environment
    manager.set("request-logging.enabled", true).unwrap();
    assert!(RequestLoggingConfig::from_manager(&manager).enabled);
}

#[test]
fn test_empty_manager_gives_defaults() {
    let manager = ConfigManager::new();
    assert_eq!(
        RequestLoggingConfig::from_manager(&manager),
        RequestLoggingConfig::default()
    );
}

#[test]
fn test_missing_file_is_load_error() {
    let manager = ConfigManager::new();
    let result = manager.load_file("/nonexistent/reqtrail.json", FileFormat::Json);
    assert!(matches!(result, Err(ConfigError::LoadError(_))));
}

#[test]
fn test_dotenv_file() {
    let file = temp_file(".env", "REQTRAIL_DOTENV_PROBE=loaded\n");
    let manager = ConfigManager::with_prefix("REQTRAIL_DOTENV");
    manager.load_dotenv(file.path().to_str()).unwrap();

    assert_eq!(manager.get_string("probe").unwrap(), "loaded");
}
