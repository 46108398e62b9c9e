//! Config files on disk through the public loader.

use std::io::Write;
use std::path::PathBuf;

use catalog_common::observability::LogFormat;
use catalog_infra::config::{load_from_file, ConfigError};
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> (NamedTempFile, PathBuf) {
    let mut file = NamedTempFile::new().expect("temp file created");
    file.write_all(contents.as_bytes()).expect("config written");
    let path = file.path().with_extension(extension);
    std::fs::copy(file.path(), &path).expect("config copied");
    (file, path)
}

#[test]
fn test_load_config_from_json_file() {
    let (_file, path) = write_config(
        r#"{
            "database": { "path": "books.db", "pool_size": 4, "enable_wal": false },
            "resilience": { "max_concurrency": 6, "slow_query_threshold_ms": 500 },
            "logging": { "level": "debug", "format": "json" }
        }"#,
        "json",
    );

    let config = load_from_file(Some(path.clone())).expect("json config loads");
    std::fs::remove_file(&path).ok();

    assert_eq!(config.database.path, PathBuf::from("books.db"));
    assert_eq!(config.database.pool_size, 4);
    assert!(!config.database.enable_wal);
    assert_eq!(config.resilience.max_concurrency, 6);
    assert_eq!(config.resilience.slow_query_threshold_ms, 500);
    assert_eq!(config.resilience.base_backoff_ms, 100);
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_config_from_toml_file() {
    let (_file, path) = write_config(
        r#"
[database]
path = "books.db"
busy_timeout_ms = 250

[resilience]
default_retries = 4
default_transaction_retries = 1
"#,
        "toml",
    );

    let config = load_from_file(Some(path.clone())).expect("toml config loads");
    std::fs::remove_file(&path).ok();

    assert_eq!(config.database.busy_timeout_ms, 250);
    assert_eq!(config.resilience.default_retries, 4);
    assert_eq!(config.resilience.default_transaction_retries, 1);
}

#[test]
fn test_load_config_with_minimal_fields() {
    let (_file, path) = write_config("{}", "json");

    let config = load_from_file(Some(path.clone())).expect("defaults fill every section");
    std::fs::remove_file(&path).ok();

    assert_eq!(config, catalog_infra::AppConfig::default());
}

#[test]
fn test_load_config_from_nonexistent_file() {
    let result = load_from_file(Some(PathBuf::from("/nonexistent/catalog.toml")));
    assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
}

#[test]
fn test_load_config_with_invalid_format() {
    let (_file, path) = write_config("{ not json", "json");

    let result = load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(ConfigError::Parse { format: "JSON", .. })));
}

#[test]
fn test_load_config_rejects_out_of_range_values() {
    let (_file, path) = write_config(r#"{"database":{"path":"books.db","pool_size":0}}"#, "json");

    let result = load_from_file(Some(path.clone()));
    std::fs::remove_file(&path).ok();

    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}
