//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `CATALOG_DB_PATH` is unset, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `CATALOG_DB_PATH`: Database file path (required)
//! - `CATALOG_DB_POOL_SIZE`: Connection pool size
//! - `CATALOG_DB_WAL`: Whether WAL mode is enabled (true/false)
//! - `CATALOG_MAX_CONCURRENCY`: In-flight operations before backpressure
//! - `CATALOG_SLOW_QUERY_MS`: Slow operation threshold in milliseconds
//! - `CATALOG_LOG_LEVEL`: Default log filter directive
//! - `CATALOG_LOG_FORMAT`: `pretty` or `json`
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./catalog.json` or `./catalog.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use catalog_common::observability::{LogFormat, LoggingConfig};
use catalog_common::{ResilienceConfig, StorageConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No config file found in any of the standard locations")]
    NoConfigFile,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid {format} format: {reason}")]
    Parse { format: &'static str, reason: String },

    #[error("Unsupported config format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: StorageConfig,
    pub resilience: ResilienceConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Configuration with defaults everywhere but the database path.
    pub fn with_database_path(path: impl Into<PathBuf>) -> Self {
        Self { database: StorageConfig::new(path), ..Self::default() }
    }

    /// Check value ranges the type system cannot express.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending value.
    pub fn validate(&self) -> ConfigResult<()> {
        self.database.validate().map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let resilience = &self.resilience;
        if resilience.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be greater than 0".into()));
        }
        if resilience.metrics_capacity == 0 {
            return Err(ConfigError::Invalid("metrics_capacity must be greater than 0".into()));
        }
        if !(resilience.overload_ratio > 0.0 && resilience.overload_ratio <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "overload_ratio must be in (0, 1], got {}",
                resilience.overload_ratio
            )));
        }
        Ok(())
    }
}

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// database path is missing, falls back to loading from a config file.
/// A present but malformed variable is reported rather than skipped.
///
/// # Errors
/// Returns a [`ConfigError`] if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - A value is out of range
pub fn load() -> ConfigResult<AppConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(ConfigError::Missing(key)) => {
            tracing::debug!(%key, "Environment incomplete, trying file");
            load_from_file(None)
        }
        Err(e) => Err(e),
    }
}

/// Load configuration from environment variables
///
/// `CATALOG_DB_PATH` must be present; every other variable is optional.
///
/// # Errors
/// Returns [`ConfigError::Missing`] when the path is unset and
/// [`ConfigError::InvalidValue`] when a variable does not parse.
pub fn load_from_env() -> ConfigResult<AppConfig> {
    let mut config = AppConfig::with_database_path(env_var("CATALOG_DB_PATH")?);

    if let Some(pool_size) = env_parse::<u32>("CATALOG_DB_POOL_SIZE")? {
        config.database.pool_size = pool_size;
    }
    config.database.enable_wal = env_bool("CATALOG_DB_WAL", config.database.enable_wal);

    if let Some(max) = env_parse::<usize>("CATALOG_MAX_CONCURRENCY")? {
        config.resilience.max_concurrency = max;
    }
    if let Some(slow_ms) = env_parse::<u64>("CATALOG_SLOW_QUERY_MS")? {
        config.resilience.slow_query_threshold_ms = slow_ms;
    }

    if let Ok(level) = std::env::var("CATALOG_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(format) = std::env::var("CATALOG_LOG_FORMAT") {
        config.logging.format = parse_log_format(&format)?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns a [`ConfigError`] if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - A value is out of range
pub fn load_from_file(path: Option<PathBuf>) -> ConfigResult<AppConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::FileNotFound(p));
            }
            p
        }
        None => probe_config_paths().ok_or(ConfigError::NoConfigFile)?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)?;
    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content; format follows the extension.
fn parse_config(contents: &str, path: &Path) -> ConfigResult<AppConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "TOML", reason: e.to_string() }),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ConfigError::Parse { format: "JSON", reason: e.to_string() }),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./catalog.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidates_in(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidates_in(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidates_in(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("catalog.json"),
        dir.join("catalog.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

fn env_var(key: &str) -> ConfigResult<String> {
    std::env::var(key).map_err(|_| ConfigError::Missing(key.to_string()))
}

/// Parse an optional variable; unset yields `Ok(None)`.
fn env_parse<T>(key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn parse_log_format(raw: &str) -> ConfigResult<LogFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" | "text" => Ok(LogFormat::Pretty),
        other => Err(ConfigError::InvalidValue {
            key: "CATALOG_LOG_FORMAT".into(),
            reason: format!("expected 'pretty' or 'json', got '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const VARS: &[&str] = &[
        "CATALOG_DB_PATH",
        "CATALOG_DB_POOL_SIZE",
        "CATALOG_DB_WAL",
        "CATALOG_MAX_CONCURRENCY",
        "CATALOG_SLOW_QUERY_MS",
        "CATALOG_LOG_LEVEL",
        "CATALOG_LOG_FORMAT",
    ];

    fn clear_vars() {
        for key in VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("CATALOG_TEST_BOOL_ON", "on");
        std::env::set_var("CATALOG_TEST_BOOL_UPPER", "TRUE");
        std::env::set_var("CATALOG_TEST_BOOL_OFF", "off");

        assert!(env_bool("CATALOG_TEST_BOOL_ON", false));
        assert!(env_bool("CATALOG_TEST_BOOL_UPPER", false));
        assert!(!env_bool("CATALOG_TEST_BOOL_OFF", true));

        std::env::remove_var("CATALOG_TEST_BOOL_MISSING");
        assert!(env_bool("CATALOG_TEST_BOOL_MISSING", true));

        std::env::remove_var("CATALOG_TEST_BOOL_ON");
        std::env::remove_var("CATALOG_TEST_BOOL_UPPER");
        std::env::remove_var("CATALOG_TEST_BOOL_OFF");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_vars();

        std::env::set_var("CATALOG_DB_PATH", "/tmp/catalog-env.db");
        std::env::set_var("CATALOG_DB_POOL_SIZE", "4");
        std::env::set_var("CATALOG_DB_WAL", "false");
        std::env::set_var("CATALOG_MAX_CONCURRENCY", "3");
        std::env::set_var("CATALOG_SLOW_QUERY_MS", "250");
        std::env::set_var("CATALOG_LOG_LEVEL", "debug");
        std::env::set_var("CATALOG_LOG_FORMAT", "json");

        let result = load_from_env();
        clear_vars();

        let config = result.expect("config loads from env");
        assert_eq!(config.database.path, PathBuf::from("/tmp/catalog-env.db"));
        assert_eq!(config.database.pool_size, 4);
        assert!(!config.database.enable_wal);
        assert_eq!(config.resilience.max_concurrency, 3);
        assert_eq!(config.resilience.slow_query_threshold_ms, 250);
        assert_eq!(config.resilience.default_retries, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_env_missing_path() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_vars();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(ref key) if key == "CATALOG_DB_PATH"));
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_vars();

        std::env::set_var("CATALOG_DB_PATH", "/tmp/catalog-env.db");
        std::env::set_var("CATALOG_DB_POOL_SIZE", "not-a-number");

        let result = load_from_env();
        clear_vars();

        assert!(matches!(result, Err(ConfigError::InvalidValue { ref key, .. }) if key == "CATALOG_DB_POOL_SIZE"));
    }

    #[test]
    fn test_load_from_env_rejects_zero_concurrency() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_vars();

        std::env::set_var("CATALOG_DB_PATH", "/tmp/catalog-env.db");
        std::env::set_var("CATALOG_MAX_CONCURRENCY", "0");

        let result = load_from_env();
        clear_vars();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_config_by_extension() {
        let json = r#"{"database":{"path":"books.db","pool_size":2}}"#;
        let config = parse_config(json, Path::new("catalog.json")).unwrap();
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.resilience, ResilienceConfig::default());

        let toml = "[database]\npath = \"books.db\"\n\n[resilience]\nmax_concurrency = 4\n";
        let config = parse_config(toml, Path::new("catalog.toml")).unwrap();
        assert_eq!(config.resilience.max_concurrency, 4);

        assert!(matches!(
            parse_config("", Path::new("catalog.yaml")),
            Err(ConfigError::UnsupportedFormat(ref ext)) if ext == "yaml"
        ));
    }

    #[test]
    fn test_validate_overload_ratio() {
        let mut config = AppConfig::with_database_path("books.db");
        assert!(config.validate().is_ok());

        config.resilience.overload_ratio = 1.5;
        assert!(config.validate().is_err());
    }
}
