//! Storage configuration
//!
//! Connection pool settings and SQLite pragmas for the catalog database.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// Largest pool the catalog accepts.
const MAX_POOL_SIZE: u32 = 100;

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path
    pub path: PathBuf,

    /// Connection pool size (default: 10)
    pub pool_size: u32,

    /// Connection acquisition timeout in seconds (default: 5)
    pub connection_timeout_secs: u64,

    /// SQLite busy timeout in milliseconds (default: 5000)
    pub busy_timeout_ms: u64,

    /// Enable WAL mode (default: true)
    pub enable_wal: bool,

    /// Enable foreign keys (default: true)
    pub enable_foreign_keys: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/catalog.db"),
            pool_size: 10,
            connection_timeout_secs: 5,
            busy_timeout_ms: 5000,
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

impl StorageConfig {
    /// Create a new configuration with the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), ..Default::default() }
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidConfig`] if any value is out of range.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.pool_size == 0 {
            return Err(StorageError::InvalidConfig(
                "pool_size must be greater than 0".to_string(),
            ));
        }
        if self.pool_size > MAX_POOL_SIZE {
            return Err(StorageError::InvalidConfig(format!(
                "pool_size too large (max: {MAX_POOL_SIZE})"
            )));
        }
        if self.connection_timeout_secs == 0 {
            return Err(StorageError::InvalidConfig(
                "connection_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.busy_timeout_ms == 0 {
            return Err(StorageError::InvalidConfig(
                "busy_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.path.as_os_str().is_empty() {
            return Err(StorageError::InvalidConfig("database path cannot be empty".to_string()));
        }

        Ok(())
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Set the connection pool size
    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Set the busy timeout
    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Disable WAL mode (not recommended for production)
    #[must_use]
    pub fn without_wal(mut self) -> Self {
        self.enable_wal = false;
        self
    }

    /// Create a builder that validates on `build`
    pub fn builder(path: impl Into<PathBuf>) -> StorageConfigBuilder {
        StorageConfigBuilder::new(path)
    }
}

/// Builder for [`StorageConfig`] with validation
#[derive(Debug)]
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { config: StorageConfig::new(path) }
    }

    pub fn pool_size(mut self, size: u32) -> Self {
        self.config.pool_size = size;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout_secs = timeout.as_secs();
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_busy_timeout(timeout);
        self
    }

    pub fn disable_wal(mut self) -> Self {
        self.config.enable_wal = false;
        self
    }

    pub fn disable_foreign_keys(mut self) -> Self {
        self.config.enable_foreign_keys = false;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<StorageConfig, StorageError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
