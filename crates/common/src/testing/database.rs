//! Temporary SQLite databases for tests.
//!
//! The database file lives in a [`tempfile::TempDir`] owned by the helper, so
//! it is removed when the helper is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use crate::storage::{SqlitePool, StorageConfig, StorageResult};

/// On-disk pool in a private temporary directory.
#[derive(Debug)]
pub struct TestDatabase {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
    // Declared last so it is dropped after the pool.
    _temp_dir: TempDir,
}

impl TestDatabase {
    pub fn new() -> StorageResult<Self> {
        Self::with_config(|config| config)
    }

    /// Adjust the default configuration before the pool is opened. The path
    /// is always overwritten with the temporary one.
    pub fn with_config(customize: impl FnOnce(StorageConfig) -> StorageConfig) -> StorageResult<Self> {
        let temp_dir = tempfile::Builder::new().prefix("catalog-test").tempdir()?;
        let db_path = temp_dir.path().join("catalog.db");

        let mut config = customize(StorageConfig::default());
        config.path = db_path.clone();
        let pool = Arc::new(SqlitePool::new(config)?);

        Ok(Self { pool, db_path, _temp_dir: temp_dir })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    /// Execute a SQL script (possibly several statements).
    pub fn run_script(&self, sql: &str) -> StorageResult<()> {
        self.pool.with_connection(|conn| Ok(conn.execute_batch(sql)?))
    }

    /// `SELECT COUNT(*)` on a table.
    pub fn count(&self, table: &str) -> StorageResult<i64> {
        self.pool.with_connection(|conn| {
            Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?)
        })
    }
}
