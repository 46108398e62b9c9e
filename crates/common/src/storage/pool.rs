//! SQLite connection pool
//!
//! r2d2-based pooling for the catalog database. Every pooled connection gets
//! the pragmas from [`apply_connection_pragmas`] when it is opened.

use std::fmt;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction};
use tracing::{debug, info, instrument, warn};

use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};
use super::pragmas::apply_connection_pragmas;
use super::types::{HealthStatus, TransactionalStore};

/// Pooled SQLite connection.
pub type PooledSqlite = PooledConnection<SqliteConnectionManager>;

/// SQLite connection pool
pub struct SqlitePool {
    pool: Pool<SqliteConnectionManager>,
    config: StorageConfig,
}

impl fmt::Debug for SqlitePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlitePool")
            .field("path", &self.config.path)
            .field("max_size", &self.config.pool_size)
            .finish_non_exhaustive()
    }
}

impl SqlitePool {
    /// Open (or create) the database file and build the pool.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the parent directory
    /// cannot be created, or the first connection cannot be opened.
    #[instrument(skip(config), fields(db_path = %config.path.display(), pool_size = config.pool_size))]
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        config.validate()?;

        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let pragma_config = config.clone();
        let manager = SqliteConnectionManager::file(&config.path).with_init(move |conn| {
            apply_connection_pragmas(conn, &pragma_config)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        });

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout())
            .build(manager)
            .map_err(|e| {
                warn!("Failed to create connection pool: {}", e);
                StorageError::Connection(format!("Failed to create pool: {e}"))
            })?;

        info!("SQLite pool created with {} connections", config.pool_size);

        Ok(Self { pool, config })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Check a connection out of the pool.
    pub fn get(&self) -> StorageResult<PooledSqlite> {
        let start = std::time::Instant::now();

        match self.pool.get() {
            Ok(conn) => {
                debug!("Connection acquired in {}ms", start.elapsed().as_millis());
                Ok(conn)
            }
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("timed out") || err_str.contains("timeout") {
                    warn!("Connection timeout after {:?}", self.config.connection_timeout());
                    Err(StorageError::Timeout(self.config.connection_timeout_secs))
                } else {
                    warn!("Connection error: {}", e);
                    Err(StorageError::Connection(format!("Failed to get connection: {e}")))
                }
            }
        }
    }

    /// Run `f` against a pooled connection outside any explicit transaction.
    pub fn with_connection<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Connection) -> StorageResult<T>,
    {
        let conn = self.get()?;
        f(&conn)
    }

    /// Pool state plus a probe query.
    pub fn health_check(&self) -> HealthStatus {
        let state = self.pool.state();

        let probe = self.get().and_then(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i32>(0)).map_err(StorageError::from)
        });

        match probe {
            Ok(_) => HealthStatus::healthy(state.connections, state.idle_connections, self.config.pool_size),
            Err(e) => HealthStatus::unhealthy(format!("Pool unhealthy: {e}")),
        }
    }
}

impl TransactionalStore for SqlitePool {
    fn transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&Transaction<'_>) -> StorageResult<T>,
    {
        let mut conn = self.get()?;
        let tx = conn.transaction()?;
        // Dropping an uncommitted transaction rolls it back.
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::pool.
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;

    fn pool_in(dir: &TempDir) -> SqlitePool {
        SqlitePool::new(StorageConfig::new(dir.path().join("test.db"))).unwrap()
    }

    #[test]
    fn test_pool_creation() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool_in(&temp_dir);

        pool.with_connection(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY)", [])?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_creates_missing_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("catalog.db");

        let pool = SqlitePool::new(StorageConfig::new(&nested)).unwrap();
        assert!(pool.health_check().healthy);
        assert!(nested.exists());
    }

    #[test]
    fn test_transaction_commits_on_ok() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool_in(&temp_dir);
        pool.with_connection(|conn| {
            conn.execute_batch("CREATE TABLE test (id INTEGER PRIMARY KEY, v TEXT)")?;
            Ok(())
        })
        .unwrap();

        pool.transaction(|tx| {
            tx.execute("INSERT INTO test (v) VALUES ('a')", [])?;
            tx.execute("INSERT INTO test (v) VALUES ('b')", [])?;
            Ok(())
        })
        .unwrap();

        let count: i64 = pool
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM test", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_err() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool_in(&temp_dir);
        pool.with_connection(|conn| {
            conn.execute_batch("CREATE TABLE test (id INTEGER PRIMARY KEY, v TEXT NOT NULL)")?;
            Ok(())
        })
        .unwrap();

        let result: StorageResult<()> = pool.transaction(|tx| {
            tx.execute("INSERT INTO test (v) VALUES ('a')", [])?;
            tx.execute("INSERT INTO test (v) VALUES (NULL)", [])?;
            Ok(())
        });

        let err = result.unwrap_err();
        assert!(err.to_string().contains("NOT NULL constraint failed"));

        let count: i64 = pool
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM test", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_concurrent_connections() {
        let temp_dir = TempDir::new().unwrap();
        let pool = Arc::new(pool_in(&temp_dir));
        pool.with_connection(|conn| {
            conn.execute("CREATE TABLE test (id INTEGER PRIMARY KEY, value TEXT)", [])?;
            Ok(())
        })
        .unwrap();

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    pool.transaction(|tx| {
                        tx.execute("INSERT INTO test (value) VALUES (?1)", [format!("thread_{i}")])?;
                        Ok(())
                    })
                    .unwrap();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let count: i64 = pool
            .with_connection(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM test", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_health_check() {
        let temp_dir = TempDir::new().unwrap();
        let pool = pool_in(&temp_dir);

        let health = pool.health_check();
        assert!(health.healthy);
        assert_eq!(health.max_connections, 10);
    }
}
