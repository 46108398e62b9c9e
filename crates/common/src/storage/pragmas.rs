//! SQLite pragma management
//!
//! Per-connection pragmas applied by the pool's init hook.

use rusqlite::Connection;

use super::config::StorageConfig;
use super::error::{StorageError, StorageResult};

/// Apply connection-level pragmas
///
/// - WAL journal with automatic checkpoints (when enabled)
/// - NORMAL synchronous mode
/// - foreign key enforcement (when enabled)
/// - busy timeout for lock contention
pub fn apply_connection_pragmas(conn: &Connection, config: &StorageConfig) -> StorageResult<()> {
    let mut pragma_sql = String::new();

    if config.enable_wal {
        pragma_sql.push_str("PRAGMA journal_mode=WAL;\n");
        pragma_sql.push_str("PRAGMA wal_autocheckpoint=1000;\n");
    }

    pragma_sql.push_str("PRAGMA synchronous=NORMAL;\n");

    if config.enable_foreign_keys {
        pragma_sql.push_str("PRAGMA foreign_keys=ON;\n");
    }

    conn.execute_batch(&pragma_sql)
        .map_err(|e| StorageError::Query(format!("Failed to apply pragmas: {e}")))?;

    conn.busy_timeout(config.busy_timeout())
        .map_err(|e| StorageError::Query(format!("Failed to set busy timeout: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::pragmas.
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_apply_pragmas() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let conn = Connection::open(&db_path).unwrap();
        let config = StorageConfig::new(&db_path);

        apply_connection_pragmas(&conn, &config).unwrap();

        let journal_mode: String =
            conn.pragma_query_value(None, "journal_mode", |row| row.get(0)).unwrap();
        assert_eq!(journal_mode.to_lowercase(), "wal");

        let foreign_keys: i32 =
            conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap();
        assert_eq!(foreign_keys, 1);

        let synchronous: i32 =
            conn.pragma_query_value(None, "synchronous", |row| row.get(0)).unwrap();
        assert_eq!(synchronous, 1); // 1 = NORMAL
    }

    #[test]
    fn test_foreign_keys_can_be_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let conn = Connection::open(&db_path).unwrap();
        let mut config = StorageConfig::new(&db_path).without_wal();
        config.enable_foreign_keys = false;

        apply_connection_pragmas(&conn, &config).unwrap();

        let foreign_keys: i32 =
            conn.pragma_query_value(None, "foreign_keys", |row| row.get(0)).unwrap();
        assert_eq!(foreign_keys, 0);
    }
}
