//! Database manager: the SQLite pool plus the resilience context every
//! repository call runs through.

use std::path::Path;
use std::sync::Arc;

use catalog_common::resilience::ErrorClassifier;
use catalog_common::storage::HealthStatus;
use catalog_common::{
    CatalogError, CatalogResult, MetricsSnapshot, ResilienceConfig, ResilienceContext, RunOptions,
    SqlitePool, StorageConfig, StorageError, StorageResult,
};
use rusqlite::{params, Connection, Transaction};
use tracing::{info, instrument};

const SCHEMA_VERSION: i32 = 1;
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Shared pool and resilience context.
#[derive(Debug)]
pub struct DbManager {
    pool: Arc<SqlitePool>,
    context: ResilienceContext,
}

impl DbManager {
    /// Open the pool and build a fresh resilience context.
    ///
    /// # Errors
    /// Returns a classified error if the configuration is invalid or the
    /// database cannot be opened.
    pub fn new(storage: StorageConfig, resilience: ResilienceConfig) -> CatalogResult<Self> {
        Self::with_context(storage, ResilienceContext::new(resilience))
    }

    /// Open the pool around an existing context (custom clock or classifier).
    pub fn with_context(storage: StorageConfig, context: ResilienceContext) -> CatalogResult<Self> {
        let pool = SqlitePool::new(storage)
            .map_err(|err| classify(context.runner().classifier(), err))?;

        info!(
            db_path = %pool.config().path.display(),
            pool_size = pool.config().pool_size,
            max_concurrency = context.config().max_concurrency,
            "catalog database initialised"
        );

        Ok(Self { pool: Arc::new(pool), context })
    }

    pub fn pool(&self) -> &Arc<SqlitePool> {
        &self.pool
    }

    pub fn context(&self) -> &ResilienceContext {
        &self.context
    }

    /// Return the configured database path.
    pub fn path(&self) -> &Path {
        &self.pool.config().path
    }

    /// Ensure the full schema exists on the current database.
    #[instrument(skip(self))]
    pub fn run_migrations(&self) -> CatalogResult<()> {
        self.context.runner().execute_transaction(&self.pool, RunOptions::default(), |tx| {
            tx.execute_batch(SCHEMA_SQL)?;
            tx.execute(
                "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, CAST(strftime('%s','now') AS INTEGER))",
                params![SCHEMA_VERSION],
            )?;
            Ok(())
        })
    }

    /// Highest applied schema version, `None` before migrations ran.
    pub fn schema_version(&self) -> CatalogResult<Option<i32>> {
        self.pool
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?)
            })
            .map_err(|err| self.classify(err))
    }

    /// Pool state plus a probe query.
    pub fn health_check(&self) -> HealthStatus {
        self.pool.health_check()
    }

    /// Rolling metrics of the operations run through [`Self::with_connection`].
    pub fn metrics(&self) -> MetricsSnapshot {
        self.context.metrics()
    }

    pub fn clear_metrics(&self) {
        self.context.monitor().clear_metrics();
    }

    /// Run `f` against a pooled connection on the blocking pool, through the
    /// executor (backpressure, timing, metrics) with retries.
    ///
    /// `f` may run more than once, so it must not have side effects outside
    /// the database.
    pub async fn with_connection<T, F>(
        &self,
        name: &str,
        table: &str,
        options: RunOptions,
        f: F,
    ) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: Fn(&Connection) -> StorageResult<T> + Send + Sync + 'static,
    {
        let f = Arc::new(f);

        self.context
            .runner()
            .execute_with_retry(name, table, options, || {
                let pool = Arc::clone(&self.pool);
                let f = Arc::clone(&f);
                async move {
                    tokio::task::spawn_blocking(move || pool.with_connection(|conn| f(conn)))
                        .await
                        .unwrap_or_else(|join_err| Err(StorageError::from(join_err)))
                }
            })
            .await
    }

    /// Run `f` inside a transaction with the runner's transaction policy.
    pub async fn with_transaction<T, F>(&self, options: RunOptions, f: F) -> CatalogResult<T>
    where
        T: Send + 'static,
        F: Fn(&Transaction<'_>) -> StorageResult<T> + Send + Sync + 'static,
    {
        self.context
            .runner()
            .execute_transaction_async(Arc::clone(&self.pool), options, f)
            .await
    }

    /// Refresh planner statistics and compact the file, then start a fresh
    /// metrics window.
    #[instrument(skip_all, fields(request_id = options.request_id.as_deref()))]
    pub async fn maintenance(&self, options: RunOptions) -> CatalogResult<()> {
        self.with_connection("maintenance", "*", options, |conn| {
            // VACUUM cannot run inside a transaction.
            conn.execute_batch("PRAGMA optimize; VACUUM;")?;
            Ok(())
        })
        .await?;

        self.clear_metrics();
        info!("database maintenance completed");
        Ok(())
    }

    fn classify(&self, err: StorageError) -> CatalogError {
        classify(self.context.runner().classifier(), err)
    }
}

fn classify(classifier: &dyn ErrorClassifier, err: StorageError) -> CatalogError {
    let classification = classifier.classify(&err);
    CatalogError::from_source(classification.code, err)
}
