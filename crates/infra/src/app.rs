//! Application wiring: logging, database, repositories.

use std::sync::Arc;

use catalog_common::observability::logging;
use catalog_common::storage::HealthStatus;
use catalog_common::{CatalogResult, MetricsSnapshot};
use tracing::info;

use crate::config::{self, AppConfig};
use crate::database::{BookRepository, DbManager, TagRepository};
use crate::errors::IntoCatalogError;

/// Opened catalog: one database manager shared by both repositories.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Arc<DbManager>,
    books: BookRepository,
    tags: TagRepository,
}

impl Catalog {
    /// Load configuration with [`config::load`] and open the catalog.
    ///
    /// # Errors
    /// `INTERNAL_ERROR` when no usable configuration is found, otherwise see
    /// [`Catalog::open`].
    pub fn open_default() -> CatalogResult<Self> {
        let config = config::load().map_err(IntoCatalogError::into_catalog)?;
        Self::open(&config)
    }

    /// Install logging (unless a subscriber already exists), open the
    /// database and bring the schema up to date.
    ///
    /// # Errors
    /// Returns a classified error if the configuration is invalid or the
    /// database cannot be opened or migrated.
    pub fn open(config: &AppConfig) -> CatalogResult<Self> {
        config.validate().map_err(IntoCatalogError::into_catalog)?;
        logging::init(&config.logging);

        let db = Arc::new(DbManager::new(config.database.clone(), config.resilience.clone())?);
        db.run_migrations()?;

        info!(db_path = %db.path().display(), "catalog opened");

        Ok(Self::from_manager(db))
    }

    /// Wrap an already migrated manager.
    pub fn from_manager(db: Arc<DbManager>) -> Self {
        let books = BookRepository::new(Arc::clone(&db));
        let tags = TagRepository::new(Arc::clone(&db));
        Self { db, books, tags }
    }

    pub fn books(&self) -> &BookRepository {
        &self.books
    }

    pub fn tags(&self) -> &TagRepository {
        &self.tags
    }

    pub fn database(&self) -> &Arc<DbManager> {
        &self.db
    }

    pub fn health(&self) -> HealthStatus {
        self.db.health_check()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.db.metrics()
    }
}
