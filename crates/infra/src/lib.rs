//! # Catalog Infrastructure
//!
//! SQLite-backed storage for the catalog, run through the resilience layer
//! of `catalog-common`.
//!
//! This crate contains:
//! - Configuration loading (environment or JSON/TOML file)
//! - The database manager: pool, schema, health, metrics
//! - Book and tag repositories
//!
//! ## Architecture
//! - Depends on `catalog-common` and `catalog-domain`
//! - Contains all I/O; domain types stay pure

pub mod app;
pub mod config;
pub mod database;
pub mod errors;

// Re-export commonly used items
pub use app::Catalog;
pub use config::AppConfig;
pub use database::*;
