//! # Catalog Domain
//!
//! Book and tag records for the catalog.
//!
//! This crate contains:
//! - Record types as stored and returned by the repositories
//! - Input types with validation (`NewBook`, `NewTag`, `BookUpdate`)
//! - Domain error type and Result definition
//! - Field limits
//!
//! ## Architecture
//! - No dependencies on other catalog crates
//! - Pure data and validation, no I/O

pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use errors::*;
pub use types::*;
