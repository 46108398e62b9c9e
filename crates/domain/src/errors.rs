//! Error types for domain validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failure raised before a record is written.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainError {
    #[error("{field} must not be empty")]
    EmptyField { field: String },

    #[error("{field} exceeds {max} characters")]
    TooLong { field: String, max: usize },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: String, reason: String },
}

impl DomainError {
    pub fn empty(field: &str) -> Self {
        Self::EmptyField { field: field.to_string() }
    }

    pub fn too_long(field: &str, max: usize) -> Self {
        Self::TooLong { field: field.to_string(), max }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidField { field: field.to_string(), reason: reason.into() }
    }

    /// Name of the offending field.
    pub fn field(&self) -> &str {
        match self {
            Self::EmptyField { field } | Self::TooLong { field, .. } | Self::InvalidField { field, .. } => {
                field
            }
        }
    }
}

/// Result type alias for domain validation
pub type Result<T> = std::result::Result<T, DomainError>;
