//! Catalog record types

pub mod book;
pub mod tag;

pub use book::{normalize_isbn, Book, BookFilter, BookUpdate, NewBook, ReadingStatus};
pub use tag::{NewTag, Tag};

use chrono::{DateTime, Utc};

use crate::errors::{DomainError, Result};

/// Trimmed, non-empty and within `max` characters.
pub(crate) fn require_text(field: &str, value: &str, max: usize) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::empty(field));
    }
    if trimmed.chars().count() > max {
        return Err(DomainError::too_long(field, max));
    }
    Ok(())
}

/// Unix seconds to `DateTime<Utc>`.
pub(crate) fn utc(secs: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
}
