//! Failure classification for storage errors.
//!
//! Maps a [`StorageError`] to an [`ErrorCode`] and a retry verdict. The
//! default [`SubstringClassifier`] matches on the lower-cased message text,
//! first match wins:
//!
//! | Message contains | Code | Retryable |
//! |------------------|------|-----------|
//! | `unique constraint`, `duplicate` | `CONFLICT` | no |
//! | `foreign key constraint` | `VALIDATION_ERROR` | no |
//! | `not null constraint` | `VALIDATION_ERROR` | no |
//! | `check constraint` | `VALIDATION_ERROR` | no |
//! | `syntax error` | `INTERNAL_ERROR` | no |
//! | `connection`, `timeout` | `DATABASE_ERROR` | yes |
//! | anything else | `DATABASE_ERROR` | yes |
//!
//! Messages such as `database is locked` fall through to `DATABASE_ERROR`
//! and stay retryable because no non-retryable keyword matches them.
//!
//! [`SqliteCodeClassifier`] reads the extended result code of the engine
//! first and only falls back to the message rules when none is available.

use std::fmt::Debug;

use rusqlite::ffi;

use crate::error::ErrorCode;
use crate::storage::StorageError;

/// Keywords marking a durable failure that a retry cannot fix.
const NON_RETRYABLE_KEYWORDS: &[&str] = &[
    "unique constraint",
    "foreign key constraint",
    "not null constraint",
    "check constraint",
    "syntax error",
    "validation",
    "duplicate",
];

/// Ordered message rules; the first rule with a matching needle wins.
const CODE_RULES: &[(&[&str], ErrorCode)] = &[
    (&["unique constraint", "duplicate"], ErrorCode::Conflict),
    (&["foreign key constraint"], ErrorCode::ValidationError),
    (&["not null constraint"], ErrorCode::ValidationError),
    (&["check constraint"], ErrorCode::ValidationError),
    (&["syntax error"], ErrorCode::InternalError),
    (&["connection", "timeout"], ErrorCode::DatabaseError),
];

/// Code plus retry verdict for a single failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub code: ErrorCode,
    pub retryable: bool,
}

impl ErrorClassification {
    pub const fn new(code: ErrorCode, retryable: bool) -> Self {
        Self { code, retryable }
    }

    pub const fn permanent(code: ErrorCode) -> Self {
        Self::new(code, false)
    }

    pub const fn transient(code: ErrorCode) -> Self {
        Self::new(code, true)
    }
}

/// Decides how a storage failure is reported and whether it is retried.
pub trait ErrorClassifier: Send + Sync + Debug {
    fn classify(&self, error: &StorageError) -> ErrorClassification;
}

/// Map a failure message to an error code.
pub fn classify_database_error(message: &str) -> ErrorCode {
    let message = message.to_lowercase();
    CODE_RULES
        .iter()
        .find(|(needles, _)| needles.iter().any(|needle| message.contains(needle)))
        .map_or(ErrorCode::DatabaseError, |(_, code)| *code)
}

/// Whether a failure message names a durable fault.
pub fn is_non_retryable_error(message: &str) -> bool {
    let message = message.to_lowercase();
    NON_RETRYABLE_KEYWORDS.iter().any(|keyword| message.contains(keyword))
}

/// Failures produced by the resilience layer itself rather than the engine.
fn classify_local(error: &StorageError) -> Option<ErrorClassification> {
    match error {
        StorageError::Cancelled => Some(ErrorClassification::permanent(ErrorCode::OperationCancelled)),
        StorageError::Panicked(_) | StorageError::InvalidConfig(_) => {
            Some(ErrorClassification::permanent(ErrorCode::InternalError))
        }
        _ => None,
    }
}

/// Message-based classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl SubstringClassifier {
    pub fn classify_message(message: &str) -> ErrorClassification {
        ErrorClassification::new(classify_database_error(message), !is_non_retryable_error(message))
    }
}

impl ErrorClassifier for SubstringClassifier {
    fn classify(&self, error: &StorageError) -> ErrorClassification {
        classify_local(error).unwrap_or_else(|| Self::classify_message(&error.to_string()))
    }
}

/// Classifier driven by SQLite extended result codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteCodeClassifier;

impl SqliteCodeClassifier {
    fn classify_extended(extended_code: i32) -> Option<ErrorClassification> {
        let classification = match extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                ErrorClassification::permanent(ErrorCode::Conflict)
            }
            ffi::SQLITE_CONSTRAINT_FOREIGNKEY
            | ffi::SQLITE_CONSTRAINT_NOTNULL
            | ffi::SQLITE_CONSTRAINT_CHECK => ErrorClassification::permanent(ErrorCode::ValidationError),
            code if code & 0xff == ffi::SQLITE_BUSY || code & 0xff == ffi::SQLITE_LOCKED => {
                ErrorClassification::transient(ErrorCode::DatabaseError)
            }
            _ => return None,
        };
        Some(classification)
    }
}

impl ErrorClassifier for SqliteCodeClassifier {
    fn classify(&self, error: &StorageError) -> ErrorClassification {
        if let Some(local) = classify_local(error) {
            return local;
        }

        if let StorageError::Rusqlite(rusqlite::Error::SqliteFailure(failure, _)) = error {
            if let Some(classification) = Self::classify_extended(failure.extended_code) {
                return classification;
            }
        }

        SubstringClassifier::classify_message(&error.to_string())
    }
}
