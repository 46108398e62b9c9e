//! Error taxonomy shared by every catalog layer.
//!
//! Every failure that leaves the storage layer is rendered as a
//! [`CatalogError`]: a stable [`ErrorCode`], the human-readable message of the
//! underlying failure, optional structured details and the request id of the
//! call that produced it. Callers branch on the code, never on message text.
//!
//! ## Error codes
//!
//! | Code | HTTP status | Typical cause |
//! |------|-------------|---------------|
//! | `VALIDATION_ERROR` | 400 | foreign key, not null or check constraint |
//! | `BAD_REQUEST` | 400 | malformed input rejected before storage |
//! | `UNAUTHORIZED` | 401 | missing credentials |
//! | `FORBIDDEN` | 403 | insufficient permissions |
//! | `*_NOT_FOUND` | 404 | missing book, tag or generic resource |
//! | `CONFLICT` | 409 | unique constraint / duplicate record |
//! | `RATE_LIMIT_ERROR` | 429 | throttled caller |
//! | `OPERATION_CANCELLED` | 499 | caller cancelled while waiting |
//! | `DATABASE_ERROR` | 500 | locked database, connection loss, anything unclassified |
//! | `NETWORK_ERROR` | 500 | upstream connectivity |
//! | `INTERNAL_ERROR` | 500 | SQL syntax errors and invariant violations |
//!
//! ## Envelope
//!
//! [`CatalogError::envelope`] produces the JSON shape consumed by route
//! handlers:
//!
//! ```json
//! {"success":false,"error":"CONFLICT","message":"UNIQUE constraint failed: books.isbn",
//!  "details":null,"timestamp":"2024-01-01T00:00:00Z","requestId":"req-1"}
//! ```

use std::error::Error as StdError;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Standard result type using [`CatalogError`]
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Boxed underlying failure carried by a [`CatalogError`].
pub type BoxedSource = Box<dyn StdError + Send + Sync + 'static>;

/* -------------------------------------------------------------------------- */
/* Stable error codes */
/* -------------------------------------------------------------------------- */

/// Stable error codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    ValidationError,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    BookNotFound,
    TagNotFound,
    Conflict,
    RateLimitError,
    OperationCancelled,
    DatabaseError,
    NetworkError,
    InternalError,
}

impl ErrorCode {
    /// Wire representation of the code.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::BookNotFound => "BOOK_NOT_FOUND",
            Self::TagNotFound => "TAG_NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::RateLimitError => "RATE_LIMIT_ERROR",
            Self::OperationCancelled => "OPERATION_CANCELLED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status associated with the code.
    pub const fn status(self) -> u16 {
        match self {
            Self::ValidationError | Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound | Self::BookNotFound | Self::TagNotFound => 404,
            Self::Conflict => 409,
            Self::RateLimitError => 429,
            // nginx's "client closed request"
            Self::OperationCancelled => 499,
            Self::DatabaseError | Self::NetworkError | Self::InternalError => 500,
        }
    }

    /// Whether the code names a missing resource.
    pub const fn is_not_found(self) -> bool {
        matches!(self, Self::NotFound | Self::BookNotFound | Self::TagNotFound)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* -------------------------------------------------------------------------- */
/* Classified error */
/* -------------------------------------------------------------------------- */

/// A classified failure.
///
/// `message` is the display text of the underlying failure, so the original
/// driver message is always recoverable; the failure itself is available
/// through [`std::error::Error::source`].
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CatalogError {
    code: ErrorCode,
    message: String,
    details: Option<serde_json::Value>,
    request_id: Option<String>,
    attempts: Option<u32>,
    #[source]
    source: Option<BoxedSource>,
}

impl CatalogError {
    /// Create an error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            request_id: None,
            attempts: None,
            source: None,
        }
    }

    /// Classify an underlying failure, keeping it as the error source.
    pub fn from_source<E>(code: ErrorCode, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let message = source.to_string();
        Self { source: Some(Box::new(source)), ..Self::new(code, message) }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn book_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::BookNotFound, format!("Book not found: '{id}'"))
    }

    pub fn tag_not_found(id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::TagNotFound, format!("Tag not found: '{id}'"))
    }

    /// The operation was cancelled before it could complete.
    pub fn cancelled(operation: impl fmt::Display) -> Self {
        Self::new(ErrorCode::OperationCancelled, format!("Operation '{operation}' cancelled"))
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Attach the correlation id of the request that failed.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<impl Into<String>>) -> Self {
        self.request_id = request_id.map(Into::into);
        self
    }

    /// Record how many attempts were made before giving up.
    #[must_use]
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        self.details.as_ref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Attempts made by a retrying caller, `None` for errors raised directly.
    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }

    /// HTTP status for the error code.
    pub fn status(&self) -> u16 {
        self.code.status()
    }

    /// Downcast the underlying failure to a concrete type.
    pub fn source_as<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.as_deref().and_then(|source| source.downcast_ref::<E>())
    }

    /// Render the error through the shared response envelope, stamped now.
    pub fn envelope(&self) -> ErrorEnvelope {
        self.envelope_at(Utc::now())
    }

    /// Render the error through the shared response envelope.
    pub fn envelope_at(&self, timestamp: DateTime<Utc>) -> ErrorEnvelope {
        ErrorEnvelope {
            success: false,
            error: self.code,
            message: self.message.clone(),
            details: self.details.clone(),
            timestamp,
            request_id: self.request_id.clone(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Response envelope */
/* -------------------------------------------------------------------------- */

/// JSON failure envelope shared by every layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: ErrorCode,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
    pub request_id: Option<String>,
}

impl From<&CatalogError> for ErrorEnvelope {
    fn from(err: &CatalogError) -> Self {
        err.envelope()
    }
}
