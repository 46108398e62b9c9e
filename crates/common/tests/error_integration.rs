//! Integration tests for the error taxonomy and envelope

#![cfg(feature = "foundation")]

use catalog_common::{CatalogError, ErrorCode, ErrorEnvelope};
use serde_json::json;

#[test]
fn test_every_failure_renders_same_envelope_shape() {
    let errors = [
        CatalogError::conflict("UNIQUE constraint failed: tags.name").with_request_id(Some("req-1")),
        CatalogError::book_not_found("42"),
        CatalogError::cancelled("find_by_id").with_attempts(2),
        CatalogError::validation("title must not be empty").with_details(json!({"field": "title"})),
    ];

    for err in &errors {
        let value = serde_json::to_value(ErrorEnvelope::from(err)).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();

        assert_eq!(keys, ["details", "error", "message", "requestId", "success", "timestamp"]);
        assert_eq!(object["success"], false);
        assert_eq!(object["error"], err.code().as_str());
    }
}

#[test]
fn test_envelope_round_trips_code() {
    let err = CatalogError::new(ErrorCode::RateLimitError, "slow down");
    let json = serde_json::to_string(&err.envelope()).unwrap();
    let back: ErrorEnvelope = serde_json::from_str(&json).unwrap();

    assert_eq!(back.error, ErrorCode::RateLimitError);
    assert_eq!(back.error.status(), 429);
    assert_eq!(back.request_id, None);
}

#[test]
fn test_cancelled_status() {
    let err = CatalogError::cancelled("list_tags");
    assert_eq!(err.code(), ErrorCode::OperationCancelled);
    assert_eq!(err.status(), 499);
    assert_eq!(err.to_string(), "Operation 'list_tags' cancelled");
}
