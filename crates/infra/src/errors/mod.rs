//! Conversions from infrastructure-side failures into [`CatalogError`].

use catalog_common::{CatalogError, ErrorCode};
use catalog_domain::DomainError;
use serde_json::json;

use crate::config::ConfigError;

/// Explicit conversion into the shared error type. A trait rather than
/// `From` because neither side of the conversion is defined in this crate.
pub trait IntoCatalogError {
    fn into_catalog(self) -> CatalogError;
}

/* -------------------------------------------------------------------------- */
/* DomainError → CatalogError */
/* -------------------------------------------------------------------------- */

impl IntoCatalogError for DomainError {
    fn into_catalog(self) -> CatalogError {
        let details = json!({ "field": self.field() });
        CatalogError::validation(self.to_string()).with_details(details)
    }
}

/* -------------------------------------------------------------------------- */
/* ConfigError → CatalogError */
/* -------------------------------------------------------------------------- */

impl IntoCatalogError for ConfigError {
    fn into_catalog(self) -> CatalogError {
        CatalogError::from_source(ErrorCode::InternalError, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_becomes_validation_error() {
        let err = DomainError::too_long("title", 500).into_catalog();

        assert_eq!(err.code(), ErrorCode::ValidationError);
        assert_eq!(err.message(), "title exceeds 500 characters");
        assert_eq!(err.details().unwrap()["field"], "title");
    }

    #[test]
    fn test_config_error_is_internal() {
        let err = ConfigError::Missing("CATALOG_DB_PATH".into()).into_catalog();

        assert_eq!(err.code(), ErrorCode::InternalError);
        assert!(err.message().contains("CATALOG_DB_PATH"));
        assert!(err.source_as::<ConfigError>().is_some());
    }
}
