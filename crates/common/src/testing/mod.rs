//! Testing utilities and helpers
//!
//! - **[`database`]**: temporary on-disk SQLite pools
//! - **[`mocks`]**: scripted operations that fail a set number of times
//! - **[`assert_error_code!`](crate::assert_error_code)**: assert on a
//!   [`CatalogError`](crate::CatalogError) code
//!
//! ```rust
//! use catalog_common::testing::{ScriptedOperation, TestDatabase};
//! use catalog_common::{ResilienceContext, RunOptions, StorageError};
//!
//! let db = TestDatabase::new().unwrap();
//! db.run_script("CREATE TABLE tags (id INTEGER PRIMARY KEY)").unwrap();
//!
//! let op = ScriptedOperation::failing(1, || StorageError::Query("database is locked".into()));
//! let ctx = ResilienceContext::default();
//! ctx.runner()
//!     .execute_with_retry_blocking("probe", "tags", RunOptions::new(), || op.call())
//!     .unwrap();
//! assert_eq!(op.calls(), 2);
//! ```

pub mod database;
pub mod mocks;

pub use database::TestDatabase;
pub use mocks::ScriptedOperation;

/// Assert that a result failed with the given [`ErrorCode`](crate::ErrorCode).
#[macro_export]
macro_rules! assert_error_code {
    ($result:expr, $code:expr) => {
        match &$result {
            Ok(_) => panic!("Expected error {:?} but got Ok", $code),
            Err(e) => assert_eq!(
                e.code(),
                $code,
                "Error '{}' has code {:?}, expected {:?}",
                e,
                e.code(),
                $code
            ),
        }
    };
}
