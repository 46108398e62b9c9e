//! Observability bootstrap.
//!
//! The crates log through `tracing` with structured fields (`request_id`,
//! `operation`, `table`, `duration_ms`). [`logging::init`] installs the
//! process-wide subscriber.

pub mod logging;

pub use logging::{init, LogFormat, LoggingConfig};
