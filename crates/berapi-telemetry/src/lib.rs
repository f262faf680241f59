//! # berapi Telemetry
//!
//! Logging bootstrap for hosts that run berapi suites.
//!
//! berapi emits `tracing` events everywhere (one per attempt, retry,
//! middleware failure and soft assertion failure). This crate installs a
//! `tracing-subscriber` for them and defines the field names those events
//! use, so log pipelines can rely on them.
//!
//! # Example
//!
//! ```rust,ignore
//! use berapi_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(http.method = "GET", http.url = "https://example.com", "sending");
//! ```

#![doc(html_root_url = "https://docs.rs/berapi-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, fields, init_logging, LogConfig};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
