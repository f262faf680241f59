//! Built-in middlewares.
//!
//! - [`logging`] - Emit structured `tracing` events per attempt
//! - [`auth`] - Bearer token and API key headers
//! - [`tracking`] - Record request/response pairs for reports

pub mod auth;
pub mod logging;
pub mod tracking;

pub use auth::{ApiKeyMiddleware, BearerAuthMiddleware, DEFAULT_API_KEY_HEADER};
pub use logging::LoggingMiddleware;
pub use tracking::{RequestTracker, TrackedExchange, TrackingMiddleware, MASKED};
