//! # berapi
//!
//! **HTTP test client with fluent JSON assertions**
//!
//! berapi wraps each outbound call in:
//!
//! - a composable **middleware pipeline** (auth, logging, request tracking,
//!   your own transforms),
//! - a transparent **retry policy** with exact exponential backoff and an
//!   overall deadline,
//! - a **response record** with dot-path queries, JSON Schema validation
//!   (explicit or inferred from a sample), and status, header, body and
//!   timing assertions, including soft checks.
//!
//! ## Quick Start
//!
//! ```no_run
//! use berapi::prelude::*;
//!
//! # async fn run() -> berapi::Result<()> {
//! let client = Client::builder()
//!     .settings(Settings::builder().base_url("https://api.example.com").build()?)
//!     .bearer_token("secret")
//!     .build()?;
//!
//! client
//!     .post("/users")
//!     .json(&serde_json::json!({"name": "Ada"}))
//!     .send()
//!     .await?
//!     .assert_status(201)?
//!     .assert_json_path("name", "Ada")?
//!     .assert_has_key("id")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! send() → retry loop → M1 → … → Mn → Transport
//!                                        ↓
//! Response ←──────────── M1 ← … ← Mn ←──┘
//! ```

#![doc(html_root_url = "https://docs.rs/berapi/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod tracking;

pub use error::{Error, Result};
pub use tracking::{create_tracking_client, tracking_client_builder};

// Re-export core types
pub use berapi_core as core;

// Re-export configuration types
pub use berapi_config as config;

// Re-export logging bootstrap
pub use berapi_telemetry as telemetry;
pub use berapi_telemetry::{init_logging, LogConfig};

// Re-export middleware types
pub use berapi_middleware as middleware;

// Re-export assertion types
pub use berapi_assert as assert;

// Re-export client types
pub use berapi_client as client;

pub use berapi_assert::{AssertionError, Response};
pub use berapi_client::{Client, ClientBuilder, RequestBuilder};
pub use berapi_config::Settings;
pub use berapi_core::BerapiError;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```
/// use berapi::prelude::*;
/// ```
pub mod prelude {
    pub use crate::Error;

    pub use berapi_core::{
        BerapiError, BerapiResult, RequestContext, RequestId, ResponseContext, TransportError,
    };

    pub use berapi_config::{ConfigLoader, Settings};

    pub use berapi_middleware::{
        ApiKeyMiddleware, BearerAuthMiddleware, FnMiddleware, LoggingMiddleware, Middleware,
        RequestTracker, TrackingMiddleware,
    };

    pub use berapi_assert::{infer_schema, Actual, AssertionError, Response, StatusClass};

    pub use berapi_client::{Client, ClientBuilder, MockReply, MockTransport, RequestBuilder};
}
