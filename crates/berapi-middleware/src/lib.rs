//! # berapi Middleware
//!
//! Middleware pipeline for the berapi test client.
//!
//! Every attempt of a call flows through the same ordered list of
//! middlewares:
//!
//! ```text
//! RequestContext → M1 → M2 → … → Mn → Transport
//!                                        ↓
//! ResponseContext ← M1 ← M2 ← … ← Mn ←──┘
//! ```
//!
//! Request transforms run in registration order, response transforms in
//! reverse order. A failure anywhere is broadcast to every middleware's
//! `on_error` hook before it is surfaced.
//!
//! ## Built-in middlewares
//!
//! | Middleware               | Purpose                                     |
//! |--------------------------|---------------------------------------------|
//! | [`LoggingMiddleware`]    | `tracing` events per attempt and failure    |
//! | [`BearerAuthMiddleware`] | `Authorization: Bearer <token>`             |
//! | [`ApiKeyMiddleware`]     | API key header (`X-API-Key` by default)     |
//! | [`TrackingMiddleware`]   | Feeds a shared [`RequestTracker`]           |
//! | [`FnMiddleware`]         | Request transform from a closure            |

#![doc(html_root_url = "https://docs.rs/berapi-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod pipeline;
pub mod stages;

pub use middleware::{BoxedMiddleware, FnMiddleware, Middleware};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use stages::{
    ApiKeyMiddleware, BearerAuthMiddleware, LoggingMiddleware, RequestTracker, TrackedExchange,
    TrackingMiddleware, DEFAULT_API_KEY_HEADER, MASKED,
};
