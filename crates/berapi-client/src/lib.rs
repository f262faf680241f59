//! # berapi Client
//!
//! The client that ties berapi together:
//!
//! ```text
//! Client::get(..).send()
//!   → retry loop (RetryPolicy)
//!     → Pipeline (request transforms) → Transport → Pipeline (response transforms)
//!   → Response (assertions)
//! ```
//!
//! - [`Client`] / [`ClientBuilder`] - settings, middleware and transport
//! - [`RequestBuilder`] - per-request headers, query, JSON/form bodies
//! - [`RetryPolicy`] - pure retry decisions and the backoff schedule
//! - [`ReqwestTransport`] - the default transport
//! - [`MockTransport`] - scripted transport for tests

#![doc(html_root_url = "https://docs.rs/berapi-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod mock;
pub mod retry;
mod transport;

pub use client::{Client, ClientBuilder, RequestBuilder};
pub use mock::{MockReply, MockTransport, RecordedCall};
pub use retry::{AttemptOutcome, GiveUpReason, RetryDecision, RetryPolicy};
pub use transport::ReqwestTransport;
