//! # berapi Core
//!
//! Core types and traits shared by every berapi crate.
//!
//! This crate provides the foundational types used throughout berapi:
//!
//! - [`RequestContext`] - The request a call is about to dispatch
//! - [`ResponseContext`] - Immutable snapshot of a completed transport reply
//! - [`RequestId`] - UUID v7 identifier of one logical call
//! - [`Transport`] - The capability that performs network I/O
//! - [`BerapiError`] - Errors surfaced by a call (transport, middleware, retry)

#![doc(html_root_url = "https://docs.rs/berapi-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod transport;

pub use context::{RequestContext, RequestId, ResponseContext, SUPPORTED_METHODS};
pub use error::{BerapiError, BerapiResult, LastAttempt, TransportError};
pub use transport::{BoxFuture, Transport, TransportReply};
