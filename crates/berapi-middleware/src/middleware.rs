//! Core middleware trait and types.
//!
//! This module defines the [`Middleware`] trait that all middleware stages
//! implement. A middleware sees every attempt twice: once on the way out
//! ([`Middleware::transform_request`]) and once on the way back
//! ([`Middleware::transform_response`]). Failures anywhere in the call are
//! broadcast to [`Middleware::on_error`].
//!
//! # Example
//!
//! ```
//! use berapi_core::{BerapiResult, BoxFuture, RequestContext};
//! use berapi_middleware::Middleware;
//!
//! struct UserAgent;
//!
//! impl Middleware for UserAgent {
//!     fn name(&self) -> &'static str {
//!         "user_agent"
//!     }
//!
//!     fn transform_request<'a>(
//!         &'a self,
//!         request: RequestContext,
//!     ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
//!         Box::pin(async move { request.with_header("User-Agent", "berapi") })
//!     }
//! }
//! ```

use std::future;
use std::sync::Arc;

use berapi_core::{BerapiError, BerapiResult, BoxFuture, RequestContext, ResponseContext};

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// The middleware capability.
///
/// Every hook has a pass-through default, so a middleware only implements
/// the hooks it cares about.
///
/// # Invariants
///
/// - Transforms consume a context and return a new one; they never mutate
///   the caller's copy
/// - `on_error` only observes; it cannot replace or suppress the error
/// - A middleware with internal state must synchronize it itself, since a
///   shared client calls it from many tasks
pub trait Middleware: Send + Sync + 'static {
    /// Returns the name of this middleware, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Transforms the request before it is dispatched.
    ///
    /// Returning an error stops the call: later middlewares are skipped and
    /// the transport is never invoked.
    fn transform_request<'a>(
        &'a self,
        request: RequestContext,
    ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
        Box::pin(future::ready(Ok(request)))
    }

    /// Transforms the response after the transport replied.
    fn transform_response<'a>(
        &'a self,
        response: ResponseContext,
    ) -> BoxFuture<'a, BerapiResult<ResponseContext>> {
        Box::pin(future::ready(Ok(response)))
    }

    /// Observes a failure of the call.
    ///
    /// `request` is the context at the time of failure.
    fn on_error(&self, error: &BerapiError, request: &RequestContext) {
        let _ = (error, request);
    }
}

/// A request-transform middleware built from a closure.
///
/// # Example
///
/// ```
/// use berapi_core::RequestContext;
/// use berapi_middleware::FnMiddleware;
///
/// let middleware = FnMiddleware::new("trace_header", |request: RequestContext| {
///     request.with_header("X-Trace", "1")
/// });
/// ```
pub struct FnMiddleware<F> {
    name: &'static str,
    func: F,
}

impl<F> FnMiddleware<F> {
    /// Creates a new function-based middleware.
    pub const fn new(name: &'static str, func: F) -> Self {
        Self { name, func }
    }
}

impl<F> std::fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnMiddleware").field("name", &self.name).finish()
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(RequestContext) -> BerapiResult<RequestContext> + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn transform_request<'a>(
        &'a self,
        request: RequestContext,
    ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
        Box::pin(future::ready((self.func)(request)))
    }
}
