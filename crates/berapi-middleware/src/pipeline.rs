//! Ordered middleware pipeline.
//!
//! The pipeline wraps one attempt in onion order:
//!
//! ```text
//! request  → M1 → M2 → … → Mn → transport
//! response ← M1 ← M2 ← … ← Mn ←───┘
//! ```
//!
//! Any failure (a request transform, the transport, a response transform)
//! is broadcast to every middleware's `on_error` hook in registration order
//! before it is returned. The pipeline is immutable once built.

use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

use berapi_core::{BerapiError, BerapiResult, RequestContext, ResponseContext, Transport};
use tracing::{debug, warn};

use crate::middleware::{BoxedMiddleware, Middleware};

/// An immutable, ordered list of middlewares.
///
/// # Example
///
/// ```
/// use berapi_middleware::{BearerAuthMiddleware, LoggingMiddleware, Pipeline};
///
/// let pipeline = Pipeline::builder()
///     .add(LoggingMiddleware::new())
///     .add(BearerAuthMiddleware::new("token"))
///     .build();
///
/// assert_eq!(pipeline.names(), vec!["logging", "bearer_auth"]);
/// ```
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Returns the middleware names in registration order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Returns the number of middlewares.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the pipeline has no middlewares.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every request transform in registration order.
    ///
    /// On failure the remaining transforms are skipped, `on_error` is
    /// broadcast with the context that was handed to the failing
    /// middleware, and the error is returned as
    /// [`BerapiError::Middleware`].
    pub async fn prepare(&self, request: RequestContext) -> BerapiResult<RequestContext> {
        let mut current = request;

        for stage in &self.stages {
            let snapshot = current.clone();
            match stage.transform_request(current).await {
                Ok(next) => current = next,
                Err(error) => {
                    let error = attribute(stage.as_ref(), error);
                    debug!(
                        middleware = stage.name(),
                        request_id = %snapshot.request_id(),
                        error = %error,
                        "request transform failed"
                    );
                    self.notify_error(&error, &snapshot);
                    return Err(error);
                }
            }
        }

        Ok(current)
    }

    /// Runs every response transform in reverse registration order.
    ///
    /// `request` is the dispatched context, handed to `on_error` if a
    /// transform fails.
    pub async fn complete(
        &self,
        request: &RequestContext,
        response: ResponseContext,
    ) -> BerapiResult<ResponseContext> {
        let mut current = response;

        for stage in self.stages.iter().rev() {
            match stage.transform_response(current).await {
                Ok(next) => current = next,
                Err(error) => {
                    let error = attribute(stage.as_ref(), error);
                    debug!(
                        middleware = stage.name(),
                        request_id = %request.request_id(),
                        error = %error,
                        "response transform failed"
                    );
                    self.notify_error(&error, request);
                    return Err(error);
                }
            }
        }

        Ok(current)
    }

    /// Broadcasts `error` to every middleware's `on_error` hook in
    /// registration order.
    ///
    /// A panicking hook is logged and skipped; the remaining hooks still run.
    pub fn notify_error(&self, error: &BerapiError, request: &RequestContext) {
        for stage in &self.stages {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| stage.on_error(error, request)));
            if outcome.is_err() {
                warn!(
                    middleware = stage.name(),
                    request_id = %request.request_id(),
                    "on_error hook panicked, ignoring"
                );
            }
        }
    }

    /// Performs one attempt: request transforms, the transport call, then
    /// response transforms.
    ///
    /// Transport failures are broadcast to `on_error` and returned as
    /// [`BerapiError::Transport`] so the caller can classify them.
    pub async fn dispatch<T>(
        &self,
        request: RequestContext,
        transport: &T,
        timeout: Duration,
    ) -> BerapiResult<ResponseContext>
    where
        T: Transport + ?Sized,
    {
        let request = self.prepare(request).await?;

        debug!(
            request_id = %request.request_id(),
            attempt = request.attempt(),
            http.method = %request.method(),
            http.url = %request.url(),
            timeout_ms = timeout.as_millis() as u64,
            "dispatching attempt"
        );

        let reply = match transport.send(&request, timeout).await {
            Ok(reply) => reply,
            Err(error) => {
                let error = BerapiError::from(error);
                self.notify_error(&error, &request);
                return Err(error);
            }
        };

        let response = ResponseContext::from_reply(&request, reply);
        self.complete(&request, response).await
    }
}

// Errors raised by a middleware are reported under its name, keeping the
// original as the cause.
fn attribute(stage: &dyn Middleware, error: BerapiError) -> BerapiError {
    match error {
        BerapiError::Middleware { .. } => error,
        other => BerapiError::middleware_caused_by(stage.name(), other),
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
#[must_use]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a middleware.
    pub fn add<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(std::sync::Arc::new(middleware));
        self
    }

    /// Appends a middleware that is also held elsewhere.
    pub fn add_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the immutable pipeline.
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}
