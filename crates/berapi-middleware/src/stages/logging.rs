//! Structured logging middleware.
//!
//! Emits one event when an attempt leaves, one when its response comes
//! back and one for every failure. Field names follow
//! `berapi_telemetry::fields`.
//!
//! # Example
//!
//! ```
//! use berapi_middleware::{LoggingMiddleware, Pipeline};
//!
//! let pipeline = Pipeline::builder()
//!     .add(LoggingMiddleware::new().verbose(true))
//!     .build();
//! ```

use std::future;

use berapi_core::{BerapiError, BerapiResult, BoxFuture, RequestContext, ResponseContext};

use crate::middleware::Middleware;

/// Middleware that logs every attempt.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMiddleware {
    /// Also log headers and bodies at `debug`.
    verbose: bool,
}

impl LoggingMiddleware {
    /// Creates a logging middleware that logs request lines and statuses.
    #[must_use]
    pub const fn new() -> Self {
        Self { verbose: false }
    }

    /// Enables header and body logging.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Middleware for LoggingMiddleware {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn transform_request<'a>(
        &'a self,
        request: RequestContext,
    ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
        tracing::info!(
            request_id = %request.request_id(),
            attempt = request.attempt(),
            http.method = %request.method(),
            http.url = %request.url(),
            "request"
        );
        if self.verbose {
            tracing::debug!(
                request_id = %request.request_id(),
                headers = ?request.headers(),
                body = request.body_text().as_deref().unwrap_or(""),
                "request details"
            );
        }
        Box::pin(future::ready(Ok(request)))
    }

    fn transform_response<'a>(
        &'a self,
        response: ResponseContext,
    ) -> BoxFuture<'a, BerapiResult<ResponseContext>> {
        tracing::info!(
            request_id = %response.request_id(),
            attempt = response.attempt(),
            http.method = %response.method(),
            http.url = %response.url(),
            http.status_code = response.status().as_u16(),
            duration_ms = response.elapsed().as_millis() as u64,
            "response"
        );
        if self.verbose {
            tracing::debug!(
                request_id = %response.request_id(),
                headers = ?response.headers(),
                body = %String::from_utf8_lossy(response.body()),
                "response details"
            );
        }
        Box::pin(future::ready(Ok(response)))
    }

    fn on_error(&self, error: &BerapiError, request: &RequestContext) {
        tracing::warn!(
            request_id = %request.request_id(),
            attempt = request.attempt(),
            http.method = %request.method(),
            http.url = %request.url(),
            error = %error,
            "request failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use berapi_core::TransportReply;
    use berapi_telemetry::fields;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::{Event, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the field names of every event.
    struct FieldNames(Arc<Mutex<HashSet<&'static str>>>);

    impl<S: Subscriber> Layer<S> for FieldNames {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            self.0
                .lock()
                .extend(event.metadata().fields().iter().map(|field| field.name()));
        }
    }

    #[test]
    fn test_event_fields_match_telemetry_names() {
        let names = Arc::new(Mutex::new(HashSet::new()));
        let subscriber = tracing_subscriber::registry().with(FieldNames(Arc::clone(&names)));

        tracing::subscriber::with_default(subscriber, || {
            let middleware = LoggingMiddleware::new();
            let request = RequestContext::new(Method::GET, "https://example.com/users").unwrap();
            drop(middleware.transform_request(request.clone()));

            let response = ResponseContext::from_reply(
                &request,
                TransportReply {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::new(),
                    elapsed: Duration::from_millis(3),
                },
            );
            drop(middleware.transform_response(response));
            middleware.on_error(&BerapiError::invalid_request("bad"), &request);
        });

        let names = names.lock();
        for field in [
            fields::REQUEST_ID,
            fields::ATTEMPT,
            fields::HTTP_METHOD,
            fields::HTTP_URL,
            fields::HTTP_STATUS,
            fields::DURATION_MS,
            fields::ERROR,
        ] {
            assert!(names.contains(field), "no event carries '{field}'");
        }
    }

    #[tokio::test]
    async fn test_logging_passes_contexts_through() {
        let middleware = LoggingMiddleware::new().verbose(true);
        let request = RequestContext::new(Method::POST, "https://example.com/users")
            .unwrap()
            .with_body(r#"{"name":"x"}"#);
        let id = request.request_id();

        let out = middleware.transform_request(request).await.unwrap();
        assert_eq!(out.request_id(), id);
        assert_eq!(out.body_text().as_deref(), Some(r#"{"name":"x"}"#));
        assert_eq!(middleware.name(), "logging");
    }
}
