//! End-to-end pipeline integration tests.
//!
//! These tests run the built-in middlewares together against an in-memory
//! transport:
//!
//! 1. Logging - request/response events
//! 2. Bearer auth - Authorization header
//! 3. API key - key header
//! 4. Tracking - shared history with masking

use std::sync::Arc;
use std::time::Duration;

use berapi_core::{
    BerapiError, BoxFuture, RequestContext, Transport, TransportError, TransportReply,
};
use berapi_middleware::{
    ApiKeyMiddleware, BearerAuthMiddleware, FnMiddleware, LoggingMiddleware, Pipeline,
    RequestTracker, TrackingMiddleware, MASKED,
};
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

/// Echoes the request headers back as a JSON body.
struct EchoHeaders;

impl Transport for EchoHeaders {
    fn send<'a>(
        &'a self,
        request: &'a RequestContext,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        Box::pin(async move {
            let headers: serde_json::Map<String, serde_json::Value> = request
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        serde_json::Value::from(value.to_str().unwrap_or_default()),
                    )
                })
                .collect();
            let mut reply_headers = HeaderMap::new();
            reply_headers.insert("content-type", "application/json".parse().unwrap());
            Ok(TransportReply {
                status: StatusCode::OK,
                headers: reply_headers,
                body: Bytes::from(serde_json::Value::Object(headers).to_string()),
                elapsed: Duration::from_millis(3),
            })
        })
    }
}

struct Refused;

impl Transport for Refused {
    fn send<'a>(
        &'a self,
        _request: &'a RequestContext,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        Box::pin(async { Err(TransportError::connect("connection refused")) })
    }
}

fn full_pipeline(tracker: &Arc<RequestTracker>) -> Pipeline {
    Pipeline::builder()
        .add(LoggingMiddleware::new())
        .add(BearerAuthMiddleware::new("test-token-123"))
        .add(ApiKeyMiddleware::new("secret-key"))
        .add(TrackingMiddleware::new(Arc::clone(tracker)))
        .build()
}

#[tokio::test]
async fn test_full_pipeline_success() {
    let tracker = Arc::new(RequestTracker::new().mask_headers(["Authorization", "X-API-Key"]));
    let pipeline = full_pipeline(&tracker);
    assert_eq!(
        pipeline.names(),
        vec!["logging", "bearer_auth", "api_key", "tracking"]
    );

    let request = RequestContext::new(Method::GET, "https://api.example.com/users/1").unwrap();
    let response = pipeline
        .dispatch(request, &EchoHeaders, Duration::from_secs(3))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echoed: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(echoed["authorization"], "Bearer test-token-123");
    assert_eq!(echoed["x-api-key"], "secret-key");

    // the tracker runs last, so it sees the auth headers, masked
    let entry = tracker.last().unwrap();
    assert_eq!(entry.status, Some(200));
    assert_eq!(entry.request_headers.get("authorization").unwrap(), MASKED);
    assert_eq!(entry.request_headers.get("x-api-key").unwrap(), MASKED);
    assert!(entry.response_body.unwrap().contains("Bearer test-token-123"));
}

#[tokio::test]
async fn test_full_pipeline_transport_failure_is_tracked() {
    let tracker = Arc::new(RequestTracker::new());
    let pipeline = full_pipeline(&tracker);

    let request = RequestContext::new(Method::DELETE, "https://api.example.com/users/1").unwrap();
    let err = pipeline
        .dispatch(request, &Refused, Duration::from_secs(3))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    let entry = tracker.last().unwrap();
    assert_eq!(entry.method, "DELETE");
    assert_eq!(entry.status, None);
    assert!(entry.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_failing_middleware_stops_before_transport() {
    let tracker = Arc::new(RequestTracker::new());
    let pipeline = Pipeline::builder()
        .add(TrackingMiddleware::new(Arc::clone(&tracker)))
        .add(FnMiddleware::new("guard", |request: RequestContext| {
            if request.header("authorization").is_none() {
                return Err(BerapiError::invalid_request("missing credentials"));
            }
            Ok(request)
        }))
        .build();

    let request = RequestContext::new(Method::GET, "https://api.example.com/private").unwrap();
    let err = pipeline
        .dispatch(request, &EchoHeaders, Duration::from_secs(3))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        BerapiError::Middleware { ref middleware, .. } if middleware == "guard"
    ));
    assert!(!err.is_retryable());

    let entries = tracker.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, None);
    assert!(entries[0].error.as_deref().unwrap().contains("missing credentials"));
}
