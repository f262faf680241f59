//! Request/response tracking for reports.
//!
//! [`RequestTracker`] keeps a bounded history of exchanges, one per attempt,
//! so a failing test can show exactly what went over the wire. It is shared
//! through an `Arc`: the [`TrackingMiddleware`] writes to it, the host reads
//! [`RequestTracker::entries`] and renders them however it likes.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use berapi_middleware::{Pipeline, RequestTracker, TrackingMiddleware};
//!
//! let tracker = Arc::new(RequestTracker::new().mask_header("Authorization"));
//! let pipeline = Pipeline::builder()
//!     .add(TrackingMiddleware::new(Arc::clone(&tracker)))
//!     .build();
//!
//! assert!(tracker.is_empty());
//! ```

use std::collections::{HashSet, VecDeque};
use std::future;
use std::sync::Arc;

use berapi_core::{
    BerapiError, BerapiResult, BoxFuture, RequestContext, RequestId, ResponseContext,
};
use http::HeaderMap;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::middleware::Middleware;

/// Replacement value for masked headers.
pub const MASKED: &str = "***MASKED***";

/// Default number of exchanges kept.
pub const DEFAULT_MAX_REQUESTS: usize = 100;

/// One tracked attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedExchange {
    /// Request ID shared by every attempt of the call.
    pub request_id: RequestId,
    /// Attempt number (0 = original).
    pub attempt: u32,
    /// HTTP method.
    pub method: String,
    /// Absolute url.
    pub url: String,
    /// Request headers, masked.
    pub request_headers: IndexMap<String, String>,
    /// Request body as text.
    pub request_body: Option<String>,
    /// Response status, once a response arrived.
    pub status: Option<u16>,
    /// Response headers, masked.
    pub response_headers: IndexMap<String, String>,
    /// Response body as text.
    pub response_body: Option<String>,
    /// Time the transport waited, in milliseconds.
    pub elapsed_ms: Option<u64>,
    /// Failure message, if the attempt failed.
    pub error: Option<String>,
}

/// Bounded, thread-safe history of exchanges.
#[derive(Debug)]
pub struct RequestTracker {
    max_requests: usize,
    mask_headers: HashSet<String>,
    entries: Mutex<VecDeque<TrackedExchange>>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTracker {
    /// Creates a tracker keeping the last 100 exchanges.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_REQUESTS)
    }

    /// Creates a tracker keeping the last `max_requests` exchanges.
    #[must_use]
    pub fn with_capacity(max_requests: usize) -> Self {
        Self {
            max_requests,
            mask_headers: HashSet::new(),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Masks `name` (case-insensitive) in recorded headers.
    #[must_use]
    pub fn mask_header(mut self, name: impl AsRef<str>) -> Self {
        self.mask_headers.insert(name.as_ref().to_ascii_lowercase());
        self
    }

    /// Masks every header in `names`.
    #[must_use]
    pub fn mask_headers<I, S>(self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names
            .into_iter()
            .fold(self, |tracker, name| tracker.mask_header(name))
    }

    /// Returns the maximum number of exchanges kept.
    pub const fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Records an outgoing attempt. The oldest entry is evicted once the
    /// history is full.
    pub fn track_request(&self, request: &RequestContext) {
        if self.max_requests == 0 {
            return;
        }

        let entry = TrackedExchange {
            request_id: request.request_id(),
            attempt: request.attempt(),
            method: request.method().to_string(),
            url: request.url().to_string(),
            request_headers: self.render_headers(request.headers()),
            request_body: request.body().map(|body| render_body(body)),
            status: None,
            response_headers: IndexMap::new(),
            response_body: None,
            elapsed_ms: None,
            error: None,
        };

        let mut entries = self.entries.lock();
        while entries.len() >= self.max_requests {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Attaches a response to the matching attempt.
    ///
    /// Responses whose attempt is no longer (or was never) tracked are
    /// ignored.
    pub fn track_response(&self, response: &ResponseContext) {
        let headers = self.render_headers(response.headers());
        let mut entries = self.entries.lock();
        if let Some(entry) = find(&mut entries, response.request_id(), response.attempt()) {
            entry.status = Some(response.status().as_u16());
            entry.response_headers = headers;
            entry.response_body = Some(render_body(response.body()));
            entry.elapsed_ms = Some(response.elapsed().as_millis() as u64);
        }
    }

    /// Attaches a failure to the matching attempt, recording the attempt
    /// first if a request transform failed before it was tracked.
    pub fn track_error(&self, error: &BerapiError, request: &RequestContext) {
        let tracked = {
            let mut entries = self.entries.lock();
            match find(&mut entries, request.request_id(), request.attempt()) {
                Some(entry) => {
                    entry.error = Some(error.to_string());
                    true
                }
                None => false,
            }
        };

        if !tracked {
            self.track_request(request);
            let mut entries = self.entries.lock();
            if let Some(entry) = find(&mut entries, request.request_id(), request.attempt()) {
                entry.error = Some(error.to_string());
            }
        }
    }

    /// Returns a snapshot of the history, oldest first.
    pub fn entries(&self) -> Vec<TrackedExchange> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Returns the most recent exchange.
    pub fn last(&self) -> Option<TrackedExchange> {
        self.entries.lock().back().cloned()
    }

    /// Returns the number of tracked exchanges.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns true if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Forgets every tracked exchange.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    // Repeated headers are joined with ", " so none is dropped.
    fn render_headers(&self, headers: &HeaderMap) -> IndexMap<String, String> {
        let mut rendered: IndexMap<String, String> = IndexMap::new();
        for (name, value) in headers {
            let name = name.as_str();
            if self.mask_headers.contains(name) {
                rendered.insert(name.to_string(), MASKED.to_string());
                continue;
            }
            let value = String::from_utf8_lossy(value.as_bytes());
            rendered
                .entry(name.to_string())
                .and_modify(|joined| {
                    joined.push_str(", ");
                    joined.push_str(&value);
                })
                .or_insert_with(|| value.into_owned());
        }
        rendered
    }
}

fn find(
    entries: &mut VecDeque<TrackedExchange>,
    request_id: RequestId,
    attempt: u32,
) -> Option<&mut TrackedExchange> {
    entries
        .iter_mut()
        .rev()
        .find(|entry| entry.request_id == request_id && entry.attempt == attempt)
}

fn render_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => "<binary data>".to_string(),
    }
}

/// Middleware that feeds a shared [`RequestTracker`].
#[derive(Debug, Clone)]
pub struct TrackingMiddleware {
    tracker: Arc<RequestTracker>,
}

impl TrackingMiddleware {
    /// Creates the middleware writing to `tracker`.
    pub const fn new(tracker: Arc<RequestTracker>) -> Self {
        Self { tracker }
    }

    /// Returns the tracker this middleware writes to.
    pub const fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }
}

impl Middleware for TrackingMiddleware {
    fn name(&self) -> &'static str {
        "tracking"
    }

    fn transform_request<'a>(
        &'a self,
        request: RequestContext,
    ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
        self.tracker.track_request(&request);
        Box::pin(future::ready(Ok(request)))
    }

    fn transform_response<'a>(
        &'a self,
        response: ResponseContext,
    ) -> BoxFuture<'a, BerapiResult<ResponseContext>> {
        self.tracker.track_response(&response);
        Box::pin(future::ready(Ok(response)))
    }

    fn on_error(&self, error: &BerapiError, request: &RequestContext) {
        self.tracker.track_error(error, request);
    }
}
