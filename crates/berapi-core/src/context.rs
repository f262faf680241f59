//! Request and response context types.
//!
//! A [`RequestContext`] describes what a call is about to dispatch. Middleware
//! transforms consume a context and hand back a new one; there is no API for
//! mutating a context in place. A [`ResponseContext`] is built once from the
//! transport reply and is immutable afterwards.

use std::borrow::Cow;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BerapiError, BerapiResult};
use crate::transport::TransportReply;

/// Methods a berapi call may use.
pub const SUPPORTED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
];

/// A unique identifier for each logical call, using UUID v7.
///
/// Every attempt of a retried call shares the same request ID, which lets a
/// tracker or a log reader group attempts together.
///
/// # Example
///
/// ```
/// use berapi_core::RequestId;
///
/// let id = RequestId::new();
/// println!("Request ID: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new unique request ID using UUID v7.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `RequestId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// The request a call dispatches, as seen by middleware and the transport.
///
/// # Invariants
///
/// - `url` is absolute (scheme and authority present)
/// - `method` is one of [`SUPPORTED_METHODS`]
///
/// # Example
///
/// ```
/// use berapi_core::RequestContext;
/// use http::Method;
///
/// let ctx = RequestContext::new(Method::GET, "https://api.example.com/users/1")
///     .unwrap()
///     .with_header("Accept", "application/json")
///     .unwrap();
///
/// assert_eq!(ctx.header("accept"), Some("application/json"));
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: RequestId,
    attempt: u32,
    method: Method,
    url: String,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl RequestContext {
    /// Creates a context for `method` against an absolute `url`.
    ///
    /// Fails with [`BerapiError::InvalidRequest`] if the method is not
    /// supported or the url is not absolute.
    pub fn new(method: Method, url: impl Into<String>) -> BerapiResult<Self> {
        if !SUPPORTED_METHODS.contains(&method) {
            return Err(BerapiError::invalid_request(format!(
                "unsupported method: {method}"
            )));
        }
        let url = url.into();
        ensure_absolute(&url)?;

        Ok(Self {
            request_id: RequestId::new(),
            attempt: 0,
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        })
    }

    /// Returns the request ID shared by every attempt of this call.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the attempt number (0 is the original attempt).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute url.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the request body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body.as_ref().map(|b| String::from_utf8_lossy(b))
    }

    /// Returns a context with `name` set to `value`, replacing earlier values.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> BerapiResult<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Returns a context with every header of `headers` set.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in &headers {
            self.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Returns a context without the header `name`.
    #[must_use]
    pub fn without_header(mut self, name: &str) -> Self {
        self.headers.remove(name);
        self
    }

    /// Returns a context carrying `body`.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns a context pointing at another absolute url.
    pub fn with_url(mut self, url: impl Into<String>) -> BerapiResult<Self> {
        let url = url.into();
        ensure_absolute(&url)?;
        self.url = url;
        Ok(self)
    }

    /// Returns a context for the given attempt number.
    #[must_use]
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Returns a context carrying a specific request ID.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Immutable snapshot of one completed transport reply.
///
/// Besides the reply itself the context remembers which request produced
/// it, so response-side middleware can correlate without shared state.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    request_id: RequestId,
    attempt: u32,
    method: Method,
    url: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    elapsed: Duration,
}

impl ResponseContext {
    /// Builds the context from the dispatched request and its reply.
    #[must_use]
    pub fn from_reply(request: &RequestContext, reply: TransportReply) -> Self {
        Self {
            request_id: request.request_id,
            attempt: request.attempt,
            method: request.method.clone(),
            url: request.url.clone(),
            status: reply.status,
            headers: reply.headers,
            body: reply.body,
            elapsed: reply.elapsed,
        }
    }

    /// Builds a context that no transport produced, for fixtures.
    ///
    /// The recorded request is `GET http://localhost/`, attempt 0.
    #[must_use]
    pub fn synthetic(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            request_id: RequestId::new(),
            attempt: 0,
            method: Method::GET,
            url: "http://localhost/".to_string(),
            status,
            headers,
            body,
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the request ID of the call that produced this reply.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the attempt number that produced this reply.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the method of the dispatched request.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the url of the dispatched request.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the time the transport spent on this attempt.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns a context with `name` set to `value`.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> BerapiResult<Self> {
        let (name, value) = parse_header(name.as_ref(), value.as_ref())?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Returns a context carrying a replacement body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

fn ensure_absolute(url: &str) -> BerapiResult<()> {
    let uri: Uri = url
        .parse()
        .map_err(|e| BerapiError::invalid_request(format!("invalid url '{url}': {e}")))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(BerapiError::invalid_request(format!(
            "url must be absolute: '{url}'"
        )));
    }
    Ok(())
}

fn parse_header(name: &str, value: &str) -> BerapiResult<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| BerapiError::invalid_request(format!("invalid header name '{name}': {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| BerapiError::invalid_request(format!("invalid value for header '{name}': {e}")))?;
    Ok((name, value))
}
