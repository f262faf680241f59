//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::time::Duration;

use berapi_core::{BoxFuture, RequestContext, Transport, TransportError, TransportReply};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;

/// A canned reply for [`MockTransport`].
#[derive(Debug, Clone)]
#[must_use]
pub struct MockReply {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    delay: Duration,
}

impl MockReply {
    /// Creates an empty reply with `status`.
    ///
    /// Unknown codes fall back to 500.
    pub fn new(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            delay: Duration::ZERO,
        }
    }

    /// Adds a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and `Content-Type: application/json`.
    pub fn json(mut self, body: &Value) -> Self {
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Bytes::from(body.to_string());
        self
    }

    /// Makes the transport wait before replying.
    ///
    /// A delay longer than the attempt timeout produces a timeout error.
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Reply(MockReply),
    Fail(TransportError),
}

/// One call seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The dispatched request, after every request transform.
    pub request: RequestContext,
    /// The per-attempt timeout the call was given.
    pub timeout: Duration,
}

/// [`Transport`] that plays back a script of replies and errors.
///
/// Each call consumes the next scripted entry; once the script is down to
/// its last entry, that entry repeats. Every call is recorded.
///
/// # Example
///
/// ```
/// use berapi_client::{MockReply, MockTransport};
/// use berapi_core::TransportError;
///
/// let transport = MockTransport::new()
///     .fail(TransportError::connect("refused"))
///     .reply(MockReply::new(200).body("ok"));
/// assert_eq!(transport.call_count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockTransport {
    /// Creates a transport with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a reply to the script.
    #[must_use]
    pub fn reply(self, reply: MockReply) -> Self {
        self.script.lock().push_back(Scripted::Reply(reply));
        self
    }

    /// Appends a transport failure to the script.
    #[must_use]
    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().push_back(Scripted::Fail(error));
        self
    }

    /// Shorthand for a reply with `status` and a JSON body.
    #[must_use]
    pub fn json(self, status: u16, body: &Value) -> Self {
        self.reply(MockReply::new(status).json(body))
    }

    /// Returns every recorded call, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the number of calls made.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn next(&self) -> Option<Scripted> {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }

    async fn perform(
        &self,
        request: &RequestContext,
        timeout: Duration,
    ) -> Result<TransportReply, TransportError> {
        self.calls.lock().push(RecordedCall {
            request: request.clone(),
            timeout,
        });

        let reply = match self.next() {
            Some(Scripted::Reply(reply)) => reply,
            Some(Scripted::Fail(error)) => return Err(error),
            None => return Err(TransportError::request("mock transport has no scripted reply")),
        };

        if reply.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(TransportError::timeout(timeout, "mock reply delayed past timeout"));
        }
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }

        Ok(TransportReply {
            status: reply.status,
            headers: reply.headers,
            body: reply.body,
            elapsed: reply.delay,
        })
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestContext,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        Box::pin(self.perform(request, timeout))
    }
}
