//! The transport capability.
//!
//! berapi never opens sockets itself. A [`Transport`] performs one attempt:
//! it sends the dispatched [`RequestContext`] and returns the raw reply, or a
//! [`TransportError`] the retry policy can classify.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::context::RequestContext;
use crate::error::TransportError;

/// A boxed future, used to keep [`Transport`] object safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The raw reply to one attempt.
#[derive(Debug, Clone)]
pub struct TransportReply {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body.
    pub body: Bytes,
    /// Time spent waiting for the full reply.
    pub elapsed: Duration,
}

/// Performs network I/O for one attempt.
///
/// Implementations must bound the wait by `timeout` and report it as
/// [`TransportError::Timeout`]. A transport shared by a cloned client is
/// called concurrently, so it must be safe for concurrent use.
///
/// # Example
///
/// ```ignore
/// struct Canned;
///
/// impl Transport for Canned {
///     fn send<'a>(
///         &'a self,
///         _request: &'a RequestContext,
///         _timeout: Duration,
///     ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
///         Box::pin(async move {
///             Ok(TransportReply {
///                 status: StatusCode::OK,
///                 headers: HeaderMap::new(),
///                 body: Bytes::from_static(b"{}"),
///                 elapsed: Duration::ZERO,
///             })
///         })
///     }
/// }
/// ```
pub trait Transport: Send + Sync + 'static {
    /// Sends `request` and waits at most `timeout` for the complete reply.
    fn send<'a>(
        &'a self,
        request: &'a RequestContext,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send<'a>(
        &'a self,
        request: &'a RequestContext,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        (**self).send(request, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    struct Echo;

    impl Transport for Echo {
        fn send<'a>(
            &'a self,
            request: &'a RequestContext,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
            Box::pin(async move {
                Ok(TransportReply {
                    status: StatusCode::OK,
                    headers: HeaderMap::new(),
                    body: Bytes::from(request.url().to_string()),
                    elapsed: Duration::ZERO,
                })
            })
        }
    }

    #[tokio::test]
    async fn test_transport_through_arc() {
        let transport: Arc<dyn Transport> = Arc::new(Echo);
        let request = RequestContext::new(Method::GET, "https://example.com/echo").unwrap();

        let reply = transport.send(&request, Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body, Bytes::from("https://example.com/echo"));
    }
}
