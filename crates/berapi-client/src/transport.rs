//! The default transport, backed by `reqwest`.

use std::time::{Duration, Instant};

use berapi_core::{BoxFuture, RequestContext, Transport, TransportError, TransportReply};

/// [`Transport`] that performs real HTTP I/O with a shared `reqwest::Client`.
///
/// Connection pooling, TLS and redirects are left to `reqwest`. The
/// per-attempt timeout is applied to each request.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Request`] if the client cannot be built
    /// (for example when the TLS backend fails to initialize).
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(16)
            .build()
            .map_err(|e| TransportError::request(format!("failed to create client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps an existing `reqwest` client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Returns the underlying `reqwest` client.
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }

    async fn perform(
        &self,
        request: &RequestContext,
        timeout: Duration,
    ) -> Result<TransportReply, TransportError> {
        let started = Instant::now();

        let mut builder = self
            .client
            .request(request.method().clone(), request.url())
            .headers(request.headers().clone())
            .timeout(timeout);
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::timeout(timeout, e.to_string())
            } else {
                TransportError::body(e.to_string())
            }
        })?;

        Ok(TransportReply {
            status,
            headers,
            body,
            elapsed: started.elapsed(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a RequestContext,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportReply, TransportError>> {
        Box::pin(self.perform(request, timeout))
    }
}

fn classify(error: &reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::timeout(timeout, error.to_string())
    } else if error.is_connect() {
        TransportError::connect(error.to_string())
    } else {
        TransportError::request(error.to_string())
    }
}
