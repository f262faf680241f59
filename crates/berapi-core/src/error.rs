//! Error types for a berapi call.
//!
//! [`BerapiError`] is what `send` returns: transport failures, middleware
//! failures, retry exhaustion and deadline expiry. Assertion failures travel
//! on a separate channel (`berapi_assert::AssertionError`) and are never
//! retried.

use std::fmt;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

use crate::context::ResponseContext;

/// Result type alias using [`BerapiError`].
pub type BerapiResult<T> = Result<T, BerapiError>;

/// Failures raised by a transport while performing one attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {message}")]
    Connect {
        /// Human-readable error message.
        message: String,
    },

    /// The attempt did not complete within its timeout.
    #[error("request timed out after {timeout:?}: {message}")]
    Timeout {
        /// The per-attempt timeout that elapsed.
        timeout: Duration,
        /// Human-readable error message.
        message: String,
    },

    /// The request could not be built or sent.
    #[error("request failed: {message}")]
    Request {
        /// Human-readable error message.
        message: String,
    },

    /// The response body could not be read.
    #[error("failed to read response body: {message}")]
    Body {
        /// Human-readable error message.
        message: String,
    },
}

impl TransportError {
    /// Creates a connection error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout: Duration, message: impl Into<String>) -> Self {
        Self::Timeout {
            timeout,
            message: message.into(),
        }
    }

    /// Creates a request error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::Request {
            message: message.into(),
        }
    }

    /// Creates a body read error.
    pub fn body(message: impl Into<String>) -> Self {
        Self::Body {
            message: message.into(),
        }
    }

    /// Returns true if the retry policy may reattempt after this error.
    ///
    /// Only connection and timeout failures are retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}

/// The outcome of the last attempt of an exhausted call.
#[derive(Debug, Clone)]
pub enum LastAttempt {
    /// The last attempt produced a response with a retryable status.
    Response(Box<ResponseContext>),
    /// The last attempt failed in the transport.
    Error(TransportError),
}

impl LastAttempt {
    /// Returns the status of the last response, if there was one.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Response(response) => Some(response.status()),
            Self::Error(_) => None,
        }
    }
}

impl fmt::Display for LastAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Response(response) => write!(f, "last status {}", response.status()),
            Self::Error(error) => write!(f, "last error: {error}"),
        }
    }
}

/// Errors surfaced by a berapi call.
///
/// # Example
///
/// ```
/// use berapi_core::{BerapiError, TransportError};
/// use std::time::Duration;
///
/// let err = BerapiError::from(TransportError::timeout(Duration::from_secs(3), "no reply"));
/// assert!(err.is_retryable());
/// ```
#[derive(Debug, Error)]
pub enum BerapiError {
    /// The transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A middleware transform failed.
    #[error("middleware '{middleware}' failed: {message}")]
    Middleware {
        /// Name of the failing middleware.
        middleware: String,
        /// Human-readable error message.
        message: String,
        /// The error the middleware returned, when it was not already a
        /// middleware error.
        #[source]
        source: Option<Box<BerapiError>>,
    },

    /// The request could not be formed (bad url, header or body).
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Human-readable error message.
        message: String,
    },

    /// Every permitted attempt was used and the last one was still retryable.
    #[error("retries exhausted after {attempts} attempts ({last})")]
    RetryExhausted {
        /// Total number of transport calls made.
        attempts: u32,
        /// Outcome of the last attempt.
        last: LastAttempt,
    },

    /// The overall deadline expired before the call could finish.
    #[error("deadline of {deadline:?} exceeded after {attempts} attempts (elapsed {elapsed:?})")]
    Timeout {
        /// The configured overall deadline.
        deadline: Duration,
        /// Time spent when the deadline check failed.
        elapsed: Duration,
        /// Number of transport calls made before giving up.
        attempts: u32,
    },
}

impl BerapiError {
    /// Creates a middleware error.
    pub fn middleware(middleware: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Middleware {
            middleware: middleware.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Reports `source`, raised inside the named middleware, as a
    /// middleware error that keeps the original as its cause.
    pub fn middleware_caused_by(middleware: impl Into<String>, source: BerapiError) -> Self {
        Self::Middleware {
            middleware: middleware.into(),
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the error wrapped by a middleware error, if any.
    #[must_use]
    pub fn cause(&self) -> Option<&BerapiError> {
        match self {
            Self::Middleware {
                source: Some(source),
                ..
            } => Some(&**source),
            _ => None,
        }
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Returns true if this is a transport failure the retry policy may reattempt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(error) => error.is_retryable(),
            _ => false,
        }
    }

    /// Returns true for deadline expiry and per-attempt transport timeouts.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Transport(TransportError::Timeout { .. })
        )
    }

    /// Returns the number of attempts made, when the error records it.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } | Self::Timeout { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::transport::TransportReply;
    use bytes::Bytes;
    use http::{HeaderMap, Method};

    #[test]
    fn test_transport_error_retryable() {
        assert!(TransportError::connect("refused").is_retryable());
        assert!(TransportError::timeout(Duration::from_secs(1), "slow").is_retryable());
        assert!(!TransportError::request("bad body").is_retryable());
        assert!(!TransportError::body("truncated").is_retryable());
    }

    #[test]
    fn test_berapi_error_retryable() {
        assert!(BerapiError::from(TransportError::connect("refused")).is_retryable());
        assert!(!BerapiError::middleware("auth", "no token").is_retryable());
        assert!(!BerapiError::invalid_request("bad url").is_retryable());
    }

    #[test]
    fn test_middleware_error_display() {
        let err = BerapiError::middleware("bearer_auth", "token missing");
        assert_eq!(err.to_string(), "middleware 'bearer_auth' failed: token missing");
    }

    #[test]
    fn test_middleware_error_keeps_cause() {
        let err = BerapiError::middleware_caused_by(
            "api_key",
            BerapiError::invalid_request("bad header name"),
        );
        assert_eq!(
            err.to_string(),
            "middleware 'api_key' failed: invalid request: bad header name"
        );
        assert!(matches!(err.cause(), Some(BerapiError::InvalidRequest { .. })));
        assert!(std::error::Error::source(&err).is_some());
        assert!(BerapiError::middleware("auth", "no token").cause().is_none());
    }

    #[test]
    fn test_retry_exhausted_carries_last_response() {
        let request = RequestContext::new(Method::GET, "https://example.com").unwrap();
        let response = ResponseContext::from_reply(
            &request,
            TransportReply {
                status: StatusCode::SERVICE_UNAVAILABLE,
                headers: HeaderMap::new(),
                body: Bytes::new(),
                elapsed: Duration::ZERO,
            },
        );
        let err = BerapiError::RetryExhausted {
            attempts: 4,
            last: LastAttempt::Response(Box::new(response)),
        };

        assert_eq!(err.attempts(), Some(4));
        assert!(err.to_string().contains("4 attempts"));
        assert!(err.to_string().contains("503"));
        if let BerapiError::RetryExhausted { last, .. } = err {
            assert_eq!(last.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
        }
    }

    #[test]
    fn test_timeout_classification() {
        let deadline = BerapiError::Timeout {
            deadline: Duration::from_secs(5),
            elapsed: Duration::from_secs(6),
            attempts: 2,
        };
        assert!(deadline.is_timeout());
        assert!(!deadline.is_retryable());
        assert_eq!(deadline.attempts(), Some(2));

        let attempt = BerapiError::from(TransportError::timeout(Duration::from_secs(3), "slow"));
        assert!(attempt.is_timeout());
        assert_eq!(attempt.attempts(), None);
    }
}
