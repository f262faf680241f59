//! The unified error type.

use thiserror::Error;

use berapi_assert::AssertionError;
use berapi_config::ConfigError;
use berapi_core::BerapiError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Any failure a berapi test can hit.
///
/// Lets a test use `?` on both `send()` and the assertions.
#[derive(Debug, Error)]
pub enum Error {
    /// The call failed (transport, middleware, retries, deadline).
    #[error(transparent)]
    Call(#[from] BerapiError),

    /// An assertion failed.
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// Settings could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Returns true if this is an assertion failure.
    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        matches!(self, Self::Assertion(_))
    }
}
