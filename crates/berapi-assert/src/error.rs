//! Assertion failures.
//!
//! Every assertion returns [`AssertionResult`]. The error carries enough
//! context (expected value, actual value, path) to explain the failure
//! without re-running the request.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

/// Result type alias using [`AssertionError`].
pub type AssertionResult<T> = Result<T, AssertionError>;

/// What a dot-path resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum Actual {
    /// The path did not resolve.
    Absent,
    /// The path resolved to this value.
    Value(Value),
}

impl Actual {
    /// Wraps an optional resolved value.
    #[must_use]
    pub fn from_option(value: Option<&Value>) -> Self {
        value.map_or(Self::Absent, |v| Self::Value(v.clone()))
    }

    /// Returns true if the path did not resolve.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl fmt::Display for Actual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => f.write_str("<absent>"),
            Self::Value(value) => write!(f, "{value}"),
        }
    }
}

/// A status class: `2xx`, `3xx`, `4xx` or `5xx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// 200..=299
    Success,
    /// 300..=399
    Redirection,
    /// 400..=499
    ClientError,
    /// 500..=599
    ServerError,
}

impl StatusClass {
    /// Returns the leading digit of the class.
    #[must_use]
    pub const fn digit(self) -> u16 {
        match self {
            Self::Success => 2,
            Self::Redirection => 3,
            Self::ClientError => 4,
            Self::ServerError => 5,
        }
    }

    /// Returns true if `status / 100` equals this class.
    #[must_use]
    pub const fn contains(self, status: u16) -> bool {
        status / 100 == self.digit()
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}xx", self.digit())
    }
}

/// One schema validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value (`""` for the root).
    pub instance_path: String,
    /// Validator message.
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "at root: {}", self.message)
        } else {
            write!(f, "at {}: {}", self.instance_path, self.message)
        }
    }
}

/// Assertion failures.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AssertionError {
    /// Status did not match.
    #[error("expected status {expected}, got {actual}")]
    Status {
        /// Expected status code.
        expected: u16,
        /// Actual status code.
        actual: u16,
    },

    /// Status was outside the expected class.
    #[error("expected {expected} status, got {actual}")]
    StatusClass {
        /// Expected class.
        expected: StatusClass,
        /// Actual status code.
        actual: u16,
    },

    /// Body did not contain the text.
    #[error("expected body to contain '{expected}'")]
    BodyContains {
        /// Missing text.
        expected: String,
    },

    /// Body contained forbidden text.
    #[error("expected body not to contain '{unexpected}'")]
    BodyNotContains {
        /// Text that was found.
        unexpected: String,
    },

    /// Body length did not match.
    #[error("expected body length {expected}, got {actual}")]
    BodyLength {
        /// Expected length in characters.
        expected: usize,
        /// Actual length in characters.
        actual: usize,
    },

    /// Some values were not found in the body.
    #[error("body is missing {} value(s): {}", .missing.len(), .missing.join(", "))]
    MissingValues {
        /// Every value that was not found.
        missing: Vec<String>,
    },

    /// A dot-path check failed.
    #[error("at '{path}': expected {expected}, got {actual}")]
    JsonPath {
        /// The queried path.
        path: String,
        /// Description of the expectation.
        expected: String,
        /// What the path resolved to.
        actual: Actual,
    },

    /// The body is not valid JSON.
    #[error("response body is not valid JSON: {message}")]
    JsonDecode {
        /// Parser message.
        message: String,
    },

    /// The body does not match the schema.
    #[error("schema validation failed: {}", join(.violations))]
    Schema {
        /// Every violation found.
        violations: Vec<SchemaViolation>,
    },

    /// The schema itself is invalid.
    #[error("invalid JSON schema: {message}")]
    InvalidSchema {
        /// Compiler message.
        message: String,
    },

    /// Header value did not match.
    #[error("header '{name}': expected '{expected}', got '{actual}'")]
    Header {
        /// Header name.
        name: String,
        /// Expected value.
        expected: String,
        /// Actual value.
        actual: String,
    },

    /// Header was not present.
    #[error("header '{name}' not found")]
    HeaderMissing {
        /// Header name.
        name: String,
    },

    /// Content-Type did not contain the text.
    #[error("expected Content-Type containing '{expected}', got {}", .actual.as_deref().unwrap_or("none"))]
    ContentType {
        /// Expected fragment.
        expected: String,
        /// Actual Content-Type, if any.
        actual: Option<String>,
    },

    /// The response took too long.
    #[error("expected response within {limit:?}, took {actual:?}")]
    ResponseTime {
        /// Allowed time.
        limit: Duration,
        /// Measured time.
        actual: Duration,
    },

    /// A schema or sample file could not be read.
    #[error("cannot load fixture {path}: {message}")]
    Fixture {
        /// Path to the file.
        path: PathBuf,
        /// Reason.
        message: String,
    },

    /// Soft checks recorded failures.
    #[error("{} soft assertion(s) failed: {}", .failures.len(), join(.failures))]
    SoftFailures {
        /// Every recorded failure, in order.
        failures: Vec<AssertionError>,
    },
}

impl AssertionError {
    /// Creates a dot-path failure.
    pub fn json_path(path: impl Into<String>, expected: impl Into<String>, actual: Actual) -> Self {
        Self::JsonPath {
            path: path.into(),
            expected: expected.into(),
            actual,
        }
    }

    /// Creates a fixture failure.
    pub fn fixture(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.into(),
            message: message.into(),
        }
    }
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_class() {
        assert!(StatusClass::Success.contains(204));
        assert!(!StatusClass::Success.contains(300));
        assert!(StatusClass::ServerError.contains(503));
        assert_eq!(StatusClass::ClientError.to_string(), "4xx");
    }

    #[test]
    fn test_json_path_display() {
        let err = AssertionError::json_path("user.email", "present", Actual::Absent);
        assert_eq!(err.to_string(), "at 'user.email': expected present, got <absent>");

        let err = AssertionError::json_path("id", "== 2", Actual::Value(json!(1)));
        assert_eq!(err.to_string(), "at 'id': expected == 2, got 1");
    }

    #[test]
    fn test_missing_values_display() {
        let err = AssertionError::MissingValues {
            missing: vec!["gamma".to_string()],
        };
        assert_eq!(err.to_string(), "body is missing 1 value(s): gamma");
    }

    #[test]
    fn test_schema_display() {
        let err = AssertionError::Schema {
            violations: vec![
                SchemaViolation {
                    instance_path: String::new(),
                    message: "\"id\" is a required property".to_string(),
                },
                SchemaViolation {
                    instance_path: "/name".to_string(),
                    message: "1 is not of type \"string\"".to_string(),
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("at root: \"id\" is a required property"));
        assert!(text.contains("at /name:"));
    }

    #[test]
    fn test_soft_failures_display() {
        let err = AssertionError::SoftFailures {
            failures: vec![
                AssertionError::Status {
                    expected: 200,
                    actual: 404,
                },
                AssertionError::BodyContains {
                    expected: "ok".to_string(),
                },
            ],
        };
        assert!(err.to_string().starts_with("2 soft assertion(s) failed"));
    }
}
