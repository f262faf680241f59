//! Soft assertions.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::error::{AssertionResult, StatusClass};
use crate::response::Response;

/// Mirror of the [`Response`] assertions that records failures on the
/// response instead of returning them.
///
/// Obtained from [`Response::soft`]. Each check logs a warning on failure
/// and keeps going; [`Response::assert_no_soft_failures`] reports the batch.
#[derive(Clone, Copy)]
pub struct Soft<'a> {
    response: &'a Response,
}

impl<'a> Soft<'a> {
    pub(crate) const fn new(response: &'a Response) -> Self {
        Self { response }
    }

    /// Returns the response being checked.
    pub const fn response(self) -> &'a Response {
        self.response
    }

    fn record(self, result: AssertionResult<&Response>) -> Self {
        if let Err(error) = result {
            self.response.record_soft_failure(error);
        }
        self
    }

    /// See [`Response::assert_status`].
    pub fn assert_status(self, expected: u16) -> Self {
        self.record(self.response.assert_status(expected))
    }

    /// See [`Response::assert_status_class`].
    pub fn assert_status_class(self, class: StatusClass) -> Self {
        self.record(self.response.assert_status_class(class))
    }

    /// See [`Response::assert_2xx`].
    pub fn assert_2xx(self) -> Self {
        self.record(self.response.assert_2xx())
    }

    /// See [`Response::assert_3xx`].
    pub fn assert_3xx(self) -> Self {
        self.record(self.response.assert_3xx())
    }

    /// See [`Response::assert_4xx`].
    pub fn assert_4xx(self) -> Self {
        self.record(self.response.assert_4xx())
    }

    /// See [`Response::assert_5xx`].
    pub fn assert_5xx(self) -> Self {
        self.record(self.response.assert_5xx())
    }

    /// See [`Response::assert_contains`].
    pub fn assert_contains(self, text: &str) -> Self {
        self.record(self.response.assert_contains(text))
    }

    /// See [`Response::assert_not_contains`].
    pub fn assert_not_contains(self, text: &str) -> Self {
        self.record(self.response.assert_not_contains(text))
    }

    /// See [`Response::assert_has_length`].
    pub fn assert_has_length(self, expected: usize) -> Self {
        self.record(self.response.assert_has_length(expected))
    }

    /// See [`Response::assert_list_contains_values`].
    pub fn assert_list_contains_values<I>(self, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        self.record(self.response.assert_list_contains_values(values))
    }

    /// See [`Response::assert_json_path`].
    pub fn assert_json_path(self, path: &str, expected: impl Into<Value>) -> Self {
        self.record(self.response.assert_json_path(path, expected))
    }

    /// See [`Response::assert_has_key`].
    pub fn assert_has_key(self, path: &str) -> Self {
        self.record(self.response.assert_has_key(path))
    }

    /// See [`Response::assert_not_empty`].
    pub fn assert_not_empty(self, path: &str) -> Self {
        self.record(self.response.assert_not_empty(path))
    }

    /// See [`Response::assert_value_in`].
    pub fn assert_value_in<I>(self, path: &str, allowed: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        self.record(self.response.assert_value_in(path, allowed))
    }

    /// See [`Response::assert_list_not_empty`].
    pub fn assert_list_not_empty(self) -> Self {
        self.record(self.response.assert_list_not_empty())
    }

    /// See [`Response::assert_response_time`].
    pub fn assert_response_time(self, limit: Duration) -> Self {
        self.record(self.response.assert_response_time(limit))
    }

    /// See [`Response::assert_header`].
    pub fn assert_header(self, name: &str, expected: &str) -> Self {
        self.record(self.response.assert_header(name, expected))
    }

    /// See [`Response::assert_header_exists`].
    pub fn assert_header_exists(self, name: &str) -> Self {
        self.record(self.response.assert_header_exists(name))
    }

    /// See [`Response::assert_content_type`].
    pub fn assert_content_type(self, expected: &str) -> Self {
        self.record(self.response.assert_content_type(expected))
    }

    /// See [`Response::assert_json_schema`].
    pub fn assert_json_schema(self, schema: &Value) -> Self {
        self.record(self.response.assert_json_schema(schema))
    }

    /// See [`Response::assert_json_schema_file`].
    pub fn assert_json_schema_file(self, path: impl AsRef<Path>) -> Self {
        self.record(self.response.assert_json_schema_file(path))
    }

    /// See [`Response::assert_json_schema_from_sample`].
    pub fn assert_json_schema_from_sample(self, sample: &Value) -> Self {
        self.record(self.response.assert_json_schema_from_sample(sample))
    }

    /// See [`Response::assert_json_schema_from_sample_file`].
    pub fn assert_json_schema_from_sample_file(self, path: impl AsRef<Path>) -> Self {
        self.record(self.response.assert_json_schema_from_sample_file(path))
    }
}

impl fmt::Debug for Soft<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Soft")
            .field("failures", &self.response.soft_failures().len())
            .finish()
    }
}
