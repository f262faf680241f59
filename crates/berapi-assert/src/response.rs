//! The response record and its assertions.

use std::borrow::Cow;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use berapi_core::{RequestId, ResponseContext};
use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Actual, AssertionError, AssertionResult, StatusClass};
use crate::path::resolve;
use crate::schema::{infer_schema, JsonSchemaValidator, SchemaValidator};
use crate::soft::Soft;

/// A completed response with query helpers and chainable assertions.
///
/// The body is parsed as JSON on first access and cached; a body that is
/// not JSON only fails the checks that need JSON. Every `assert_*` method
/// returns `Ok(&self)` on success so checks chain with `?`.
///
/// # Example
///
/// ```
/// use berapi_assert::Response;
/// use serde_json::json;
///
/// # fn main() -> Result<(), berapi_assert::AssertionError> {
/// let response = Response::from_json(200, &json!({"user": {"id": 1, "email": "a@example.com"}}));
///
/// response
///     .assert_2xx()?
///     .assert_json_path("user.id", 1)?
///     .assert_has_key("user.email")?;
///
/// assert_eq!(response.get("user.email")?, Some(&json!("a@example.com")));
/// # Ok(())
/// # }
/// ```
pub struct Response {
    context: ResponseContext,
    parsed: OnceLock<Result<Value, String>>,
    soft_failures: Mutex<Vec<AssertionError>>,
    validator: Arc<dyn SchemaValidator>,
}

impl Response {
    /// Wraps a response context.
    #[must_use]
    pub fn new(context: ResponseContext) -> Self {
        Self {
            context,
            parsed: OnceLock::new(),
            soft_failures: Mutex::new(Vec::new()),
            validator: Arc::new(JsonSchemaValidator),
        }
    }

    /// Builds a response from raw parts, for tests and fixtures.
    ///
    /// The synthetic request is `GET http://localhost/`.
    #[must_use]
    pub fn from_parts(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self::new(ResponseContext::synthetic(status, headers, body.into()))
    }

    /// Builds a JSON response from a value, for tests and fixtures.
    ///
    /// A `status` outside 100..=999 becomes 500.
    #[must_use]
    pub fn from_json(status: u16, body: &Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::from_parts(status, headers, body.to_string())
    }

    /// Replaces the schema validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Returns the underlying context.
    pub const fn context(&self) -> &ResponseContext {
        &self.context
    }

    /// Unwraps the underlying context.
    pub fn into_context(self) -> ResponseContext {
        self.context
    }

    // Data access

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.context.status()
    }

    /// Returns the status code as a u16.
    pub fn status_code(&self) -> u16 {
        self.context.status().as_u16()
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &HeaderMap {
        self.context.headers()
    }

    /// Returns a header value as a string (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.context.header(name)
    }

    /// Returns the Content-Type header.
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body bytes.
    pub fn body(&self) -> &Bytes {
        self.context.body()
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.context.body())
    }

    /// Returns the time the transport waited for this response.
    pub fn elapsed(&self) -> Duration {
        self.context.elapsed()
    }

    /// Returns the url of the request.
    pub fn url(&self) -> &str {
        self.context.url()
    }

    /// Returns the method of the request.
    pub fn method(&self) -> &Method {
        self.context.method()
    }

    /// Returns the request ID of the call.
    pub fn request_id(&self) -> RequestId {
        self.context.request_id()
    }

    /// Returns the attempt that produced this response (0 = original).
    pub fn attempt(&self) -> u32 {
        self.context.attempt()
    }

    /// Returns the parsed body, parsing it on first access.
    ///
    /// # Errors
    ///
    /// [`AssertionError::JsonDecode`] if the body is not JSON. The failure
    /// is cached as well.
    pub fn json(&self) -> AssertionResult<&Value> {
        self.parsed
            .get_or_init(|| serde_json::from_slice(self.context.body()).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|message| AssertionError::JsonDecode {
                message: message.clone(),
            })
    }

    /// Returns an owned copy of the parsed body.
    pub fn to_value(&self) -> AssertionResult<Value> {
        self.json().cloned()
    }

    /// Deserializes the body into `T`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> AssertionResult<T> {
        serde_json::from_value(self.json()?.clone()).map_err(|e| AssertionError::JsonDecode {
            message: e.to_string(),
        })
    }

    /// Resolves a dot-path against the body. `Ok(None)` means absent.
    ///
    /// # Errors
    ///
    /// Only if the body is not JSON.
    pub fn get(&self, path: &str) -> AssertionResult<Option<&Value>> {
        Ok(resolve(self.json()?, path))
    }

    /// Resolves a dot-path and deserializes the value into `T`.
    ///
    /// # Errors
    ///
    /// [`AssertionError::JsonPath`] if the path is absent or the value is
    /// not a `T`.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> AssertionResult<T> {
        let value = self.get(path)?;
        let expected = || format!("a value of type {}", std::any::type_name::<T>());
        let value = value.ok_or_else(|| AssertionError::json_path(path, expected(), Actual::Absent))?;
        serde_json::from_value(value.clone())
            .map_err(|_| AssertionError::json_path(path, expected(), Actual::Value(value.clone())))
    }

    // Status

    /// Asserts the exact status code.
    pub fn assert_status(&self, expected: u16) -> AssertionResult<&Self> {
        let actual = self.status_code();
        if actual == expected {
            Ok(self)
        } else {
            Err(AssertionError::Status { expected, actual })
        }
    }

    /// Asserts the status class.
    pub fn assert_status_class(&self, class: StatusClass) -> AssertionResult<&Self> {
        let actual = self.status_code();
        if class.contains(actual) {
            Ok(self)
        } else {
            Err(AssertionError::StatusClass {
                expected: class,
                actual,
            })
        }
    }

    /// Asserts a 2xx status.
    pub fn assert_2xx(&self) -> AssertionResult<&Self> {
        self.assert_status_class(StatusClass::Success)
    }

    /// Asserts a 3xx status.
    pub fn assert_3xx(&self) -> AssertionResult<&Self> {
        self.assert_status_class(StatusClass::Redirection)
    }

    /// Asserts a 4xx status.
    pub fn assert_4xx(&self) -> AssertionResult<&Self> {
        self.assert_status_class(StatusClass::ClientError)
    }

    /// Asserts a 5xx status.
    pub fn assert_5xx(&self) -> AssertionResult<&Self> {
        self.assert_status_class(StatusClass::ServerError)
    }

    // Raw body

    /// Asserts that the body contains `text` (case-sensitive).
    pub fn assert_contains(&self, text: &str) -> AssertionResult<&Self> {
        if self.text().contains(text) {
            Ok(self)
        } else {
            Err(AssertionError::BodyContains {
                expected: text.to_string(),
            })
        }
    }

    /// Asserts that the body does not contain `text`.
    pub fn assert_not_contains(&self, text: &str) -> AssertionResult<&Self> {
        if self.text().contains(text) {
            Err(AssertionError::BodyNotContains {
                unexpected: text.to_string(),
            })
        } else {
            Ok(self)
        }
    }

    /// Asserts the body length in characters.
    pub fn assert_has_length(&self, expected: usize) -> AssertionResult<&Self> {
        let actual = self.text().chars().count();
        if actual == expected {
            Ok(self)
        } else {
            Err(AssertionError::BodyLength { expected, actual })
        }
    }

    /// Asserts that the body contains every value.
    ///
    /// Every value is checked; the error lists all of the missing ones.
    pub fn assert_list_contains_values<I>(&self, values: I) -> AssertionResult<&Self>
    where
        I: IntoIterator,
        I::Item: fmt::Display,
    {
        let text = self.text();
        let missing: Vec<String> = values
            .into_iter()
            .map(|value| value.to_string())
            .filter(|value| !text.contains(value.as_str()))
            .collect();

        if missing.is_empty() {
            Ok(self)
        } else {
            Err(AssertionError::MissingValues { missing })
        }
    }

    // JSON paths

    /// Asserts that `path` resolves to `expected`.
    pub fn assert_json_path(&self, path: &str, expected: impl Into<Value>) -> AssertionResult<&Self> {
        let expected = expected.into();
        let actual = self.get(path)?;
        if actual == Some(&expected) {
            Ok(self)
        } else {
            Err(AssertionError::json_path(
                path,
                expected.to_string(),
                Actual::from_option(actual),
            ))
        }
    }

    /// Asserts that `path` resolves. A JSON `null` counts as present.
    pub fn assert_has_key(&self, path: &str) -> AssertionResult<&Self> {
        match self.get(path)? {
            Some(_) => Ok(self),
            None => Err(AssertionError::json_path(path, "present", Actual::Absent)),
        }
    }

    /// Asserts that `path` resolves to a non-empty value.
    ///
    /// Absent, `null`, `""`, `[]` and `{}` all fail.
    pub fn assert_not_empty(&self, path: &str) -> AssertionResult<&Self> {
        let actual = self.get(path)?;
        let empty = match actual {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Array(items)) => items.is_empty(),
            Some(Value::Object(map)) => map.is_empty(),
            Some(_) => false,
        };
        if empty {
            Err(AssertionError::json_path(
                path,
                "a non-empty value",
                Actual::from_option(actual),
            ))
        } else {
            Ok(self)
        }
    }

    /// Asserts that `path` resolves to one of `allowed`.
    pub fn assert_value_in<I>(&self, path: &str, allowed: I) -> AssertionResult<&Self>
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        let allowed: Vec<Value> = allowed.into_iter().map(Into::into).collect();
        let actual = self.get(path)?;
        if actual.is_some_and(|value| allowed.contains(value)) {
            Ok(self)
        } else {
            Err(AssertionError::json_path(
                path,
                format!("one of {}", Value::Array(allowed)),
                Actual::from_option(actual),
            ))
        }
    }

    /// Asserts that the body is a non-empty JSON array.
    pub fn assert_list_not_empty(&self) -> AssertionResult<&Self> {
        let root = self.json()?;
        match root {
            Value::Array(items) if !items.is_empty() => Ok(self),
            other => Err(AssertionError::json_path(
                "",
                "a non-empty array",
                Actual::Value(other.clone()),
            )),
        }
    }

    // Timing and headers

    /// Asserts that the response arrived within `limit`.
    pub fn assert_response_time(&self, limit: Duration) -> AssertionResult<&Self> {
        let actual = self.elapsed();
        if actual <= limit {
            Ok(self)
        } else {
            Err(AssertionError::ResponseTime { limit, actual })
        }
    }

    /// Asserts a header value (case-insensitive name, exact value).
    pub fn assert_header(&self, name: &str, expected: &str) -> AssertionResult<&Self> {
        match self.header_text(name) {
            Some(actual) if actual == expected => Ok(self),
            Some(actual) => Err(AssertionError::Header {
                name: name.to_string(),
                expected: expected.to_string(),
                actual: actual.into_owned(),
            }),
            None => Err(AssertionError::HeaderMissing {
                name: name.to_string(),
            }),
        }
    }

    /// Asserts that a header is present.
    pub fn assert_header_exists(&self, name: &str) -> AssertionResult<&Self> {
        if self.headers().contains_key(name) {
            Ok(self)
        } else {
            Err(AssertionError::HeaderMissing {
                name: name.to_string(),
            })
        }
    }

    /// Asserts that the Content-Type header contains `expected`.
    pub fn assert_content_type(&self, expected: &str) -> AssertionResult<&Self> {
        let actual = self.header_text(header::CONTENT_TYPE.as_str());
        match actual {
            Some(value) if value.contains(expected) => Ok(self),
            other => Err(AssertionError::ContentType {
                expected: expected.to_string(),
                actual: other.map(Cow::into_owned),
            }),
        }
    }

    // Schemas

    /// Validates the body against `schema`.
    pub fn assert_json_schema(&self, schema: &Value) -> AssertionResult<&Self> {
        self.validator.validate(self.json()?, schema)?;
        Ok(self)
    }

    /// Validates the body against the schema stored in `path`.
    pub fn assert_json_schema_file(&self, path: impl AsRef<Path>) -> AssertionResult<&Self> {
        let schema = load_fixture(path.as_ref())?;
        self.assert_json_schema(&schema)
    }

    /// Validates the body against a schema inferred from `sample`.
    pub fn assert_json_schema_from_sample(&self, sample: &Value) -> AssertionResult<&Self> {
        self.assert_json_schema(&infer_schema(sample))
    }

    /// Validates the body against a schema inferred from the sample stored
    /// in `path`.
    pub fn assert_json_schema_from_sample_file(
        &self,
        path: impl AsRef<Path>,
    ) -> AssertionResult<&Self> {
        let sample = load_fixture(path.as_ref())?;
        self.assert_json_schema_from_sample(&sample)
    }

    // Soft checks

    /// Returns a mirror of the assertions that records failures instead of
    /// returning them.
    ///
    /// # Example
    ///
    /// ```
    /// use berapi_assert::Response;
    /// use serde_json::json;
    ///
    /// let response = Response::from_json(404, &json!({"error": "missing"}));
    /// response.soft().assert_2xx().assert_contains("missing");
    ///
    /// assert_eq!(response.soft_failures().len(), 1);
    /// assert!(response.assert_no_soft_failures().is_err());
    /// ```
    pub fn soft(&self) -> Soft<'_> {
        Soft::new(self)
    }

    /// Soft variant of [`assert_contains`](Self::assert_contains).
    pub fn check_contains(&self, text: &str) -> &Self {
        self.soft().assert_contains(text);
        self
    }

    /// Returns the failures recorded by soft checks, oldest first.
    pub fn soft_failures(&self) -> Vec<AssertionError> {
        self.soft_failures.lock().clone()
    }

    /// Fails with every recorded soft failure, if there are any.
    pub fn assert_no_soft_failures(&self) -> AssertionResult<&Self> {
        let failures = self.soft_failures();
        if failures.is_empty() {
            Ok(self)
        } else {
            Err(AssertionError::SoftFailures { failures })
        }
    }

    pub(crate) fn record_soft_failure(&self, error: AssertionError) {
        tracing::warn!(
            request_id = %self.request_id(),
            http.url = %self.url(),
            error = %error,
            "soft assertion failed"
        );
        self.soft_failures.lock().push(error);
    }

    fn header_text(&self, name: &str) -> Option<Cow<'_, str>> {
        self.headers()
            .get(name)
            .map(|value| String::from_utf8_lossy(value.as_bytes()))
    }
}

impl From<ResponseContext> for Response {
    fn from(context: ResponseContext) -> Self {
        Self::new(context)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("request_id", &self.request_id())
            .field("attempt", &self.attempt())
            .field("url", &self.url())
            .field("status", &self.status())
            .field("headers", self.headers())
            .field("body_len", &self.body().len())
            .field("elapsed", &self.elapsed())
            .finish_non_exhaustive()
    }
}

fn load_fixture(path: &Path) -> AssertionResult<Value> {
    let content =
        fs::read_to_string(path).map_err(|e| AssertionError::fixture(path, e.to_string()))?;
    serde_json::from_str(&content)
        .map_err(|e| AssertionError::fixture(path, format!("invalid JSON: {e}")))
}
