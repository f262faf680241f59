//! # berapi Assert
//!
//! The response record and its assertion vocabulary.
//!
//! - [`Response`] - A completed response: status, headers, body, timing,
//!   and a lazily parsed JSON view
//! - [`resolve`] - Dot-path lookup (`"data.users.0.email"`)
//! - [`infer_schema`] - Builds a JSON Schema from a sample document
//! - [`SchemaValidator`] - Validation capability, [`JsonSchemaValidator`]
//!   by default
//! - [`Soft`] - Assertions that record failures instead of failing
//!
//! ## Example
//!
//! ```
//! use berapi_assert::Response;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), berapi_assert::AssertionError> {
//! let response = Response::from_json(200, &json!([{"id": 1, "name": "a"}]));
//!
//! response
//!     .assert_status(200)?
//!     .assert_list_not_empty()?
//!     .assert_json_path("0.name", "a")?
//!     .assert_json_schema_from_sample(&json!([{"id": 0, "name": ""}]))?;
//! # Ok(())
//! # }
//! ```

#![doc(html_root_url = "https://docs.rs/berapi-assert/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod path;
mod response;
mod schema;
mod soft;

pub use error::{Actual, AssertionError, AssertionResult, SchemaViolation, StatusClass};
pub use path::resolve;
pub use response::Response;
pub use schema::{infer_schema, JsonSchemaValidator, SchemaValidator};
pub use soft::Soft;
