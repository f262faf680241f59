//! JSON Schema validation and inference.
//!
//! Validation is a capability behind [`SchemaValidator`]; the default,
//! [`JsonSchemaValidator`], is backed by the `jsonschema` crate.
//! [`infer_schema`] turns a sample document into a schema that requires the
//! sample's shape.

use serde_json::{json, Map, Value};

use crate::error::{AssertionError, AssertionResult, SchemaViolation};

/// Validates a document against a JSON Schema.
pub trait SchemaValidator: Send + Sync {
    /// Returns `Ok(())` if `document` satisfies `schema`.
    ///
    /// # Errors
    ///
    /// [`AssertionError::Schema`] listing every violation, or
    /// [`AssertionError::InvalidSchema`] if `schema` does not compile.
    fn validate(&self, document: &Value, schema: &Value) -> AssertionResult<()>;
}

/// [`SchemaValidator`] backed by the `jsonschema` crate.
///
/// The draft is detected from `$schema`, defaulting to 2020-12.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSchemaValidator;

impl SchemaValidator for JsonSchemaValidator {
    fn validate(&self, document: &Value, schema: &Value) -> AssertionResult<()> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| AssertionError::InvalidSchema {
                message: e.to_string(),
            })?;

        let violations: Vec<SchemaViolation> = validator
            .iter_errors(document)
            .map(|error| SchemaViolation {
                instance_path: error.instance_path.to_string(),
                message: error.to_string(),
            })
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(AssertionError::Schema { violations })
        }
    }
}

/// Infers a schema from a sample document.
///
/// Every object key in the sample becomes a required property typed by the
/// value observed. Array items are merged into one item schema: object
/// properties are unioned, required keys intersected, `integer` and
/// `number` widen to `number`, and other mixed types become `anyOf`.
///
/// # Example
///
/// ```
/// use berapi_assert::infer_schema;
/// use serde_json::json;
///
/// let schema = infer_schema(&json!({"id": 1, "name": "x"}));
///
/// assert_eq!(schema["type"], "object");
/// assert_eq!(schema["properties"]["id"]["type"], "integer");
/// assert_eq!(schema["required"], json!(["id", "name"]));
/// ```
#[must_use]
pub fn infer_schema(sample: &Value) -> Value {
    match sample {
        Value::Null => json!({"type": "null"}),
        Value::Bool(_) => json!({"type": "boolean"}),
        Value::Number(n) if n.is_i64() || n.is_u64() => json!({"type": "integer"}),
        Value::Number(_) => json!({"type": "number"}),
        Value::String(_) => json!({"type": "string"}),
        Value::Array(items) => {
            let merged = items.iter().map(infer_schema).reduce(merge);
            match merged {
                Some(items) => json!({"type": "array", "items": items}),
                None => json!({"type": "array"}),
            }
        }
        Value::Object(map) => {
            let properties: Map<String, Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), infer_schema(value)))
                .collect();
            let required: Vec<Value> = map.keys().cloned().map(Value::String).collect();
            json!({"type": "object", "properties": properties, "required": required})
        }
    }
}

fn type_of(schema: &Value) -> Option<&str> {
    schema.get("type").and_then(Value::as_str)
}

fn is_numeric_pair(a: Option<&str>, b: Option<&str>) -> bool {
    matches!(
        (a, b),
        (Some("integer"), Some("number")) | (Some("number"), Some("integer"))
    )
}

fn merge(left: Value, right: Value) -> Value {
    if left == right {
        return left;
    }

    match (type_of(&left), type_of(&right)) {
        (Some("object"), Some("object")) => merge_objects(&left, &right),
        (Some("array"), Some("array")) => merge_arrays(&left, &right),
        (a, b) if is_numeric_pair(a, b) => json!({"type": "number"}),
        _ => any_of(left, right),
    }
}

fn merge_objects(left: &Value, right: &Value) -> Value {
    let empty = Map::new();
    let left_props = left.get("properties").and_then(Value::as_object).unwrap_or(&empty);
    let right_props = right.get("properties").and_then(Value::as_object).unwrap_or(&empty);

    let mut properties = left_props.clone();
    for (key, schema) in right_props {
        let merged = match properties.remove(key) {
            Some(existing) => merge(existing, schema.clone()),
            None => schema.clone(),
        };
        properties.insert(key.clone(), merged);
    }

    let right_required = required_keys(right);
    let required: Vec<Value> = required_keys(left)
        .into_iter()
        .filter(|key| right_required.contains(key))
        .map(|key| Value::String(key.to_string()))
        .collect();

    json!({"type": "object", "properties": properties, "required": required})
}

fn required_keys(schema: &Value) -> Vec<&str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn merge_arrays(left: &Value, right: &Value) -> Value {
    let items = match (left.get("items"), right.get("items")) {
        (Some(l), Some(r)) => Some(merge(l.clone(), r.clone())),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    };
    match items {
        Some(items) => json!({"type": "array", "items": items}),
        None => json!({"type": "array"}),
    }
}

fn any_of(left: Value, right: Value) -> Value {
    let mut variants = variants_of(left);
    for candidate in variants_of(right) {
        let compatible = variants.iter().position(|existing| {
            let (a, b) = (type_of(existing), type_of(&candidate));
            a.is_some() && (a == b || is_numeric_pair(a, b))
        });
        match compatible {
            Some(index) => {
                let existing = variants.remove(index);
                variants.insert(index, merge(existing, candidate));
            }
            None => variants.push(candidate),
        }
    }

    if variants.len() == 1 {
        variants.remove(0)
    } else {
        json!({"anyOf": variants})
    }
}

fn variants_of(schema: Value) -> Vec<Value> {
    match schema {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("anyOf") => {
            match map.remove("anyOf") {
                Some(Value::Array(items)) => items,
                Some(other) => vec![other],
                None => Vec::new(),
            }
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(document: &Value, schema: &Value) -> AssertionResult<()> {
        JsonSchemaValidator.validate(document, schema)
    }

    #[test]
    fn test_infer_scalars() {
        assert_eq!(infer_schema(&json!(null)), json!({"type": "null"}));
        assert_eq!(infer_schema(&json!(true)), json!({"type": "boolean"}));
        assert_eq!(infer_schema(&json!(3)), json!({"type": "integer"}));
        assert_eq!(infer_schema(&json!(3.5)), json!({"type": "number"}));
        assert_eq!(infer_schema(&json!("x")), json!({"type": "string"}));
        assert_eq!(infer_schema(&json!([])), json!({"type": "array"}));
    }

    #[test]
    fn test_infer_nested_object() {
        let schema = infer_schema(&json!({"user": {"id": 1, "tags": ["a"]}}));
        assert_eq!(schema["properties"]["user"]["required"], json!(["id", "tags"]));
        assert_eq!(
            schema["properties"]["user"]["properties"]["tags"],
            json!({"type": "array", "items": {"type": "string"}})
        );
    }

    #[test]
    fn test_array_items_merge() {
        let schema = infer_schema(&json!([
            {"id": 1, "name": "a"},
            {"id": 2.5, "email": "b@example.com"}
        ]));
        let items = &schema["items"];
        assert_eq!(items["properties"]["id"], json!({"type": "number"}));
        assert_eq!(items["properties"]["name"], json!({"type": "string"}));
        assert_eq!(items["properties"]["email"], json!({"type": "string"}));
        assert_eq!(items["required"], json!(["id"]));
    }

    #[test]
    fn test_array_mixed_types_widen_to_any_of() {
        let schema = infer_schema(&json!([1, "two", 3, null]));
        assert_eq!(
            schema["items"],
            json!({"anyOf": [{"type": "integer"}, {"type": "string"}, {"type": "null"}]})
        );
    }

    #[test]
    fn test_sample_schema_validation() {
        let schema = infer_schema(&json!({"id": 1, "name": "x"}));

        assert!(validate(&json!({"id": 7, "name": "y"}), &schema).is_ok());

        let err = validate(&json!({"name": "x"}), &schema).unwrap_err();
        assert!(matches!(err, AssertionError::Schema { .. }));

        let err = validate(&json!({"id": "1", "name": "x"}), &schema).unwrap_err();
        match err {
            AssertionError::Schema { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].instance_path, "/id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_multiple_violations_reported() {
        let schema = json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["id", "name"]
        });
        let err = validate(&json!({"id": "x", "name": 2}), &schema).unwrap_err();
        match err {
            AssertionError::Schema { violations } => assert_eq!(violations.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_schema() {
        let err = validate(&json!({}), &json!({"type": 12})).unwrap_err();
        assert!(matches!(err, AssertionError::InvalidSchema { .. }));
    }
}
