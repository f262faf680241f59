//! Dot-path resolution.
//!
//! A path such as `"data.users.0.email"` is split on `.` and walked segment
//! by segment: objects are indexed by key, arrays by an unsigned integer
//! segment. Empty segments are skipped, so `""` is the root. Anything that
//! does not resolve (missing key, index out of range, a scalar in the way)
//! is absence, never an error.

use serde_json::Value;

/// Resolves `path` against `root`.
///
/// # Example
///
/// ```
/// use berapi_assert::resolve;
/// use serde_json::json;
///
/// let body = json!({"data": {"users": [{"email": "a@example.com"}]}});
///
/// assert_eq!(resolve(&body, "data.users.0.email"), Some(&json!("a@example.com")));
/// assert_eq!(resolve(&body, "data.users.1.email"), None);
/// assert_eq!(resolve(&body, ""), Some(&body));
/// ```
#[must_use]
pub fn resolve<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |current, segment| step(current, segment))
}

fn step<'a>(current: &'a Value, segment: &str) -> Option<&'a Value> {
    match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}
