use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{RelayError, RelayResult};

/// Keyword arguments supplied to one invocation.
///
/// Builders read only the keys they name; anything else in the map is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accepts a JSON object; `null` is treated as no arguments.
    pub fn from_value(value: Value) -> RelayResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::new()),
            other => Err(RelayError::InvalidArgs(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// The value under `key` unless it is absent, `null` or a blank string.
    pub fn present(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| is_present(v))
    }

    pub fn is_present(&self, key: &str) -> bool {
        self.present(key).is_some()
    }

    pub fn str(&self, key: &str) -> Option<&str> {
        self.present(key).and_then(Value::as_str)
    }

    /// Scalar rendered as text; numbers and booleans are accepted for ids.
    pub fn text(&self, key: &str) -> Option<String> {
        scalar_text(self.present(key)?)
    }

    /// Query-string form: a scalar as [`Args::text`] renders it, or a list of
    /// scalars joined with commas (`labels=bug,ui`). Objects and nested lists
    /// have no query form.
    pub fn param(&self, key: &str) -> Option<String> {
        match self.present(key)? {
            Value::Array(items) => {
                let parts = items
                    .iter()
                    .map(scalar_text)
                    .collect::<Option<Vec<_>>>()?;
                (!parts.is_empty()).then(|| parts.join(","))
            }
            _ => self.text(key),
        }
    }

    /// Lenient boolean: JSON `true`, non-zero numbers, or `"true"`, `"1"`, `"yes"`.
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes"
            ),
            _ => false,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Args {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Present means non-null and, for strings, not blank.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A value [`Args::param`] can put in a query string.
pub fn is_query_value(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty() && items.iter().all(|v| scalar_text(v).is_some()),
        other => scalar_text(other).is_some(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn blank_and_null_values_are_not_present() {
        let args = Args::new()
            .with("a", "")
            .with("b", "   ")
            .with("c", Value::Null)
            .with("d", "x");
        assert!(!args.is_present("a"));
        assert!(!args.is_present("b"));
        assert!(!args.is_present("c"));
        assert!(args.is_present("d"));
        assert!(!args.is_present("missing"));
    }

    #[test]
    fn zero_and_false_count_as_present() {
        let args = Args::new().with("n", 0).with("b", false).with("l", json!([]));
        assert!(args.is_present("n"));
        assert!(args.is_present("b"));
        assert!(args.is_present("l"));
    }

    #[test]
    fn text_renders_numeric_ids() {
        let args = Args::new().with("ticket_id", 42).with("name", "x");
        assert_eq!(args.text("ticket_id").as_deref(), Some("42"));
        assert_eq!(args.text("name").as_deref(), Some("x"));
        assert_eq!(args.str("ticket_id"), None);
    }

    #[test]
    fn param_joins_scalar_lists() {
        let args = Args::new()
            .with("labels", json!(["bug", "ui"]))
            .with("ids", json!([3, 4]))
            .with("state", "opened")
            .with("empty", json!([]))
            .with("nested", json!([["a"]]))
            .with("filter", json!({"a": 1}));
        assert_eq!(args.param("labels").as_deref(), Some("bug,ui"));
        assert_eq!(args.param("ids").as_deref(), Some("3,4"));
        assert_eq!(args.param("state").as_deref(), Some("opened"));
        assert_eq!(args.param("empty"), None);
        assert_eq!(args.param("nested"), None);
        assert_eq!(args.param("filter"), None);
    }

    #[rstest]
    #[case::string(json!("x"), true)]
    #[case::number(json!(7), true)]
    #[case::scalar_list(json!(["a", 1, true]), true)]
    #[case::empty_list(json!([]), false)]
    #[case::nested_list(json!([["a"]]), false)]
    #[case::object(json!({"a": 1}), false)]
    fn query_values(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(is_query_value(&value), expected);
    }

    #[rstest]
    #[case::bool_true(json!(true), true)]
    #[case::bool_false(json!(false), false)]
    #[case::string_true(json!("TRUE"), true)]
    #[case::string_yes(json!("yes"), true)]
    #[case::string_one(json!("1"), true)]
    #[case::string_no(json!("no"), false)]
    #[case::number(json!(1), true)]
    #[case::zero(json!(0), false)]
    #[case::null(Value::Null, false)]
    fn flag_is_lenient(#[case] value: Value, #[case] expected: bool) {
        let args = Args::new().with("dry_run", value);
        assert_eq!(args.flag("dry_run"), expected);
    }

    #[test]
    fn from_value_rejects_non_objects() {
        assert!(Args::from_value(json!([1, 2])).is_err());
        assert_eq!(Args::from_value(Value::Null).unwrap(), Args::new());
        let args = Args::from_value(json!({"k": "v"})).unwrap();
        assert_eq!(args.str("k"), Some("v"));
    }
}
