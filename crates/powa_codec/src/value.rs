//! Dynamic document value type.

use std::collections::BTreeMap;

/// A structured document, or one field inside it.
///
/// Maps are keyed by text and kept in a `BTreeMap`, so two documents with
/// the same fields compare equal regardless of insertion order and always
/// encode to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Null value.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Text string.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
    /// Array of values.
    Array(Vec<Value>),
    /// Text-keyed map of values.
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// Builds a map document from `(field, value)` pairs.
    ///
    /// A repeated field keeps its last value.
    pub fn document<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }

    /// Looks up a top-level field of a map document.
    pub fn get(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Map(fields) => fields.get(field),
            _ => None,
        }
    }

    /// Resolves a dotted key path such as `"owner.name"`.
    ///
    /// The empty path resolves to the document itself. Any segment that is
    /// missing, or that lands on a non-map value before the path ends,
    /// yields `None`.
    pub fn get_path(&self, key_path: &str) -> Option<&Value> {
        if key_path.is_empty() {
            return Some(self);
        }
        key_path
            .split('.')
            .try_fold(self, |current, segment| current.get(segment))
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string, if it is a text string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Value::Map(fields)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag() -> Value {
        Value::document([
            ("imageKey", Value::from("i1")),
            ("value", Value::from("cat")),
            (
                "meta",
                Value::document([("source", Value::from("camera")), ("rank", Value::from(3))]),
            ),
        ])
    }

    #[test]
    fn field_order_does_not_matter() {
        let a = Value::document([("a", Value::from(1)), ("b", Value::from(2))]);
        let b = Value::document([("b", Value::from(2)), ("a", Value::from(1))]);
        assert_eq!(a, b);
    }

    #[test]
    fn repeated_field_keeps_last() {
        let doc = Value::document([("a", Value::from(1)), ("a", Value::from(2))]);
        assert_eq!(doc.get("a"), Some(&Value::Integer(2)));
    }

    #[test]
    fn top_level_lookup() {
        let doc = tag();
        assert_eq!(doc.get("imageKey").and_then(Value::as_text), Some("i1"));
        assert_eq!(doc.get("missing"), None);
        assert_eq!(Value::from("scalar").get("imageKey"), None);
    }

    #[test]
    fn dotted_key_path() {
        let doc = tag();
        assert_eq!(
            doc.get_path("meta.source").and_then(Value::as_text),
            Some("camera")
        );
        assert_eq!(doc.get_path("meta.rank").and_then(Value::as_integer), Some(3));
        assert_eq!(doc.get_path("meta.rank.deeper"), None);
        assert_eq!(doc.get_path("value.length"), None);
    }

    #[test]
    fn empty_key_path_is_the_document() {
        let doc = Value::from("whole");
        assert_eq!(doc.get_path(""), Some(&doc));
    }

    #[test]
    fn accessors() {
        assert!(Value::Null.is_null());
        assert!(Value::from(()).is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::from(7u32).as_integer(), Some(7));
        assert_eq!(Value::from(vec![1u8, 2]).as_bytes(), Some(&[1u8, 2][..]));
        assert_eq!(
            Value::from(vec![Value::Null]).as_array().map(<[Value]>::len),
            Some(1)
        );
        assert_eq!(tag().as_map().map(BTreeMap::len), Some(3));
        assert_eq!(Value::Integer(1).as_text(), None);
    }
}
