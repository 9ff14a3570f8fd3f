//! Secondary indexes.

use crate::schema::IndexDefinition;
use powa_codec::Value;
use std::collections::{BTreeMap, BTreeSet};

/// A value that can be stored in an index.
///
/// Variant order is the sort order: integers, then text, then byte
/// strings, then arrays (compared element by element).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    /// Integer key.
    Integer(i64),
    /// Text key.
    Text(String),
    /// Byte string key.
    Bytes(Vec<u8>),
    /// Compound key.
    Array(Vec<IndexKey>),
}

impl IndexKey {
    /// Converts a document value to an index key.
    ///
    /// Null, booleans, maps and arrays holding any of those are not valid
    /// keys and yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(n) => Some(Self::Integer(*n)),
            Value::Text(s) => Some(Self::Text(s.clone())),
            Value::Bytes(b) => Some(Self::Bytes(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Self::from_value)
                .collect::<Option<Vec<_>>>()
                .map(Self::Array),
            Value::Null | Value::Bool(_) | Value::Map(_) => None,
        }
    }

    /// Extracts the key a document has under `key_path`, if any.
    pub fn extract(document: &Value, key_path: &str) -> Option<Self> {
        document.get_path(key_path).and_then(Self::from_value)
    }
}

/// Materialized state of one index: index key to the primary keys holding it.
#[derive(Debug, Clone)]
pub struct IndexState {
    definition: IndexDefinition,
    entries: BTreeMap<IndexKey, BTreeSet<String>>,
}

impl IndexState {
    /// Creates an empty index.
    pub fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            entries: BTreeMap::new(),
        }
    }

    /// The index's declaration.
    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    /// Computes the key this index would file `document` under.
    pub fn key_for(&self, document: &Value) -> Option<IndexKey> {
        IndexKey::extract(document, &self.definition.key_path)
    }

    /// Primary keys currently filed under `key`, ascending.
    pub fn lookup(&self, key: &IndexKey) -> impl Iterator<Item = &str> {
        self.entries
            .get(key)
            .into_iter()
            .flat_map(|keys| keys.iter().map(String::as_str))
    }

    /// Files a record under its index key. Unindexable records are skipped.
    pub(crate) fn insert(&mut self, primary_key: &str, document: &Value) {
        if let Some(key) = self.key_for(document) {
            self.entries
                .entry(key)
                .or_default()
                .insert(primary_key.to_string());
        }
    }

    /// Removes a record previously filed with `document`.
    pub(crate) fn remove(&mut self, primary_key: &str, document: &Value) {
        let Some(key) = self.key_for(document) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(&key) {
            keys.remove(primary_key);
            if keys.is_empty() {
                self.entries.remove(&key);
            }
        }
    }

    /// Number of distinct index keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tag(image: &str) -> Value {
        Value::document([("imageKey", Value::from(image)), ("value", Value::from("cat"))])
    }

    #[test]
    fn key_type_order() {
        let mut keys = vec![
            IndexKey::Array(vec![IndexKey::Integer(0)]),
            IndexKey::Bytes(vec![0]),
            IndexKey::Text("a".into()),
            IndexKey::Integer(i64::MAX),
        ];
        keys.sort();
        assert!(matches!(keys[0], IndexKey::Integer(_)));
        assert!(matches!(keys[1], IndexKey::Text(_)));
        assert!(matches!(keys[2], IndexKey::Bytes(_)));
        assert!(matches!(keys[3], IndexKey::Array(_)));
    }

    #[test]
    fn invalid_values_are_not_keys() {
        assert_eq!(IndexKey::from_value(&Value::Null), None);
        assert_eq!(IndexKey::from_value(&Value::Bool(true)), None);
        assert_eq!(IndexKey::from_value(&Value::document([("a", Value::Null)])), None);
        assert_eq!(
            IndexKey::from_value(&Value::Array(vec![Value::from(1), Value::Null])),
            None
        );
        assert_eq!(
            IndexKey::from_value(&Value::Array(vec![Value::from(1), Value::from("x")])),
            Some(IndexKey::Array(vec![IndexKey::Integer(1), IndexKey::Text("x".into())]))
        );
    }

    #[test]
    fn insert_lookup_remove() {
        let mut index = IndexState::new(IndexDefinition::new("imageKey", "imageKey"));
        index.insert("t2", &tag("i1"));
        index.insert("t1", &tag("i1"));
        index.insert("t3", &tag("i2"));
        index.insert("t4", &Value::document([("value", Value::from("dog"))]));

        let key = IndexKey::Text("i1".into());
        assert_eq!(index.lookup(&key).collect::<Vec<_>>(), ["t1", "t2"]);
        assert_eq!(index.len(), 2);

        index.remove("t1", &tag("i1"));
        index.remove("t2", &tag("i1"));
        assert_eq!(index.lookup(&key).count(), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn nested_key_path() {
        let mut index = IndexState::new(IndexDefinition::new("owner", "meta.owner"));
        let doc = Value::document([("meta", Value::document([("owner", Value::from(7))]))]);
        index.insert("a", &doc);
        assert_eq!(index.lookup(&IndexKey::Integer(7)).collect::<Vec<_>>(), ["a"]);
    }

    proptest! {
        #[test]
        fn integer_keys_order_like_integers(a in any::<i64>(), b in any::<i64>()) {
            prop_assert_eq!(IndexKey::Integer(a).cmp(&IndexKey::Integer(b)), a.cmp(&b));
        }

        #[test]
        fn text_keys_order_like_strings(a in ".{0,8}", b in ".{0,8}") {
            let ordering = a.cmp(&b);
            prop_assert_eq!(IndexKey::Text(a).cmp(&IndexKey::Text(b)), ordering);
        }
    }
}
