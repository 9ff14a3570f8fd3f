//! Materialized state of one store.

use crate::engine::index::{IndexKey, IndexState};
use crate::error::{StoreError, StoreResult};
use crate::schema::{IndexDefinition, StoreDefinition};
use powa_codec::Value;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Records of one store, ordered by primary key, plus its indexes.
#[derive(Debug, Clone)]
pub struct StoreState {
    definition: StoreDefinition,
    records: BTreeMap<String, Value>,
    indexes: BTreeMap<String, IndexState>,
}

impl StoreState {
    /// Creates an empty store with every declared index.
    pub fn new(definition: StoreDefinition) -> Self {
        let indexes = definition
            .indexes
            .iter()
            .map(|index| (index.name.clone(), IndexState::new(index.clone())))
            .collect();
        Self {
            definition,
            records: BTreeMap::new(),
            indexes,
        }
    }

    /// The store's name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// The store's definition, including indexes added by upgrades.
    pub fn definition(&self) -> &StoreDefinition {
        &self.definition
    }

    /// Looks up a record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.records.get(key)
    }

    /// Whether a record exists.
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First record whose key sorts strictly after `after` (or the very first).
    pub fn next_after(&self, after: Option<&str>) -> Option<(&str, &Value)> {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.records
            .range::<str, _>((lower, Bound::Unbounded))
            .next()
            .map(|(key, value)| (key.as_str(), value))
    }

    /// Iterates all records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.records.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Looks up an index by name.
    pub fn index(&self, name: &str) -> Option<&IndexState> {
        self.indexes.get(name)
    }

    /// Iterates the indexes in name order.
    pub fn indexes(&self) -> impl Iterator<Item = &IndexState> {
        self.indexes.values()
    }

    pub(crate) fn put(&mut self, key: &str, value: Value) {
        if let Some(old) = self.records.get(key) {
            for index in self.indexes.values_mut() {
                index.remove(key, old);
            }
        }
        for index in self.indexes.values_mut() {
            index.insert(key, &value);
        }
        self.records.insert(key.to_string(), value);
    }

    pub(crate) fn delete(&mut self, key: &str) {
        if let Some(old) = self.records.remove(key) {
            for index in self.indexes.values_mut() {
                index.remove(key, &old);
            }
        }
    }

    /// Builds a new index over the existing records without installing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConstraintViolation`] if the index is unique and
    /// two records share an index key.
    pub(crate) fn build_index(&self, definition: &IndexDefinition) -> StoreResult<IndexState> {
        let mut state = IndexState::new(definition.clone());
        let mut seen: BTreeMap<IndexKey, &str> = BTreeMap::new();

        for (key, value) in &self.records {
            if definition.unique {
                if let Some(index_key) = state.key_for(value) {
                    if seen.insert(index_key, key).is_some() {
                        return Err(StoreError::ConstraintViolation {
                            store: self.definition.name.clone(),
                            index: definition.name.clone(),
                            key: key.clone(),
                        });
                    }
                }
            }
            state.insert(key, value);
        }
        Ok(state)
    }

    pub(crate) fn install_index(&mut self, state: IndexState) {
        self.definition.indexes.push(state.definition().clone());
        self.indexes.insert(state.definition().name.clone(), state);
    }
}
