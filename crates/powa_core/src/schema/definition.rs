//! Store and index definitions.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A secondary index over one field of a store's documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name, unique within its store.
    pub name: String,
    /// Dotted path of the indexed field, e.g. `imageKey` or `owner.name`.
    pub key_path: String,
    /// Whether one index key may map to at most one record.
    pub unique: bool,
}

impl IndexDefinition {
    /// Creates a non-unique index.
    pub fn new(name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_path: key_path.into(),
            unique: false,
        }
    }

    /// Marks the index unique.
    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

/// A named store and the indexes it declares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDefinition {
    /// Store name, unique within the database.
    pub name: String,
    /// Declared indexes.
    pub indexes: Vec<IndexDefinition>,
}

impl StoreDefinition {
    /// Creates a store with no indexes.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Adds an index to the store.
    #[must_use]
    pub fn with_index(mut self, index: IndexDefinition) -> Self {
        self.indexes.push(index);
        self
    }

    /// Looks up a declared index by name.
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|index| index.name == name)
    }
}

/// One versioned registration of stores.
///
/// # Example
///
/// ```rust
/// use powa_core::{IndexDefinition, SchemaDefinition, StoreDefinition};
///
/// let schema = SchemaDefinition::new(
///     1,
///     vec![StoreDefinition::new("tags").with_index(IndexDefinition::new("imageKey", "imageKey"))],
/// )
/// .unwrap();
/// assert_eq!(schema.version(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDefinition {
    version: u32,
    stores: Vec<StoreDefinition>,
}

impl SchemaDefinition {
    /// Creates a schema definition.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidSchema`] if the version is zero, a name is
    /// empty, or a store or index name repeats.
    pub fn new(version: u32, stores: Vec<StoreDefinition>) -> StoreResult<Self> {
        if version == 0 {
            return Err(StoreError::invalid_schema("schema version must be positive"));
        }

        let mut store_names = HashSet::new();
        for store in &stores {
            if store.name.is_empty() {
                return Err(StoreError::invalid_schema("store name must not be empty"));
            }
            if !store_names.insert(store.name.as_str()) {
                return Err(StoreError::invalid_schema(format!(
                    "store {} declared twice",
                    store.name
                )));
            }

            let mut index_names = HashSet::new();
            for index in &store.indexes {
                if index.name.is_empty() {
                    return Err(StoreError::invalid_schema(format!(
                        "index on store {} has an empty name",
                        store.name
                    )));
                }
                if !index_names.insert(index.name.as_str()) {
                    return Err(StoreError::invalid_schema(format!(
                        "index {} declared twice on store {}",
                        index.name, store.name
                    )));
                }
            }
        }

        Ok(Self { version, stores })
    }

    /// Returns the schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Returns the declared stores in declaration order.
    #[must_use]
    pub fn stores(&self) -> &[StoreDefinition] {
        &self.stores
    }

    pub(crate) fn into_stores(self) -> Vec<StoreDefinition> {
        self.stores
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_zero_is_rejected() {
        let err = SchemaDefinition::new(0, vec![]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSchema { .. }));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let twice = SchemaDefinition::new(
            1,
            vec![StoreDefinition::new("images"), StoreDefinition::new("images")],
        );
        assert!(matches!(twice, Err(StoreError::InvalidSchema { .. })));

        let store = StoreDefinition::new("tags")
            .with_index(IndexDefinition::new("imageKey", "imageKey"))
            .with_index(IndexDefinition::new("imageKey", "value"));
        assert!(SchemaDefinition::new(1, vec![store]).is_err());

        assert!(SchemaDefinition::new(1, vec![StoreDefinition::new("")]).is_err());
    }

    #[test]
    fn index_lookup() {
        let store = StoreDefinition::new("tags")
            .with_index(IndexDefinition::new("imageKey", "imageKey"))
            .with_index(IndexDefinition::new("valueKey", "value").unique());

        assert_eq!(store.index("valueKey").map(|i| i.unique), Some(true));
        assert_eq!(store.index("imageKey").map(|i| i.key_path.as_str()), Some("imageKey"));
        assert!(store.index("missing").is_none());
    }
}
