//! Accumulated schema registrations.

use crate::schema::definition::{SchemaDefinition, StoreDefinition};

/// Accumulates versioned schema registrations for one database.
///
/// Built at the composition root and handed to the
/// [`StorageService`](crate::StorageService). Registration is additive: the
/// first definition of a store name wins and later ones are ignored, while
/// the target version only ever rises.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    target_version: u32,
    stores: Vec<StoreDefinition>,
}

impl SchemaRegistry {
    /// Creates an empty registry with target version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges a definition into the registry.
    pub fn register(&mut self, definition: SchemaDefinition) {
        self.target_version = self.target_version.max(definition.version());
        for store in definition.into_stores() {
            if self.store(&store.name).is_none() {
                self.stores.push(store);
            }
        }
    }

    /// Registers a definition and returns the registry, for chaining.
    #[must_use]
    pub fn with(mut self, definition: SchemaDefinition) -> Self {
        self.register(definition);
        self
    }

    /// The version the database will be opened at.
    #[must_use]
    pub fn target_version(&self) -> u32 {
        self.target_version
    }

    /// Iterates the accumulated stores in registration order.
    pub fn stores(&self) -> impl Iterator<Item = &StoreDefinition> {
        self.stores.iter()
    }

    /// Looks up an accumulated store by name.
    pub fn store(&self, name: &str) -> Option<&StoreDefinition> {
        self.stores.iter().find(|store| store.name == name)
    }
}
