//! In-memory materialization of the record log.
//!
//! The [`Engine`] is what replaying the log produces: the schema version,
//! every store with its records, and every index. Writes reach it only
//! through [`LogRecord`]s, first appended to the log and then applied here.

mod index;
mod store;

pub use index::{IndexKey, IndexState};
pub use store::StoreState;

use crate::error::{StoreError, StoreResult};
use crate::log::{CommitRecord, CreatedIndex, LogOp, LogRecord, UpgradeRecord};
use crate::schema::SchemaRegistry;
use crate::types::TransactionId;
use powa_codec::Value;
use std::collections::BTreeMap;

/// What one upgrade created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    /// Version before the upgrade (0 for a new database).
    pub from_version: u32,
    /// Version after the upgrade.
    pub to_version: u32,
    /// Names of the stores created.
    pub created_stores: Vec<String>,
    /// `(store, index)` pairs added to stores that already existed.
    pub created_indexes: Vec<(String, String)>,
}

/// Materialized database state.
#[derive(Debug, Default)]
pub struct Engine {
    version: u32,
    last_txid: TransactionId,
    stores: BTreeMap<String, StoreState>,
}

impl Engine {
    /// Creates an empty engine at version 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The persisted schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// The last committed transaction.
    #[must_use]
    pub fn last_txid(&self) -> TransactionId {
        self.last_txid
    }

    /// Looks up a store.
    pub fn store(&self, name: &str) -> Option<&StoreState> {
        self.stores.get(name)
    }

    /// Iterates stores in name order.
    pub fn stores(&self) -> impl Iterator<Item = &StoreState> {
        self.stores.values()
    }

    /// Names of all stores, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    /// Works out the upgrade that brings this state up to `registry`.
    ///
    /// Every registered store that does not exist yet is created with all of
    /// its indexes; every registered index missing from an existing store is
    /// added. Existing structure is never touched.
    pub fn plan_upgrade(&self, registry: &SchemaRegistry) -> UpgradeRecord {
        let mut stores = Vec::new();
        let mut indexes = Vec::new();

        for declared in registry.stores() {
            match self.stores.get(&declared.name) {
                None => stores.push(declared.clone()),
                Some(existing) => {
                    for index in &declared.indexes {
                        if existing.index(&index.name).is_none() {
                            indexes.push(CreatedIndex {
                                store: declared.name.clone(),
                                index: index.clone(),
                            });
                        }
                    }
                }
            }
        }

        UpgradeRecord {
            from_version: self.version,
            to_version: registry.target_version(),
            stores,
            indexes,
        }
    }

    /// Applies any log record.
    pub fn apply(&mut self, record: &LogRecord) -> StoreResult<()> {
        match record {
            LogRecord::Upgrade(upgrade) => self.apply_upgrade(upgrade).map(|_| ()),
            LogRecord::Commit(commit) => self.apply_commit(commit),
        }
    }

    /// Applies a schema upgrade.
    ///
    /// All new indexes are built before anything is installed, so a failed
    /// unique index leaves the engine unchanged.
    ///
    /// # Errors
    ///
    /// Fails if the version would go down, an index targets a missing store,
    /// or a unique index cannot be built from the existing records.
    pub fn apply_upgrade(&mut self, upgrade: &UpgradeRecord) -> StoreResult<UpgradeReport> {
        if upgrade.to_version < self.version {
            return Err(StoreError::log_corruption(format!(
                "upgrade to version {} below current version {}",
                upgrade.to_version, self.version
            )));
        }

        let new_stores: Vec<StoreState> = upgrade
            .stores
            .iter()
            .filter(|def| !self.stores.contains_key(&def.name))
            .map(|def| StoreState::new(def.clone()))
            .collect();

        let mut new_indexes = Vec::new();
        for created in &upgrade.indexes {
            let store = self
                .stores
                .get(&created.store)
                .ok_or_else(|| StoreError::unknown_store(created.store.clone()))?;
            if store.index(&created.index.name).is_some() {
                continue;
            }
            new_indexes.push((created.store.clone(), store.build_index(&created.index)?));
        }

        let report = UpgradeReport {
            from_version: self.version,
            to_version: upgrade.to_version,
            created_stores: new_stores.iter().map(|s| s.name().to_string()).collect(),
            created_indexes: new_indexes
                .iter()
                .map(|(store, index)| (store.clone(), index.definition().name.clone()))
                .collect(),
        };

        for store in new_stores {
            self.stores.insert(store.name().to_string(), store);
        }
        for (store, index) in new_indexes {
            if let Some(state) = self.stores.get_mut(&store) {
                state.install_index(index);
            }
        }
        self.version = upgrade.to_version;

        Ok(report)
    }

    /// Applies a committed transaction.
    ///
    /// # Errors
    ///
    /// Fails if the store does not exist or a document cannot be decoded.
    pub fn apply_commit(&mut self, commit: &CommitRecord) -> StoreResult<()> {
        let store = self
            .stores
            .get_mut(&commit.store)
            .ok_or_else(|| StoreError::unknown_store(commit.store.clone()))?;

        let mut decoded = Vec::with_capacity(commit.ops.len());
        for op in &commit.ops {
            match op {
                LogOp::Put { key, value } => {
                    decoded.push((key.as_str(), Some(Value::try_from(value.clone())?)));
                }
                LogOp::Delete { key } => decoded.push((key.as_str(), None)),
            }
        }

        for (key, value) in decoded {
            match value {
                Some(value) => store.put(key, value),
                None => store.delete(key),
            }
        }
        self.last_txid = self.last_txid.max(commit.txid);
        Ok(())
    }
}
