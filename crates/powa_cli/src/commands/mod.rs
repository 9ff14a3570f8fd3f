//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod query;
pub mod verify;

use powa_codec::Value;
use powa_core::dir::DatabaseDir;
use powa_core::engine::{Engine, StoreState};
use powa_core::log::LogIterator;
use powa_storage::{FileBackend, StorageBackend};
use std::path::Path;
use tracing::debug;

/// A database rebuilt in memory from its record log.
pub struct Snapshot {
    /// Materialized stores and indexes.
    pub engine: Engine,
    /// Size of the log file in bytes.
    pub log_size: u64,
    /// Bytes covered by complete frames.
    pub valid_len: u64,
    /// Number of frames replayed.
    pub records: usize,
}

impl Snapshot {
    /// Replays the log of the database directory at `path`.
    ///
    /// Holds the directory lock while reading, so a running service and
    /// the CLI never see the log at the same time.
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = DatabaseDir::open(path, false)?;
        let backend = FileBackend::open(&dir.log_path())?;
        let log_size = backend.size()?;

        let mut engine = Engine::new();
        let mut iter = LogIterator::new(&backend)?;
        let mut records = 0;
        for item in iter.by_ref() {
            let (offset, record) = item?;
            engine
                .apply(&record)
                .map_err(|e| format!("record at offset {offset}: {e}"))?;
            records += 1;
        }
        let valid_len = iter.valid_len();
        debug!(path = %path.display(), records, valid_len, "log replayed");

        Ok(Self {
            engine,
            log_size,
            valid_len,
            records,
        })
    }

    /// Looks up a store or fails with a message naming the known ones.
    pub fn store(&self, name: &str) -> Result<&StoreState, Box<dyn std::error::Error>> {
        self.engine.store(name).ok_or_else(|| {
            format!(
                "no store named {name:?} (stores: {})",
                self.engine.store_names().join(", ")
            )
            .into()
        })
    }
}

/// Renders a document as JSON. Byte strings become lowercase hex.
pub fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::from(*i),
        Value::Text(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::String(bytes.iter().map(|b| format!("{b:02x}")).collect()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(fields) => Json::Object(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), to_json(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use powa_codec::Value;
    use powa_core::{
        Config, IndexDefinition, SchemaDefinition, SchemaRegistry, StorageLocation,
        StorageService, StoreDefinition,
    };
    use std::path::Path;

    /// Writes a small `tags` database under `root` and releases it.
    pub(crate) fn seed(root: &Path) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let registry = SchemaRegistry::new().with(
                SchemaDefinition::new(
                    1,
                    vec![StoreDefinition::new("tags")
                        .with_index(IndexDefinition::new("valueKey", "value"))],
                )
                .unwrap(),
            );
            let service = StorageService::new(
                Config::default(),
                registry,
                StorageLocation::Directory(root.to_path_buf()),
            );
            service.initialize().await.unwrap();
            let mut tags = service.store("tags").await.unwrap();
            for (key, value) in [("t1", "cat"), ("t2", "dog"), ("t3", "cat")] {
                let doc = Value::document([
                    ("imageKey", Value::from("i1")),
                    ("value", Value::from(value)),
                ]);
                tags.add(key, doc).await.unwrap();
            }
            tags.commit().await.unwrap();
        });
    }
}
