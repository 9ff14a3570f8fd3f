//! A loaded database: record log plus materialized engine.

use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::engine::{Engine, UpgradeReport};
use crate::error::{StoreError, StoreResult};
use crate::log::{CommitRecord, LogOp, LogRecord, RecordLog};
use crate::schema::SchemaRegistry;
use crate::types::TransactionId;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use powa_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a database keeps its bytes.
#[derive(Debug, Clone)]
pub enum StorageLocation {
    /// Ephemeral storage. Clones of the backend share bytes, so a second
    /// service over a clone sees everything the first one committed.
    InMemory(InMemoryBackend),
    /// A storage root; the database lives in `<root>/<database name>/`.
    Directory(PathBuf),
}

/// Loaded state of one database.
///
/// Outlives individual connections: the service loads it on the first open
/// and reuses it for every re-open until reset.
pub(crate) struct Database {
    name: String,
    _dir: Option<DatabaseDir>,
    log: RecordLog,
    engine: RwLock<Engine>,
    store_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Database {
    /// Opens the storage and replays the record log.
    pub(crate) fn open(config: &Config, location: &StorageLocation) -> StoreResult<Self> {
        let (dir, backend): (Option<DatabaseDir>, Box<dyn StorageBackend>) = match location {
            StorageLocation::InMemory(backend) => (None, Box::new(backend.clone())),
            StorageLocation::Directory(root) => {
                let dir = DatabaseDir::open(
                    &root.join(&config.database_name),
                    config.create_if_missing,
                )?;
                let backend = FileBackend::open(&dir.log_path())?;
                (Some(dir), Box::new(backend))
            }
        };

        let log = RecordLog::new(backend, config.sync_on_commit);
        let replay = log.replay()?;
        if replay.truncated_bytes > 0 {
            warn!(
                database = %config.database_name,
                bytes = replay.truncated_bytes,
                "dropped torn record at end of log"
            );
        }

        let mut engine = Engine::new();
        for (offset, record) in &replay.records {
            engine.apply(record).map_err(|e| {
                StoreError::log_corruption(format!("record at offset {offset}: {e}"))
            })?;
        }

        info!(
            database = %config.database_name,
            version = engine.version(),
            records = replay.records.len(),
            "database loaded"
        );

        Ok(Self {
            name: config.database_name.clone(),
            _dir: dir,
            log,
            engine: RwLock::new(engine),
            store_locks: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn engine(&self) -> RwLockReadGuard<'_, Engine> {
        self.engine.read()
    }

    pub(crate) fn version(&self) -> u32 {
        self.engine.read().version()
    }

    /// Brings the schema up to the registry's target version.
    ///
    /// The engine is upgraded first, which either succeeds completely or
    /// changes nothing; only then is the upgrade logged. If the log write
    /// fails the in-memory state is ahead of disk and the caller must drop
    /// this database.
    pub(crate) fn upgrade(&self, registry: &SchemaRegistry) -> StoreResult<UpgradeReport> {
        let mut engine = self.engine.write();
        let plan = engine.plan_upgrade(registry);
        let report = engine.apply_upgrade(&plan)?;
        self.log.append(&LogRecord::Upgrade(plan))?;

        info!(
            database = %self.name,
            from = report.from_version,
            to = report.to_version,
            stores = ?report.created_stores,
            indexes = ?report.created_indexes,
            "schema upgraded"
        );
        Ok(report)
    }

    /// The async lock serializing transactions on `store`.
    pub(crate) fn store_lock(&self, store: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(self.store_locks.lock().entry(store.to_string()).or_default())
    }

    /// Logs and applies one transaction's writes.
    pub(crate) fn commit(&self, store: &str, ops: Vec<LogOp>) -> StoreResult<TransactionId> {
        let mut engine = self.engine.write();
        let record = CommitRecord {
            txid: engine.last_txid().next(),
            store: store.to_string(),
            ops,
        };
        let record = LogRecord::Commit(record);
        self.log.append(&record)?;
        engine.apply(&record)?;

        let txid = engine.last_txid();
        debug!(database = %self.name, store, %txid, "commit logged");
        Ok(txid)
    }

    pub(crate) fn sync(&self) -> StoreResult<()> {
        self.log.sync()
    }
}
