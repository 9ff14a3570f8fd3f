//! The storage service: connection lifecycle, upgrades and store handles.

use crate::config::Config;
use crate::connection::{Connection, ConnectionLease};
use crate::database::{Database, StorageLocation};
use crate::engine::UpgradeReport;
use crate::error::{StoreError, StoreResult};
use crate::handle::StoreHandle;
use crate::schema::SchemaRegistry;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Observable state of a [`StorageService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// `initialize()` has not run yet.
    Uninitialized,
    /// An open or upgrade is in progress.
    Opening,
    /// Connected, no transaction running.
    Ready,
    /// Connected with at least one live transaction.
    TransactionActive,
    /// The connection was closed; the next operation re-initializes.
    Closed,
    /// The last open failed. Stays here until [`StorageService::reset`].
    Errored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Uninitialized,
    Opening,
    Open,
    Errored,
}

#[derive(Default)]
struct Lifecycle {
    phase: Phase,
    database: Option<Arc<Database>>,
    connection: Option<Arc<Connection>>,
    last_upgrade: Option<UpgradeReport>,
    error: Option<String>,
}

struct Inner {
    config: Config,
    registry: SchemaRegistry,
    location: StorageLocation,
    init_guard: Arc<tokio::sync::Mutex<()>>,
    lifecycle: Mutex<Lifecycle>,
    next_connection: AtomicU64,
}

/// Owns the connection to one named database.
///
/// Built once at the composition root from a [`Config`], the accumulated
/// [`SchemaRegistry`] and a [`StorageLocation`], then cloned wherever it is
/// needed; clones share the same connection.
///
/// # Example
///
/// ```rust
/// use powa_core::{
///     Config, SchemaDefinition, SchemaRegistry, StorageLocation, StorageService,
///     StoreDefinition,
/// };
/// use powa_codec::Value;
/// use powa_storage::InMemoryBackend;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let registry = SchemaRegistry::new()
///     .with(SchemaDefinition::new(1, vec![StoreDefinition::new("images")]).unwrap());
/// let service = StorageService::new(
///     Config::default(),
///     registry,
///     StorageLocation::InMemory(InMemoryBackend::new()),
/// );
///
/// service.initialize().await.unwrap();
/// let mut images = service.store("images").await.unwrap();
/// images.add("i1", Value::from("data:...")).await.unwrap();
/// images.commit().await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct StorageService {
    inner: Arc<Inner>,
}

impl StorageService {
    /// Creates a service. Nothing is opened until [`initialize`](Self::initialize).
    pub fn new(config: Config, registry: SchemaRegistry, location: StorageLocation) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                registry,
                location,
                init_guard: Arc::new(tokio::sync::Mutex::new(())),
                lifecycle: Mutex::new(Lifecycle::default()),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The schema the database is opened against.
    #[must_use]
    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        let lifecycle = self.inner.lifecycle.lock();
        match lifecycle.phase {
            Phase::Uninitialized => ServiceState::Uninitialized,
            Phase::Opening => ServiceState::Opening,
            Phase::Errored => ServiceState::Errored,
            Phase::Open => match &lifecycle.connection {
                Some(connection) if !connection.is_closed() => {
                    if connection.active_transactions() > 0 {
                        ServiceState::TransactionActive
                    } else {
                        ServiceState::Ready
                    }
                }
                _ => ServiceState::Closed,
            },
        }
    }

    /// Schema version of the loaded database, if one is loaded.
    #[must_use]
    pub fn version(&self) -> Option<u32> {
        self.loaded_database().map(|database| database.version())
    }

    /// Names of the stores in the loaded database, sorted.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.loaded_database()
            .map(|database| database.engine().store_names())
            .unwrap_or_default()
    }

    /// What the most recent upgrade performed by this service created.
    #[must_use]
    pub fn last_upgrade(&self) -> Option<UpgradeReport> {
        self.inner.lifecycle.lock().last_upgrade.clone()
    }

    /// Opens the connection at the registry's target version.
    ///
    /// Upgrades the database first if its persisted version is lower. A
    /// no-op while a live connection exists; concurrent callers share one
    /// open. Loading and upgrading run on the blocking pool.
    ///
    /// # Errors
    ///
    /// [`StoreError::Connection`] if storage cannot be opened, the log is
    /// corrupt, the database is newer than the schema, or the upgrade fails.
    /// The service is then [`ServiceState::Errored`] and every later call
    /// fails the same way until [`reset`](Self::reset).
    /// [`StoreError::Timeout`] if the open does not finish within
    /// [`Config::open_timeout`]. The open itself still completes in the
    /// background and a later call picks up its result.
    pub async fn initialize(&self) -> StoreResult<()> {
        self.open(false).await.map(|_| ())
    }

    /// Begins a read-write transaction on `name`.
    ///
    /// Waits up to [`Config::transaction_timeout`] for a running transaction
    /// on the same store to finish.
    ///
    /// # Errors
    ///
    /// [`StoreError::NoConnection`] without a live connection,
    /// [`StoreError::UnknownStore`] if the store does not exist,
    /// [`StoreError::Timeout`] if the store stays busy.
    pub async fn store(&self, name: &str) -> StoreResult<StoreHandle> {
        let connection = self.live_connection().ok_or(StoreError::NoConnection)?;
        if connection.database().engine().store(name).is_none() {
            return Err(StoreError::unknown_store(name));
        }
        let lease = connection.begin()?;
        self.begin_transaction(lease, name).await
    }

    /// Initializes if needed, then begins a transaction on `name`.
    ///
    /// The transaction is registered on the connection before the
    /// initialize guard is released, so a transaction finishing elsewhere
    /// cannot close the connection in between.
    ///
    /// # Errors
    ///
    /// Those of [`initialize`](Self::initialize) and [`store`](Self::store).
    pub async fn open_store(&self, name: &str) -> StoreResult<StoreHandle> {
        let lease = self.open(true).await?.ok_or(StoreError::NoConnection)?;
        if lease.connection().database().engine().store(name).is_none() {
            return Err(StoreError::unknown_store(name));
        }
        self.begin_transaction(lease, name).await
    }

    /// Closes the live connection, if any, syncing the log.
    ///
    /// Transactions already running finish normally.
    pub fn close(&self) {
        let connection = self.inner.lifecycle.lock().connection.clone();
        if let Some(connection) = connection {
            connection.close();
        }
    }

    /// Forgets the connection, the loaded database and any open error.
    ///
    /// The next [`initialize`](Self::initialize) reloads from storage.
    pub fn reset(&self) {
        let previous = std::mem::take(&mut *self.inner.lifecycle.lock());
        if let Some(connection) = previous.connection {
            connection.close();
        }
        info!(database = %self.inner.config.database_name, "service reset");
    }

    fn loaded_database(&self) -> Option<Arc<Database>> {
        self.inner.lifecycle.lock().database.clone()
    }

    fn live_connection(&self) -> Option<Arc<Connection>> {
        let lifecycle = self.inner.lifecycle.lock();
        match (&lifecycle.phase, &lifecycle.connection) {
            (Phase::Open, Some(connection)) if !connection.is_closed() => {
                Some(Arc::clone(connection))
            }
            _ => None,
        }
    }

    async fn begin_transaction(
        &self,
        lease: ConnectionLease,
        name: &str,
    ) -> StoreResult<StoreHandle> {
        let connection_id = lease.connection().id();
        let database = Arc::clone(lease.connection().database());
        let lock = database.store_lock(name);
        let guard = tokio::time::timeout(self.inner.config.transaction_timeout, lock.lock_owned())
            .await
            .map_err(|_| StoreError::timeout(format!("transaction on store {name}")))?;

        debug!(store = name, connection = connection_id, "transaction started");
        Ok(StoreHandle::new(name, database, guard, lease))
    }

    /// Opens under the init guard, optionally claiming a transaction slot on
    /// the resulting connection.
    async fn open(&self, claim: bool) -> StoreResult<Option<ConnectionLease>> {
        let service = self.clone();
        let open = async move {
            let guard = Arc::clone(&service.inner.init_guard).lock_owned().await;
            if let Some(reused) = service.reuse_connection(claim) {
                return reused;
            }
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                service.open_connection(claim)
            })
            .await
            .map_err(|e| StoreError::connection(format!("open task failed: {e}")))?
        };
        tokio::time::timeout(self.inner.config.open_timeout, open)
            .await
            .map_err(|_| {
                StoreError::timeout(format!("opening database {}", self.inner.config.database_name))
            })?
    }

    /// Runs under the init guard. `None` means a fresh open is needed.
    fn reuse_connection(&self, claim: bool) -> Option<StoreResult<Option<ConnectionLease>>> {
        let lifecycle = self.inner.lifecycle.lock();
        match (lifecycle.phase, &lifecycle.connection) {
            (Phase::Errored, _) => Some(Err(StoreError::connection(
                lifecycle.error.clone().unwrap_or_default(),
            ))),
            (Phase::Open, Some(connection)) if !connection.is_closed() => {
                if !claim {
                    return Some(Ok(None));
                }
                // closed since the check: open a new one
                connection.begin().ok().map(|lease| Ok(Some(lease)))
            }
            _ => None,
        }
    }

    /// Runs under the init guard, on the blocking pool.
    fn open_connection(&self, claim: bool) -> StoreResult<Option<ConnectionLease>> {
        let cached = {
            let mut lifecycle = self.inner.lifecycle.lock();
            lifecycle.phase = Phase::Opening;
            lifecycle.database.clone()
        };

        // the lease is taken before the connection is published
        let opened = self
            .open_at_target(cached)
            .and_then(|(database, connection, report)| {
                let lease = if claim { Some(connection.begin()?) } else { None };
                Ok((database, connection, report, lease))
            });

        let mut lifecycle = self.inner.lifecycle.lock();
        match opened {
            Ok((database, connection, report, lease)) => {
                lifecycle.phase = Phase::Open;
                lifecycle.database = Some(database);
                lifecycle.connection = Some(connection);
                if report.is_some() {
                    lifecycle.last_upgrade = report;
                }
                Ok(lease)
            }
            Err(e) => {
                let message = match e {
                    StoreError::Connection { message } => message,
                    other => other.to_string(),
                };
                error!(database = %self.inner.config.database_name, error = %message, "open failed");
                lifecycle.phase = Phase::Errored;
                lifecycle.error = Some(message.clone());
                lifecycle.database = None;
                lifecycle.connection = None;
                Err(StoreError::Connection { message })
            }
        }
    }

    fn open_at_target(
        &self,
        cached: Option<Arc<Database>>,
    ) -> StoreResult<(Arc<Database>, Arc<Connection>, Option<UpgradeReport>)> {
        let config = &self.inner.config;
        let target = self.inner.registry.target_version();
        if target == 0 {
            return Err(StoreError::connection("no schema registered"));
        }

        let database = match cached {
            Some(database) => database,
            None => Arc::new(Database::open(config, &self.inner.location)?),
        };

        let persisted = database.version();
        let report = match persisted.cmp(&target) {
            Ordering::Greater => {
                return Err(StoreError::connection(format!(
                    "database {} is at version {persisted}, newer than schema version {target}",
                    config.database_name
                )));
            }
            Ordering::Less => Some(database.upgrade(&self.inner.registry)?),
            Ordering::Equal => None,
        };

        let id = self.inner.next_connection.fetch_add(1, AtomicOrdering::Relaxed);
        let connection = Arc::new(Connection::new(
            id,
            Arc::clone(&database),
            config.close_after_transaction,
        ));
        info!(
            database = %config.database_name,
            version = target,
            connection = id,
            "connection opened"
        );
        Ok((database, connection, report))
    }
}

impl std::fmt::Debug for StorageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageService")
            .field("database", &self.inner.config.database_name)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{IndexDefinition, SchemaDefinition, StoreDefinition};
    use powa_codec::Value;
    use powa_storage::InMemoryBackend;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new().with(
            SchemaDefinition::new(
                1,
                vec![
                    StoreDefinition::new("images"),
                    StoreDefinition::new("tags")
                        .with_index(IndexDefinition::new("imageKey", "imageKey")),
                ],
            )
            .unwrap(),
        )
    }

    fn service(config: Config) -> StorageService {
        StorageService::new(
            config,
            registry(),
            StorageLocation::InMemory(InMemoryBackend::new()),
        )
    }

    #[tokio::test]
    async fn store_before_initialize_has_no_connection() {
        let service = service(Config::default());
        assert_eq!(service.state(), ServiceState::Uninitialized);
        assert!(matches!(
            service.store("images").await,
            Err(StoreError::NoConnection)
        ));
    }

    #[tokio::test]
    async fn initialize_runs_first_upgrade() {
        let service = service(Config::default());
        service.initialize().await.unwrap();

        assert_eq!(service.state(), ServiceState::Ready);
        assert_eq!(service.version(), Some(1));
        assert_eq!(service.store_names(), ["images", "tags"]);
        let report = service.last_upgrade().unwrap();
        assert_eq!(report.from_version, 0);
        assert_eq!(report.created_stores, ["images", "tags"]);

        // already ready: no-op
        service.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn connection_closes_after_last_transaction() {
        let service = service(Config::default());
        service.initialize().await.unwrap();

        let mut handle = service.store("images").await.unwrap();
        assert_eq!(service.state(), ServiceState::TransactionActive);
        handle.put("i1", Value::from("x")).await.unwrap();
        handle.commit().await.unwrap();

        assert_eq!(service.state(), ServiceState::Closed);
        assert!(matches!(
            service.store("images").await,
            Err(StoreError::NoConnection)
        ));

        service.initialize().await.unwrap();
        let handle = service.store("images").await.unwrap();
        assert!(handle.get("i1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn connection_stays_open_when_configured() {
        let service = service(Config::default().close_after_transaction(false));
        service.initialize().await.unwrap();

        let mut handle = service.store("images").await.unwrap();
        handle.abort().await.unwrap();
        assert_eq!(service.state(), ServiceState::Ready);
        assert!(service.store("tags").await.is_ok());
    }

    #[tokio::test]
    async fn unknown_store() {
        let service = service(Config::default());
        service.initialize().await.unwrap();
        assert!(matches!(
            service.store("albums").await,
            Err(StoreError::UnknownStore { .. })
        ));
        assert_eq!(service.state(), ServiceState::Ready);
    }

    #[tokio::test]
    async fn empty_registry_cannot_open() {
        let service = StorageService::new(
            Config::default(),
            SchemaRegistry::new(),
            StorageLocation::InMemory(InMemoryBackend::new()),
        );
        assert!(matches!(
            service.initialize().await,
            Err(StoreError::Connection { .. })
        ));
        assert_eq!(service.state(), ServiceState::Errored);

        // errored is sticky
        assert!(service.initialize().await.is_err());

        service.reset();
        assert_eq!(service.state(), ServiceState::Uninitialized);
    }

    #[tokio::test]
    async fn busy_store_times_out() {
        let service = service(
            Config::default()
                .transaction_timeout(std::time::Duration::from_millis(20))
                .close_after_transaction(false),
        );
        service.initialize().await.unwrap();

        let _held = service.store("tags").await.unwrap();
        assert!(matches!(
            service.store("tags").await,
            Err(StoreError::Timeout { .. })
        ));
        // other stores are independent
        assert!(service.store("images").await.is_ok());
    }

    #[tokio::test]
    async fn open_store_initializes_and_claims_the_connection() {
        let service = service(Config::default());

        let mut handle = service.open_store("images").await.unwrap();
        assert_eq!(service.state(), ServiceState::TransactionActive);
        handle.put("i1", Value::from("x")).await.unwrap();
        handle.commit().await.unwrap();
        assert_eq!(service.state(), ServiceState::Closed);

        // reopens a closed connection
        let handle = service.open_store("images").await.unwrap();
        assert!(handle.get("i1").await.unwrap().is_some());
        drop(handle);

        assert!(matches!(
            service.open_store("albums").await,
            Err(StoreError::UnknownStore { .. })
        ));
    }
}
