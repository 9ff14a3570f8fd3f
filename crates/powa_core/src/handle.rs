//! Transaction-scoped store handles.

use crate::connection::ConnectionLease;
use crate::database::Database;
use crate::engine::{IndexKey, StoreState};
use crate::error::{StoreError, StoreResult};
use crate::transaction::{PendingWrite, Transaction, TransactionState};
use crate::types::Record;
use powa_codec::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// A read-write transaction on exactly one store.
///
/// Obtained from [`StorageService::store`](crate::StorageService::store).
/// Writes are buffered and become visible to other transactions on
/// [`commit`](Self::commit); reads through the handle already see them.
/// The handle holds the store's lock, so transactions on the same store run
/// one after another.
///
/// Once the transaction has committed or aborted every operation fails with
/// [`StoreError::TransactionClosed`]. Dropping an active handle aborts it.
pub struct StoreHandle {
    store: String,
    database: Arc<Database>,
    txn: Transaction,
    guard: Option<OwnedMutexGuard<()>>,
    lease: Option<ConnectionLease>,
}

impl StoreHandle {
    pub(crate) fn new(
        store: &str,
        database: Arc<Database>,
        guard: OwnedMutexGuard<()>,
        lease: ConnectionLease,
    ) -> Self {
        Self {
            store: store.to_string(),
            database,
            txn: Transaction::new(),
            guard: Some(guard),
            lease: Some(lease),
        }
    }

    /// Name of the store this handle is bound to.
    #[must_use]
    pub fn store_name(&self) -> &str {
        &self.store
    }

    /// Current transaction state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.txn.state()
    }

    /// Whether the transaction can still be used.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.txn.is_active()
    }

    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateKey`] if `key` exists,
    /// [`StoreError::ConstraintViolation`] if a unique index would clash.
    pub async fn add(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.txn.ensure_active()?;
        if self.current(key)?.is_some() {
            return Err(StoreError::duplicate_key(&self.store, key));
        }
        self.check_unique(key, &value)?;
        self.txn.put(key, value)
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConstraintViolation`] if a unique index would clash.
    pub async fn put(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.txn.ensure_active()?;
        self.check_unique(key, &value)?;
        self.txn.put(key, value)
    }

    /// Looks up a record; `None` if absent.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Record>> {
        self.txn.ensure_active()?;
        Ok(self.current(key)?.map(|value| Record::new(key, value)))
    }

    /// Deletes a record if present. Removing a missing key is not an error.
    pub async fn remove(&mut self, key: &str) -> StoreResult<()> {
        self.txn.ensure_active()?;
        if self.current(key)?.is_some() {
            self.txn.delete(key)?;
        }
        Ok(())
    }

    /// Number of records, counting this transaction's writes.
    pub async fn count(&self) -> StoreResult<usize> {
        self.txn.ensure_active()?;
        self.with_store(|store| {
            self.txn
                .writes()
                .iter()
                .fold(store.len(), |n, (key, write)| match (store.contains(key), write) {
                    (false, PendingWrite::Put(_)) => n + 1,
                    (true, PendingWrite::Delete) => n - 1,
                    _ => n,
                })
        })
    }

    /// Opens a cursor positioned before the first record.
    ///
    /// # Errors
    ///
    /// [`StoreError::TransactionClosed`] if the transaction has completed.
    pub fn cursor(&self) -> StoreResult<RecordCursor<'_>> {
        self.txn.ensure_active()?;
        Ok(RecordCursor {
            handle: self,
            position: None,
            exhausted: false,
        })
    }

    /// Every record in ascending key order.
    ///
    /// Drains a fresh [`RecordCursor`].
    pub async fn scan_all(&self) -> StoreResult<Vec<Record>> {
        let mut cursor = self.cursor()?;
        let mut records = Vec::new();
        while let Some(record) = cursor.advance().await? {
            records.push(record);
        }
        Ok(records)
    }

    /// Every record whose indexed field equals `key`, in ascending primary
    /// key order. Empty when nothing matches or `key` is not indexable.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownIndex`] if the store declares no such index.
    pub async fn query_by_index(&self, index: &str, key: &Value) -> StoreResult<Vec<Record>> {
        self.txn.ensure_active()?;
        self.with_store(|store| {
            let state = store
                .index(index)
                .ok_or_else(|| StoreError::unknown_index(&self.store, index))?;
            let Some(index_key) = IndexKey::from_value(key) else {
                return Ok(Vec::new());
            };

            let mut matches = BTreeMap::new();
            for primary in state.lookup(&index_key) {
                if self.txn.pending(primary).is_none() {
                    if let Some(value) = store.get(primary) {
                        matches.insert(primary.to_string(), value.clone());
                    }
                }
            }
            for (primary, write) in self.txn.writes() {
                if let PendingWrite::Put(value) = write {
                    if state.key_for(value).as_ref() == Some(&index_key) {
                        matches.insert(primary.clone(), value.clone());
                    }
                }
            }

            Ok(matches
                .into_iter()
                .map(|(key, value)| Record { key, value })
                .collect())
        })?
    }

    /// Commits the buffered writes atomically.
    ///
    /// # Errors
    ///
    /// [`StoreError::TransactionClosed`] if already completed, or the log
    /// error if the commit could not be written (nothing is applied then).
    pub async fn commit(&mut self) -> StoreResult<()> {
        let ops = self.txn.take_ops()?;
        let count = ops.len();
        let result = if ops.is_empty() {
            Ok(())
        } else {
            self.database.commit(&self.store, ops).map(|txid| {
                debug!(store = %self.store, %txid, ops = count, "transaction committed");
            })
        };
        if let Err(e) = &result {
            warn!(store = %self.store, error = %e, "commit failed");
            self.txn.mark_aborted();
        }
        self.release();
        result
    }

    /// Discards the buffered writes.
    ///
    /// # Errors
    ///
    /// [`StoreError::TransactionClosed`] if already completed.
    pub async fn abort(&mut self) -> StoreResult<()> {
        self.txn.ensure_active()?;
        self.txn.mark_aborted();
        self.release();
        debug!(store = %self.store, "transaction aborted");
        Ok(())
    }

    fn release(&mut self) {
        self.guard.take();
        self.lease.take();
    }

    fn with_store<R>(&self, f: impl FnOnce(&StoreState) -> R) -> StoreResult<R> {
        let engine = self.database.engine();
        let store = engine
            .store(&self.store)
            .ok_or_else(|| StoreError::unknown_store(&self.store))?;
        Ok(f(store))
    }

    /// The value `key` has as seen from inside this transaction.
    fn current(&self, key: &str) -> StoreResult<Option<Value>> {
        match self.txn.pending(key) {
            Some(PendingWrite::Put(value)) => Ok(Some(value.clone())),
            Some(PendingWrite::Delete) => Ok(None),
            None => self.with_store(|store| store.get(key).cloned()),
        }
    }

    fn check_unique(&self, key: &str, value: &Value) -> StoreResult<()> {
        self.with_store(|store| {
            for index in store.indexes().filter(|index| index.definition().unique) {
                let Some(index_key) = index.key_for(value) else {
                    continue;
                };
                let committed_clash = index
                    .lookup(&index_key)
                    .any(|other| other != key && self.txn.pending(other).is_none());
                let pending_clash = self.txn.writes().iter().any(|(other, write)| {
                    other != key
                        && matches!(write, PendingWrite::Put(v) if index.key_for(v).as_ref() == Some(&index_key))
                });
                if committed_clash || pending_clash {
                    return Err(StoreError::ConstraintViolation {
                        store: self.store.clone(),
                        index: index.definition().name.clone(),
                        key: key.to_string(),
                    });
                }
            }
            Ok(())
        })?
    }

    fn next_after(&self, after: Option<&str>) -> StoreResult<Option<Record>> {
        self.with_store(|store| {
            let mut position = after.map(str::to_string);
            loop {
                let lower = position.as_deref().map_or(Bound::Unbounded, Bound::Excluded);
                let committed = store.next_after(position.as_deref()).map(|(key, _)| key);
                let pending = self
                    .txn
                    .writes()
                    .range::<str, _>((lower, Bound::Unbounded))
                    .next()
                    .map(|(key, _)| key.as_str());

                let candidate = match (committed, pending) {
                    (Some(a), Some(b)) => a.min(b),
                    (Some(a), None) | (None, Some(a)) => a,
                    (None, None) => return None,
                };

                match self.txn.pending(candidate) {
                    Some(PendingWrite::Put(value)) => {
                        return Some(Record::new(candidate, value.clone()));
                    }
                    Some(PendingWrite::Delete) => position = Some(candidate.to_string()),
                    None => {
                        return store
                            .get(candidate)
                            .map(|value| Record::new(candidate, value.clone()));
                    }
                }
            }
        })
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        if self.txn.is_active() {
            self.txn.mark_aborted();
            debug!(store = %self.store, "active transaction dropped, aborted");
        }
    }
}

/// Walks a store in ascending key order inside a transaction.
///
/// Non-restartable: once [`advance`](Self::advance) returns `None` it keeps
/// returning `None`.
pub struct RecordCursor<'h> {
    handle: &'h StoreHandle,
    position: Option<String>,
    exhausted: bool,
}

impl RecordCursor<'_> {
    /// Moves to the next record and returns it, or `None` when exhausted.
    ///
    /// # Errors
    ///
    /// [`StoreError::TransactionClosed`] if the transaction has completed.
    pub async fn advance(&mut self) -> StoreResult<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }
        self.handle.txn.ensure_active()?;

        match self.handle.next_after(self.position.as_deref())? {
            Some(record) => {
                self.position = Some(record.key.clone());
                Ok(Some(record))
            }
            None => {
                self.exhausted = true;
                Ok(None)
            }
        }
    }
}
