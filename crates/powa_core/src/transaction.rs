//! Transaction state.

use crate::error::{StoreError, StoreResult};
use crate::log::LogOp;
use powa_codec::Value;
use std::collections::BTreeMap;

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A write buffered until commit.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingWrite {
    /// Insert or replace the record.
    Put(Value),
    /// Delete the record.
    Delete,
}

/// Buffered writes of one transaction against one store.
///
/// Only the latest write per key is kept; the store lock guarantees nothing
/// else changes the store underneath, so last-write-per-key is the whole
/// effect of the transaction.
#[derive(Debug)]
pub(crate) struct Transaction {
    state: TransactionState,
    writes: BTreeMap<String, PendingWrite>,
}

impl Transaction {
    pub(crate) fn new() -> Self {
        Self {
            state: TransactionState::Active,
            writes: BTreeMap::new(),
        }
    }

    pub(crate) fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    pub(crate) fn ensure_active(&self) -> StoreResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(StoreError::TransactionClosed)
        }
    }

    pub(crate) fn put(&mut self, key: &str, value: Value) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(key.to_string(), PendingWrite::Put(value));
        Ok(())
    }

    pub(crate) fn delete(&mut self, key: &str) -> StoreResult<()> {
        self.ensure_active()?;
        self.writes.insert(key.to_string(), PendingWrite::Delete);
        Ok(())
    }

    /// The buffered write for `key`, if any.
    pub(crate) fn pending(&self, key: &str) -> Option<&PendingWrite> {
        self.writes.get(key)
    }

    /// All buffered writes in key order.
    pub(crate) fn writes(&self) -> &BTreeMap<String, PendingWrite> {
        &self.writes
    }

    /// Drains the writes as log operations and marks the transaction committed.
    pub(crate) fn take_ops(&mut self) -> StoreResult<Vec<LogOp>> {
        self.ensure_active()?;
        self.state = TransactionState::Committed;
        Ok(std::mem::take(&mut self.writes)
            .into_iter()
            .map(|(key, write)| match write {
                PendingWrite::Put(value) => LogOp::put(key, value),
                PendingWrite::Delete => LogOp::Delete { key },
            })
            .collect())
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.writes.clear();
        self.state = TransactionState::Aborted;
    }
}
