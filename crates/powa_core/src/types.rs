//! Core type definitions.

use powa_codec::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a committed transaction in the record log.
///
/// Assigned at commit, monotonically increasing, never reused.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a new transaction ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next transaction ID.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// A stored record: a primary key and its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Primary key, unique within its store.
    pub key: String,
    /// The stored document.
    pub value: Value,
}

impl Record {
    /// Creates a record.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}
