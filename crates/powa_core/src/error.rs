//! Error types for the POWA store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in POWA store operations.
///
/// Absence is never an error: lookups of missing keys resolve to `None` or an
/// empty sequence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database could not be opened or upgraded.
    ///
    /// Not retried automatically; the service stays errored until reset.
    #[error("connection error: {message}")]
    Connection {
        /// Description of the failure.
        message: String,
    },

    /// No live connection; `initialize()` has not succeeded or the connection
    /// was closed after its last transaction.
    #[error("no open connection")]
    NoConnection,

    /// The owning transaction has already committed or aborted.
    #[error("transaction already completed")]
    TransactionClosed,

    /// `add` was called with a key that already exists.
    #[error("duplicate key {key:?} in store {store}")]
    DuplicateKey {
        /// Store name.
        store: String,
        /// The conflicting primary key.
        key: String,
    },

    /// The index is not declared for the store.
    #[error("unknown index {index:?} on store {store}")]
    UnknownIndex {
        /// Store name.
        store: String,
        /// Requested index name.
        index: String,
    },

    /// The store does not exist in the open schema.
    #[error("unknown store: {name}")]
    UnknownStore {
        /// Requested store name.
        name: String,
    },

    /// A write would map one unique index key to two records.
    #[error("unique index {index:?} on store {store} already holds another record for key {key:?}")]
    ConstraintViolation {
        /// Store name.
        store: String,
        /// Index name.
        index: String,
        /// Primary key of the rejected write.
        key: String,
    },

    /// A schema definition is malformed.
    #[error("invalid schema: {message}")]
    InvalidSchema {
        /// Description of the problem.
        message: String,
    },

    /// An open or transaction begin did not finish in time.
    #[error("timed out waiting for {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// Re-initialization did not yield a usable store handle.
    #[error("gave up after {attempts} initialization attempts: {source}")]
    RetriesExhausted {
        /// Number of initialization attempts made.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: Box<StoreError>,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] powa_storage::StorageError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] powa_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record log is corrupted or invalid.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// A log frame failed its checksum.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the frame.
        actual: u32,
    },
}

impl StoreError {
    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid schema error.
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::InvalidSchema {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a duplicate key error.
    pub fn duplicate_key(store: impl Into<String>, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            store: store.into(),
            key: key.into(),
        }
    }

    /// Creates an unknown index error.
    pub fn unknown_index(store: impl Into<String>, index: impl Into<String>) -> Self {
        Self::UnknownIndex {
            store: store.into(),
            index: index.into(),
        }
    }

    /// Creates an unknown store error.
    pub fn unknown_store(name: impl Into<String>) -> Self {
        Self::UnknownStore { name: name.into() }
    }

    /// Whether the error means "open the connection and try again".
    #[must_use]
    pub fn is_no_connection(&self) -> bool {
        matches!(self, Self::NoConnection)
    }
}
