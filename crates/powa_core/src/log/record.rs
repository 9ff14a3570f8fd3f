//! Log record types and frame encoding.

use crate::error::{StoreError, StoreResult};
use crate::schema::{IndexDefinition, StoreDefinition};
use crate::types::TransactionId;
use ciborium::Value as Cbor;
use powa_codec::Value;
use serde::{Deserialize, Serialize};

/// Magic bytes opening every frame.
pub const LOG_MAGIC: [u8; 4] = *b"PWLG";

/// Current frame format version.
pub const LOG_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub const HEADER_SIZE: usize = 11;

/// Trailing CRC32.
pub const CRC_SIZE: usize = 4;

/// Type byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Schema version change.
    Upgrade = 1,
    /// A committed transaction.
    Commit = 2,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Upgrade),
            2 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An index created on a store that already existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedIndex {
    /// Owning store.
    pub store: String,
    /// The new index.
    pub index: IndexDefinition,
}

/// A schema version change and the structure it created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRecord {
    /// Version before the upgrade (0 for a new database).
    pub from_version: u32,
    /// Version after the upgrade.
    pub to_version: u32,
    /// Stores created, each with all of its indexes.
    pub stores: Vec<StoreDefinition>,
    /// Indexes added to stores that already existed.
    pub indexes: Vec<CreatedIndex>,
}

impl UpgradeRecord {
    /// Whether the upgrade created nothing and only raised the version.
    #[must_use]
    pub fn is_version_only(&self) -> bool {
        self.stores.is_empty() && self.indexes.is_empty()
    }
}

/// One write inside a committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogOp {
    /// Insert or replace a record.
    Put {
        /// Primary key.
        key: String,
        /// The document, as CBOR.
        value: Cbor,
    },
    /// Delete a record.
    Delete {
        /// Primary key.
        key: String,
    },
}

impl LogOp {
    /// Builds a put operation from a document.
    pub fn put(key: impl Into<String>, value: Value) -> Self {
        Self::Put {
            key: key.into(),
            value: Cbor::from(value),
        }
    }

    /// Returns the primary key the operation touches.
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// A transaction's writes against one store, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    /// Commit identifier.
    pub txid: TransactionId,
    /// Store the transaction was scoped to.
    pub store: String,
    /// The writes.
    pub ops: Vec<LogOp>,
}

/// A record in the log.
#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    /// Schema upgrade.
    Upgrade(UpgradeRecord),
    /// Committed transaction.
    Commit(CommitRecord),
}

impl LogRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Upgrade(_) => LogRecordType::Upgrade,
            Self::Commit(_) => LogRecordType::Commit,
        }
    }

    /// Serializes the payload (without frame envelope) as CBOR.
    pub fn encode_payload(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        let written = match self {
            Self::Upgrade(upgrade) => ciborium::into_writer(upgrade, &mut buf),
            Self::Commit(commit) => ciborium::into_writer(commit, &mut buf),
        };
        written.map_err(|e| StoreError::log_corruption(format!("cannot encode payload: {e}")))?;
        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> StoreResult<Self> {
        let corrupt = |e: ciborium::de::Error<std::io::Error>| {
            StoreError::log_corruption(format!("undecodable {record_type:?} payload: {e}"))
        };
        match record_type {
            LogRecordType::Upgrade => ciborium::from_reader(payload)
                .map(Self::Upgrade)
                .map_err(corrupt),
            LogRecordType::Commit => ciborium::from_reader(payload)
                .map(Self::Commit)
                .map_err(corrupt),
        }
    }

    /// Builds the complete frame: header, payload and CRC.
    pub fn encode_frame(&self) -> StoreResult<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| StoreError::log_corruption("log record payload too large"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&LOG_MAGIC);
        frame.extend_from_slice(&LOG_VERSION.to_le_bytes());
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);

        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }
}

const fn crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut bit = 0;
        while bit < 8 {
            c = if c & 1 == 0 { c >> 1 } else { 0xEDB8_8320 ^ (c >> 1) };
            bit += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = crc_table();

/// CRC-32 (IEEE) over `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    !data.iter().fold(u32::MAX, |crc, &byte| {
        CRC_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize] ^ (crc >> 8)
    })
}
