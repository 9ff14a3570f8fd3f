//! Record log.
//!
//! The database's durable state is a single append-only log of framed
//! records:
//!
//! ```text
//! | magic "PWLG" (4) | version u16 (2) | type u8 (1) | len u32 (4) | payload (len) | crc32 (4) |
//! ```
//!
//! Integers are little endian, payloads are CBOR and the CRC covers
//! everything before it. Opening a database replays the log from the start.

mod iterator;
mod record;
mod writer;

pub use iterator::LogIterator;
pub use record::{
    compute_crc32, CommitRecord, CreatedIndex, LogOp, LogRecord, LogRecordType, UpgradeRecord,
    CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
pub use writer::{RecordLog, Replay};
