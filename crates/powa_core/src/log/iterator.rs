//! Frame-by-frame reader over the record log.

use crate::error::{StoreError, StoreResult};
use crate::log::record::{
    compute_crc32, LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
use powa_storage::StorageBackend;

/// Reads log frames in order, starting at offset zero.
///
/// # Error Handling
///
/// - A truncated trailing frame (incomplete header, payload or CRC) ends the
///   iteration cleanly; [`LogIterator::valid_len`] then points at its start.
/// - Bad magic, an unknown type, a newer format version or a CRC mismatch
///   yields an error and stops the iteration.
pub struct LogIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogIterator<'a> {
    /// Creates an iterator over the whole backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend) -> StoreResult<Self> {
        Ok(Self {
            backend,
            total_size: backend.size()?,
            offset: 0,
            finished: false,
        })
    }

    /// Offset just past the last frame read successfully.
    #[must_use]
    pub fn valid_len(&self) -> u64 {
        self.offset
    }

    /// Total size of the log when the iterator was created.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    fn remaining(&self) -> u64 {
        self.total_size - self.offset
    }

    fn read_frame(&mut self) -> StoreResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        if self.remaining() < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != LOG_MAGIC {
            return Err(StoreError::log_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(StoreError::log_corruption(format!(
                "unsupported frame version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = LogRecordType::from_byte(type_byte).ok_or_else(|| {
            StoreError::log_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let rest = len + CRC_SIZE;
        if self.remaining() < (HEADER_SIZE + rest) as u64 {
            // torn write: the frame never finished
            return Ok(None);
        }

        let body = self.backend.read_at(start + HEADER_SIZE as u64, rest)?;
        let (payload, crc_bytes) = body.split_at(len);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut framed = header;
        framed.extend_from_slice(payload);
        let actual = compute_crc32(&framed);
        if expected != actual {
            return Err(StoreError::ChecksumMismatch { expected, actual });
        }

        let record = LogRecord::decode_payload(record_type, payload)?;
        self.offset = start + (HEADER_SIZE + rest) as u64;
        Ok(Some((start, record)))
    }
}

impl Iterator for LogIterator<'_> {
    type Item = StoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_frame() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::record::{CommitRecord, LogOp, UpgradeRecord};
    use crate::types::TransactionId;
    use powa_codec::Value;
    use powa_storage::InMemoryBackend;

    fn upgrade() -> LogRecord {
        LogRecord::Upgrade(UpgradeRecord {
            from_version: 0,
            to_version: 1,
            stores: vec![],
            indexes: vec![],
        })
    }

    fn commit(key: &str) -> LogRecord {
        LogRecord::Commit(CommitRecord {
            txid: TransactionId::new(1),
            store: "images".into(),
            ops: vec![LogOp::put(key, Value::from("x"))],
        })
    }

    fn backend_with(records: &[LogRecord]) -> InMemoryBackend {
        let mut backend = InMemoryBackend::new();
        for record in records {
            backend.append(&record.encode_frame().unwrap()).unwrap();
        }
        backend
    }

    #[test]
    fn reads_frames_in_order() {
        let backend = backend_with(&[upgrade(), commit("a")]);
        let mut iter = LogIterator::new(&backend).unwrap();

        let (first_offset, first) = iter.next().unwrap().unwrap();
        let (second_offset, second) = iter.next().unwrap().unwrap();
        assert!(iter.next().is_none());

        assert_eq!(first_offset, 0);
        assert!(second_offset > 0);
        assert_eq!(first, upgrade());
        assert_eq!(second, commit("a"));
        assert_eq!(iter.valid_len(), iter.total_size());
    }

    #[test]
    fn empty_log_has_no_frames() {
        let backend = InMemoryBackend::new();
        let mut iter = LogIterator::new(&backend).unwrap();
        assert!(iter.next().is_none());
        assert_eq!(iter.valid_len(), 0);
    }

    #[test]
    fn torn_tail_ends_cleanly() {
        let whole = upgrade().encode_frame().unwrap();
        let torn = commit("b").encode_frame().unwrap();

        for cut in [3, HEADER_SIZE, torn.len() - 1] {
            let mut bytes = whole.clone();
            bytes.extend_from_slice(&torn[..cut]);
            let backend = InMemoryBackend::with_data(bytes);

            let mut iter = LogIterator::new(&backend).unwrap();
            assert!(iter.next().unwrap().is_ok());
            assert!(iter.next().is_none(), "cut at {cut}");
            assert_eq!(iter.valid_len(), whole.len() as u64);
        }
    }

    #[test]
    fn flipped_payload_byte_is_a_checksum_mismatch() {
        let backend = backend_with(&[commit("a")]);
        let byte = backend.data()[HEADER_SIZE + 2];
        backend.corrupt_byte(HEADER_SIZE + 2, byte ^ 0xFF);

        let mut iter = LogIterator::new(&backend).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(StoreError::ChecksumMismatch { .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn bad_magic_is_corruption() {
        let backend = backend_with(&[commit("a")]);
        backend.corrupt_byte(0, b'X');

        let mut iter = LogIterator::new(&backend).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(StoreError::LogCorruption { .. }))
        ));
    }

    #[test]
    fn unknown_type_and_future_version_are_corruption() {
        let backend = backend_with(&[commit("a")]);
        backend.corrupt_byte(6, 42);
        let mut iter = LogIterator::new(&backend).unwrap();
        assert!(matches!(iter.next(), Some(Err(StoreError::LogCorruption { .. }))));

        let backend = backend_with(&[commit("a")]);
        backend.corrupt_byte(4, 9);
        let mut iter = LogIterator::new(&backend).unwrap();
        assert!(matches!(iter.next(), Some(Err(StoreError::LogCorruption { .. }))));
    }
}
