//! Append side of the record log.

use crate::error::StoreResult;
use crate::log::iterator::LogIterator;
use crate::log::record::LogRecord;
use parking_lot::Mutex;
use powa_storage::StorageBackend;
use tracing::warn;

/// Result of reading the whole log back.
#[derive(Debug)]
pub struct Replay {
    /// Every intact record with its offset.
    pub records: Vec<(u64, LogRecord)>,
    /// Bytes dropped from the end because the last frame was torn.
    pub truncated_bytes: u64,
}

/// The append-only record log of one database.
///
/// Each append writes one complete frame, so a commit is either entirely in
/// the log or, after a crash mid-write, dropped as a torn tail on replay.
pub struct RecordLog {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_append: bool,
}

impl RecordLog {
    /// Wraps a backend.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_append: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_append,
        }
    }

    /// Appends one record and returns the offset of its frame.
    ///
    /// If the frame was written but could not be flushed or synced, it is cut
    /// off again, so a failed append never resurfaces on replay.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding, the write or the flush/sync fails.
    pub fn append(&self, record: &LogRecord) -> StoreResult<u64> {
        let frame = record.encode_frame()?;

        let mut backend = self.backend.lock();
        let offset = backend.append(&frame)?;
        let durable = if self.sync_on_append {
            backend.sync()
        } else {
            backend.flush()
        };
        if let Err(e) = durable {
            if let Err(undo) = backend.truncate(offset) {
                warn!(offset, error = %undo, "could not remove unsynced frame");
            }
            return Err(e.into());
        }
        Ok(offset)
    }

    /// Makes everything appended so far durable.
    pub fn sync(&self) -> StoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the current log size.
    pub fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Reads every intact record and cuts off a torn trailing frame.
    ///
    /// # Errors
    ///
    /// Returns an error on corruption before the tail.
    pub fn replay(&self) -> StoreResult<Replay> {
        let mut backend = self.backend.lock();

        let (records, valid_len, total) = {
            let mut iter = LogIterator::new(&**backend)?;
            let records = iter.by_ref().collect::<StoreResult<Vec<_>>>()?;
            (records, iter.valid_len(), iter.total_size())
        };

        let truncated_bytes = total - valid_len;
        if truncated_bytes > 0 {
            backend.truncate(valid_len)?;
            backend.sync()?;
        }

        Ok(Replay {
            records,
            truncated_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::record::{CommitRecord, LogOp, UpgradeRecord};
    use crate::types::TransactionId;
    use powa_codec::Value;
    use powa_storage::{InMemoryBackend, StorageResult};
    use std::io;

    /// Accepts writes but can never make them durable.
    struct UnsyncableBackend(InMemoryBackend);

    impl StorageBackend for UnsyncableBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.0.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            self.0.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            Err(io::Error::other("device gone").into())
        }

        fn size(&self) -> StorageResult<u64> {
            self.0.size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            Err(io::Error::other("device gone").into())
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.0.truncate(new_size)
        }
    }

    fn commit(n: u64) -> LogRecord {
        LogRecord::Commit(CommitRecord {
            txid: TransactionId::new(n),
            store: "images".into(),
            ops: vec![LogOp::put(format!("k{n}"), Value::from(n as i64))],
        })
    }

    #[test]
    fn append_then_replay() {
        let backend = InMemoryBackend::new();
        let log = RecordLog::new(Box::new(backend.clone()), true);

        let upgrade = LogRecord::Upgrade(UpgradeRecord {
            from_version: 0,
            to_version: 1,
            stores: vec![],
            indexes: vec![],
        });
        assert_eq!(log.append(&upgrade).unwrap(), 0);
        log.append(&commit(1)).unwrap();

        let replay = log.replay().unwrap();
        assert_eq!(replay.truncated_bytes, 0);
        let records: Vec<_> = replay.records.into_iter().map(|(_, r)| r).collect();
        assert_eq!(records, vec![upgrade, commit(1)]);
        assert_eq!(log.size().unwrap(), backend.data().len() as u64);
    }

    #[test]
    fn replay_cuts_the_torn_tail() {
        let backend = InMemoryBackend::new();
        let log = RecordLog::new(Box::new(backend.clone()), false);
        log.append(&commit(1)).unwrap();
        let intact = log.size().unwrap();

        let frame = commit(2).encode_frame().unwrap();
        let mut raw = backend.clone();
        raw.append(&frame[..frame.len() / 2]).unwrap();

        let replay = log.replay().unwrap();
        assert_eq!(replay.records.len(), 1);
        assert_eq!(replay.truncated_bytes, (frame.len() / 2) as u64);
        assert_eq!(log.size().unwrap(), intact);

        // appends after recovery start on a frame boundary
        log.append(&commit(3)).unwrap();
        assert_eq!(log.replay().unwrap().records.len(), 2);
    }

    #[test]
    fn failed_sync_removes_the_frame() {
        let backend = InMemoryBackend::new();
        for sync_on_append in [true, false] {
            let log = RecordLog::new(Box::new(UnsyncableBackend(backend.clone())), sync_on_append);

            assert!(log.append(&commit(1)).is_err());
            assert!(backend.data().is_empty());
        }

        let log = RecordLog::new(Box::new(backend.clone()), true);
        assert!(log.replay().unwrap().records.is_empty());
        assert_eq!(log.append(&commit(2)).unwrap(), 0);
    }
}
