//! Verify command implementation.

use powa_core::dir::DatabaseDir;
use powa_core::engine::Engine;
use powa_core::log::{LogIterator, LogRecord};
use powa_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Complete frames read.
    pub frames: usize,
    /// Schema upgrade frames.
    pub upgrades: usize,
    /// Commit frames.
    pub commits: usize,
    /// Bytes of an unfinished frame at the end of the log.
    pub torn_bytes: u64,
    /// Problems found; verification stops at the first.
    pub errors: Vec<String>,
}

impl VerifyResult {
    /// Whether the log replays cleanly.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks framing, checksums and replay of the database at `path`.
pub fn verify(path: &Path) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let dir = DatabaseDir::open(path, false)?;
    let backend = FileBackend::open(&dir.log_path())?;

    let mut result = VerifyResult::default();
    let mut engine = Engine::new();
    let mut iter = LogIterator::new(&backend)?;
    for item in iter.by_ref() {
        let (offset, record) = match item {
            Ok(frame) => frame,
            Err(e) => {
                result.errors.push(e.to_string());
                break;
            }
        };
        result.frames += 1;
        match &record {
            LogRecord::Upgrade(_) => result.upgrades += 1,
            LogRecord::Commit(_) => result.commits += 1,
        }
        if let Err(e) = engine.apply(&record) {
            result.errors.push(format!("record at offset {offset}: {e}"));
            break;
        }
    }
    if result.is_ok() {
        result.torn_bytes = backend.size()? - iter.valid_len();
    }

    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying database at {}", path.display());
    let result = verify(path)?;

    println!("  Frames:   {}", result.frames);
    println!("  Upgrades: {}", result.upgrades);
    println!("  Commits:  {}", result.commits);
    if result.torn_bytes > 0 {
        println!("  Torn tail of {} bytes (dropped on next open)", result.torn_bytes);
    }
    for error in &result.errors {
        println!("  Error: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Database verification passed");
        Ok(())
    } else {
        println!("✗ Database verification failed");
        Err("Verification failed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::seed;
    use std::fs::OpenOptions;
    use std::io::{Seek, SeekFrom, Write};
    use tempfile::tempdir;

    #[test]
    fn clean_log_passes() {
        let root = tempdir().unwrap();
        seed(root.path());

        let result = verify(&root.path().join("POWA")).unwrap();
        assert!(result.is_ok());
        assert_eq!((result.frames, result.upgrades, result.commits), (2, 1, 1));
        assert_eq!(result.torn_bytes, 0);
    }

    #[test]
    fn torn_tail_is_reported_not_failed() {
        let root = tempdir().unwrap();
        seed(root.path());
        let log = root.path().join("POWA").join("store.log");
        let mut file = OpenOptions::new().append(true).open(&log).unwrap();
        file.write_all(b"PWLG\x01").unwrap();

        let result = verify(&root.path().join("POWA")).unwrap();
        assert!(result.is_ok());
        assert_eq!(result.torn_bytes, 5);
    }

    #[test]
    fn flipped_byte_fails() {
        let root = tempdir().unwrap();
        seed(root.path());
        let log = root.path().join("POWA").join("store.log");
        let mut file = OpenOptions::new().write(true).open(&log).unwrap();
        file.seek(SeekFrom::Start(4)).unwrap();
        file.write_all(&[0xEE]).unwrap();

        let result = verify(&root.path().join("POWA")).unwrap();
        assert!(!result.is_ok());
        assert_eq!(result.frames, 0);
    }
}
