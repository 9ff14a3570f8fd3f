//! Database directory management.
//!
//! A file-backed database lives in one directory under the storage root:
//!
//! ```text
//! <root>/<database name>/
//! ├─ LOCK        # Advisory lock for single-process access
//! └─ store.log   # Record log
//! ```

use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";

/// File name of the record log inside a database directory.
pub const LOG_FILE: &str = "store.log";

/// A locked database directory.
///
/// The exclusive lock on `LOCK` is held for as long as this value lives.
#[derive(Debug)]
pub struct DatabaseDir {
    path: PathBuf,
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens (and optionally creates) a database directory and locks it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connection`] if the directory is missing and
    /// `create_if_missing` is false, if the path is not a directory, or if
    /// another process holds the lock.
    pub fn open(path: &Path, create_if_missing: bool) -> StoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StoreError::connection(format!(
                    "database directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(StoreError::connection(format!(
                "not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::connection(format!(
                "database is locked by another process: {}",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// The directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the record log.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_and_locks() {
        let root = tempdir().unwrap();
        let path = root.path().join("POWA");

        let dir = DatabaseDir::open(&path, true).unwrap();
        assert!(path.join("LOCK").exists());
        assert_eq!(dir.log_path(), path.join("store.log"));

        let second = DatabaseDir::open(&path, true);
        assert!(matches!(second, Err(StoreError::Connection { .. })));

        drop(dir);
        assert!(DatabaseDir::open(&path, true).is_ok());
    }

    #[test]
    fn missing_directory_without_create() {
        let root = tempdir().unwrap();
        let err = DatabaseDir::open(&root.path().join("absent"), false).unwrap_err();
        assert!(matches!(err, StoreError::Connection { .. }));
    }

    #[test]
    fn file_is_not_a_directory() {
        let root = tempdir().unwrap();
        let file = root.path().join("plain");
        std::fs::write(&file, b"x").unwrap();
        assert!(DatabaseDir::open(&file, true).is_err());
    }
}
