//! # POWA Storage
//!
//! Byte-level storage backends underneath the POWA document store.
//!
//! A backend is an **opaque append-only byte store**: it reads ranges, appends,
//! flushes and truncates. It knows nothing about records, stores or schemas;
//! the record log in `powa_core` owns every byte layout decision.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - ephemeral storage; clones share the same bytes, so a
//!   database can be "reopened" over it in tests
//! - [`FileBackend`] - persistent storage on a single file
//!
//! ## Example
//!
//! ```rust
//! use powa_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"frame").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"frame");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
