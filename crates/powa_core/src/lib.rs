//! # POWA Core
//!
//! Embedded, versioned-schema document store behind the POWA photo
//! capture and tagging app.
//!
//! This crate provides:
//! - [`SchemaRegistry`]: accumulated, versioned store and index declarations
//! - [`StorageService`]: opens one named database, upgrades it to the
//!   registry's version and hands out transactions
//! - [`StoreHandle`]: one read-write transaction on one store, with CRUD,
//!   a key-ordered [`RecordCursor`] and equality index lookups
//! - [`Collection`]: typed per-store facade that re-initializes on demand
//! - [`Catalog`]: the app's `images` and `tags` collections
//!
//! Durability comes from an append-only, checksummed record log (see
//! [`log`]) replayed into memory on open.
//!
//! ## Connection lifecycle
//!
//! By default the connection closes as soon as its last transaction
//! completes ([`Config::close_after_transaction`]). Every [`Collection`]
//! call therefore reopens it first, which is cheap because the loaded
//! database stays cached in the service.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod catalog;
mod collection;
mod config;
mod connection;
mod database;
pub mod dir;
pub mod engine;
mod error;
mod handle;
pub mod log;
mod schema;
mod service;
mod transaction;
mod types;

pub use catalog::{powa_schema, Catalog, ImageDoc, TagDoc, TagIndex, IMAGES, TAGS};
pub use collection::{Collection, IndexName, Item, NoIndex};
pub use config::{Config, DEFAULT_DATABASE_NAME};
pub use database::StorageLocation;
pub use engine::UpgradeReport;
pub use error::{StoreError, StoreResult};
pub use handle::{RecordCursor, StoreHandle};
pub use schema::{IndexDefinition, SchemaDefinition, SchemaRegistry, StoreDefinition};
pub use service::{ServiceState, StorageService};
pub use transaction::{PendingWrite, TransactionState};
pub use types::{Record, TransactionId};
