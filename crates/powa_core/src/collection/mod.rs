//! Typed collections over single stores.
//!
//! A [`Collection`] binds one store name to a document type `T` and a closed
//! set of index names `I`. Every call runs in its own transaction, opening
//! the connection on demand.

mod typed;

pub use typed::Collection;

use std::fmt;

/// The closed set of index names of one collection.
///
/// ```rust
/// use powa_core::IndexName;
///
/// #[derive(Debug, Clone, Copy)]
/// enum AlbumIndex {
///     Owner,
/// }
///
/// impl IndexName for AlbumIndex {
///     fn name(self) -> &'static str {
///         match self {
///             Self::Owner => "owner",
///         }
///     }
/// }
/// ```
pub trait IndexName: Copy + fmt::Debug + Send + Sync + 'static {
    /// The index name as declared in the schema.
    fn name(self) -> &'static str;
}

/// Index set of a collection without indexes. Has no values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoIndex {}

impl IndexName for NoIndex {
    fn name(self) -> &'static str {
        match self {}
    }
}

/// A decoded record: its key and typed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<T> {
    /// Primary key.
    pub key: String,
    /// Decoded document.
    pub data: T,
}
