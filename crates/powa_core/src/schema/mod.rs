//! Versioned schema declarations.

mod definition;
mod registry;

pub use definition::{IndexDefinition, SchemaDefinition, StoreDefinition};
pub use registry::SchemaRegistry;
