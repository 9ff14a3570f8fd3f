//! # POWA Codec
//!
//! The structured document type stored by the POWA document store, and its
//! binary form.
//!
//! - [`Value`] is the opaque document: text-keyed maps, arrays, text, byte
//!   strings, integers, booleans and null. Floats are rejected so that equal
//!   documents always compare equal and index keys have a total order.
//! - [`encode`] / [`decode`] turn a document into CBOR bytes and back, using
//!   `ciborium`. Map keys are kept sorted, so encoding is deterministic.
//! - [`to_value`] / [`from_value`] bridge any `serde` type to a document, which
//!   is how typed collections store Rust structs.
//!
//! ```
//! use powa_codec::{decode, encode, Value};
//!
//! let doc = Value::document([("imageKey", Value::from("i1")), ("value", Value::from("cat"))]);
//! let bytes = encode(&doc).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), doc);
//! assert_eq!(doc.get_path("value"), Some(&Value::from("cat")));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cbor;
mod error;
mod value;

pub use cbor::{decode, encode, from_value, to_value};
pub use error::{CodecError, CodecResult};
pub use value::Value;
