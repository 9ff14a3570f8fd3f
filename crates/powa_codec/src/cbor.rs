//! CBOR encoding of documents and the serde bridge.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::{Integer, Value as Cbor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// Encodes a document to CBOR bytes.
///
/// Map keys come out in sorted order, so equal documents encode to identical
/// bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if the writer fails.
pub fn encode(value: &Value) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(&Cbor::from(value.clone()), &mut bytes)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(bytes)
}

/// Decodes a document from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not CBOR, hold trailing garbage the
/// reader rejects, or contain items with no document equivalent (floats,
/// tags, non-text map keys).
pub fn decode(bytes: &[u8]) -> CodecResult<Value> {
    let raw: Cbor =
        ciborium::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    Value::try_from(raw)
}

/// Converts any serializable type into a document.
///
/// # Errors
///
/// Returns an error if serialization fails or produces floats.
pub fn to_value<T: Serialize + ?Sized>(item: &T) -> CodecResult<Value> {
    let raw = Cbor::serialized(item).map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Value::try_from(raw)
}

/// Converts a document into a deserializable type.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] if the document does not have the
/// shape `T` expects.
pub fn from_value<T: DeserializeOwned>(value: &Value) -> CodecResult<T> {
    Cbor::from(value.clone())
        .deserialized()
        .map_err(|e| CodecError::decoding_failed(e.to_string()))
}

impl From<Value> for Cbor {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Cbor::Null,
            Value::Bool(b) => Cbor::Bool(b),
            Value::Integer(n) => Cbor::Integer(Integer::from(n)),
            Value::Text(s) => Cbor::Text(s),
            Value::Bytes(b) => Cbor::Bytes(b),
            Value::Array(items) => Cbor::Array(items.into_iter().map(Cbor::from).collect()),
            Value::Map(fields) => Cbor::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (Cbor::Text(k), Cbor::from(v)))
                    .collect(),
            ),
        }
    }
}

impl TryFrom<Cbor> for Value {
    type Error = CodecError;

    fn try_from(raw: Cbor) -> CodecResult<Self> {
        match raw {
            Cbor::Null => Ok(Value::Null),
            Cbor::Bool(b) => Ok(Value::Bool(b)),
            Cbor::Integer(n) => i64::try_from(n)
                .map(Value::Integer)
                .map_err(|_| CodecError::IntegerOverflow),
            Cbor::Text(s) => Ok(Value::Text(s)),
            Cbor::Bytes(b) => Ok(Value::Bytes(b)),
            Cbor::Float(_) => Err(CodecError::FloatForbidden),
            Cbor::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<CodecResult<Vec<_>>>()
                .map(Value::Array),
            Cbor::Map(pairs) => {
                let mut fields = BTreeMap::new();
                for (key, value) in pairs {
                    let Cbor::Text(key) = key else {
                        return Err(CodecError::NonTextKey);
                    };
                    fields.insert(key, Value::try_from(value)?);
                }
                Ok(Value::Map(fields))
            }
            Cbor::Tag(tag, _) => Err(CodecError::unsupported_type(format!("tag {tag}"))),
            other => Err(CodecError::unsupported_type(format!("{other:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Image {
        src: String,
        title: String,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Tag {
        image_key: String,
        value: String,
    }

    #[test]
    fn struct_becomes_map_document() {
        let image = Image {
            src: "data:image/png;base64,AAAA".into(),
            title: "A".into(),
        };

        let doc = to_value(&image).unwrap();

        assert_eq!(doc.get("title"), Some(&Value::from("A")));
        assert_eq!(from_value::<Image>(&doc).unwrap(), image);
    }

    #[test]
    fn serde_renames_are_document_fields() {
        let tag = Tag {
            image_key: "i1".into(),
            value: "cat".into(),
        };

        let doc = to_value(&tag).unwrap();

        assert_eq!(doc.get("imageKey"), Some(&Value::from("i1")));
        assert!(doc.get("image_key").is_none());
    }

    #[test]
    fn wrong_shape_fails_to_deserialize() {
        let doc = Value::document([("src", Value::from(1))]);
        assert!(matches!(
            from_value::<Image>(&doc),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn floats_are_rejected() {
        assert_eq!(to_value(&1.5f64), Err(CodecError::FloatForbidden));

        let mut bytes = Vec::new();
        ciborium::into_writer(&Cbor::Float(0.25), &mut bytes).unwrap();
        assert_eq!(decode(&bytes), Err(CodecError::FloatForbidden));
    }

    #[test]
    fn non_text_keys_are_rejected() {
        let raw = Cbor::Map(vec![(Cbor::Integer(1.into()), Cbor::Null)]);
        let mut bytes = Vec::new();
        ciborium::into_writer(&raw, &mut bytes).unwrap();
        assert_eq!(decode(&bytes), Err(CodecError::NonTextKey));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            decode(&[0xff, 0x00]),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    #[test]
    fn encoding_ignores_field_insertion_order() {
        let a = Value::document([("src", Value::from("s")), ("title", Value::from("t"))]);
        let b = Value::document([("title", Value::from("t")), ("src", Value::from("s"))]);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    fn leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            ".{0,12}".prop_map(Value::Text),
            proptest::collection::vec(any::<u8>(), 0..12).prop_map(Value::Bytes),
        ]
    }

    fn document() -> impl Strategy<Value = Value> {
        leaf().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                proptest::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(doc in document()) {
            let bytes = encode(&doc).unwrap();
            prop_assert_eq!(decode(&bytes).unwrap(), doc);
        }
    }
}
