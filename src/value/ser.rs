//! Serde support for the value model
//!
//! `Value` and `Document` serialize into and deserialize from the canonical
//! binary document form used by the codec collaborator. Decoding rejects
//! mappings whose keys are not strings.

use std::fmt;

use serde::de::{DeserializeSeed, Deserializer, Error as DeError, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use super::{Document, Value};

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::UInt(n) => serializer.serialize_u64(*n),
            Value::Double(n) => serializer.serialize_f64(*n),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::DateTime(t) => serializer.serialize_str(&t.to_rfc3339()),
            Value::Array(items) => items.serialize(serializer),
            Value::Document(doc) => doc.serialize(serializer),
            // Raw fragments are spliced into the stream as the value they
            // contain, not as an opaque byte blob.
            Value::Raw(raw) => {
                let inner: Value =
                    rmp_serde::from_slice(raw.bytes()).map_err(serde::ser::Error::custom)?;
                inner.serialize(serializer)
            }
        }
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Seed for document keys: anything other than a string is rejected.
struct DocumentKey;

impl<'de> DeserializeSeed<'de> for DocumentKey {
    type Value = String;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(KeyVisitor)
    }
}

struct KeyVisitor;

impl<'de> Visitor<'de> for KeyVisitor {
    type Value = String;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string key")
    }

    fn visit_str<E: DeError>(self, v: &str) -> Result<String, E> {
        Ok(v.to_owned())
    }

    fn visit_string<E: DeError>(self, v: String) -> Result<String, E> {
        Ok(v)
    }

    fn visit_bool<E: DeError>(self, _: bool) -> Result<String, E> {
        Err(E::custom("map key not a string"))
    }

    fn visit_i64<E: DeError>(self, _: i64) -> Result<String, E> {
        Err(E::custom("map key not a string"))
    }

    fn visit_u64<E: DeError>(self, _: u64) -> Result<String, E> {
        Err(E::custom("map key not a string"))
    }

    fn visit_f64<E: DeError>(self, _: f64) -> Result<String, E> {
        Err(E::custom("map key not a string"))
    }

    fn visit_bytes<E: DeError>(self, _: &[u8]) -> Result<String, E> {
        Err(E::custom("map key not a string"))
    }

    fn visit_unit<E: DeError>(self) -> Result<String, E> {
        Err(E::custom("map key not a string"))
    }
}

fn collect_document<'de, A: MapAccess<'de>>(mut access: A) -> Result<Document, A::Error> {
    let mut doc = Document::new();
    while let Some(key) = access.next_key_seed(DocumentKey)? {
        let value: Value = access.next_value()?;
        doc.insert(key, value);
    }
    Ok(doc)
}

struct DocumentVisitor;

impl<'de> Visitor<'de> for DocumentVisitor {
    type Value = Document;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a string-keyed document")
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Document, A::Error> {
        collect_document(access)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Document, D::Error> {
        deserializer.deserialize_map(DocumentVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a document value")
    }

    fn visit_unit<E: DeError>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: DeError>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: DeError>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Bool(v))
    }

    fn visit_i64<E: DeError>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Int(v))
    }

    fn visit_u64<E: DeError>(self, v: u64) -> Result<Value, E> {
        Ok(Value::UInt(v))
    }

    fn visit_f64<E: DeError>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Double(v))
    }

    fn visit_str<E: DeError>(self, v: &str) -> Result<Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E: DeError>(self, v: String) -> Result<Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E: DeError>(self, v: &[u8]) -> Result<Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E: DeError>(self, v: Vec<u8>) -> Result<Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut access: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some(item) = access.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, access: A) -> Result<Value, A::Error> {
        Ok(Value::Document(collect_document(access)?))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_document_round_trip() {
        let original = doc! {
            "name" => "alice",
            "age" => 42u32,
            "tags" => vec!["a".to_string(), "b".to_string()],
            "nested" => doc! { "ok" => true },
        };
        let bytes = rmp_serde::to_vec_named(&original).unwrap();
        let decoded: Document = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_null_round_trip() {
        let bytes = rmp_serde::to_vec_named(&Value::Null).unwrap();
        let decoded: Value = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(decoded, Value::Null);
    }

    #[test]
    fn test_raw_fragment_splices_inline() {
        let fragment = crate::value::RawDocument::encode(&doc! { "inner" => true }).unwrap();
        let outer = doc! { "frag" => fragment, "plain" => -1i64 };
        let bytes = rmp_serde::to_vec_named(&outer).unwrap();
        let decoded: Document = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(
            decoded,
            doc! { "frag" => doc! { "inner" => true }, "plain" => -1i64 }
        );
    }

    #[test]
    fn test_invalid_raw_fragment_fails_to_encode() {
        let outer = doc! { "frag" => crate::value::RawDocument::from_bytes(vec![0xc1]) };
        assert!(rmp_serde::to_vec_named(&outer).is_err());
    }

    #[test]
    fn test_non_string_keys_rejected() {
        let mut source = std::collections::BTreeMap::new();
        source.insert(7i64, "seven");
        let bytes = rmp_serde::to_vec_named(&source).unwrap();
        let err = rmp_serde::from_slice::<Document>(&bytes).unwrap_err();
        assert!(err.to_string().contains("map key not a string"), "{err}");
    }

    #[test]
    fn test_scalar_is_not_a_document() {
        let bytes = rmp_serde::to_vec_named(&34i64).unwrap();
        assert!(rmp_serde::from_slice::<Document>(&bytes).is_err());
    }
}
