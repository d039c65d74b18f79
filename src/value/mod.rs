//! Runtime value model
//!
//! Provides the closed set of value kinds an update document can carry:
//! - `Value`: scalar, array, document and raw (pre-encoded) variants
//! - `Document`: ordered string-keyed mapping of values
//! - `RawDocument`: a document kept in its encoded MessagePack form
//! - `ToValue`: infallible conversion from field types into `Value`

use std::collections::{BTreeMap, HashMap};
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use uuid::Uuid;

mod ser;

/// A single value stored under a document key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Array(Vec<Value>),
    Document(Document),
    Raw(RawDocument),
}

impl Value {
    /// Short name of the value kind, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::DateTime(_) => "datetime",
            Value::Array(_) => "array",
            Value::Document(_) => "document",
            Value::Raw(_) => "raw",
        }
    }

    /// Whether the value counts as empty for omission purposes.
    ///
    /// Text, byte strings, arrays and documents are zero when empty, numbers
    /// when numerically zero, booleans when false, `Null` always, and a
    /// date-time when it equals the canonical unset instant (the Unix epoch,
    /// which is also its `Default`). Raw documents are never zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(n) => *n == 0,
            Value::UInt(n) => *n == 0,
            Value::Double(n) => *n == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::DateTime(t) => *t == DateTime::<Utc>::UNIX_EPOCH,
            Value::Array(items) => items.is_empty(),
            Value::Document(doc) => doc.is_empty(),
            Value::Raw(_) => false,
        }
    }
}

/// An ordered string-keyed mapping of values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl Deref for Document {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Document {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = (&'a String, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Build a [`Document`] literal.
///
/// ```
/// use document_update_sdk::doc;
///
/// let d = doc! { "name" => "alice", "age" => 42 };
/// assert_eq!(d.len(), 2);
/// ```
#[macro_export]
macro_rules! doc {
    () => { $crate::value::Document::new() };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut doc = $crate::value::Document::new();
        $(
            doc.insert(
                ::std::string::String::from($key),
                $crate::value::ToValue::to_value(&$value),
            );
        )+
        doc
    }};
}

/// A document held in its encoded MessagePack form. The bytes are treated as
/// opaque until an update is built from them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument(Vec<u8>);

impl RawDocument {
    /// Wrap already-encoded document bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Encode any serializable value into its raw document form.
    pub fn encode<T>(value: &T) -> Result<Self, rmp_serde::encode::Error>
    where
        T: serde::Serialize + ?Sized,
    {
        Ok(Self(rmp_serde::to_vec_named(value)?))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Infallible conversion of a field value into a [`Value`].
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl<T: ToValue + ?Sized> ToValue for &T {
    fn to_value(&self) -> Value {
        (**self).to_value()
    }
}

macro_rules! to_value_int {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }
            }
        )*
    };
}

macro_rules! to_value_uint {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::UInt(*self as u64)
                }
            }
        )*
    };
}

to_value_int!(i8, i16, i32, i64, isize);
to_value_uint!(u8, u16, u32, u64, usize);

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Double(f64::from(*self))
    }
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Double(*self)
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::String(self.clone())
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::DateTime(*self)
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::String(self.to_string())
    }
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for Document {
    fn to_value(&self) -> Value {
        Value::Document(self.clone())
    }
}

impl ToValue for RawDocument {
    fn to_value(&self) -> Value {
        Value::Raw(self.clone())
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(value) => value.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for [T] {
    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for BTreeMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Document(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

impl<T: ToValue> ToValue for HashMap<String, T> {
    fn to_value(&self) -> Value {
        Value::Document(self.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
    }
}

impl ToValue for serde_json::Value {
    fn to_value(&self) -> Value {
        match self {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::UInt(u)
                } else {
                    Value::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(ToValue::to_value).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Document(map.iter().map(|(k, v)| (k.clone(), v.to_value())).collect())
            }
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        value.to_value()
    }
}
