//! Update document construction
//!
//! Builds a differential update document from an arbitrary input: a record,
//! a string-keyed mapping, a raw pre-encoded document, or a value carrying a
//! custom representation hook. Fields annotated `omitempty` whose value is
//! zero are scheduled for removal (`$unset`); everything else is assigned
//! (`$set`). The reserved identity key is never included in either half.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Field, Record};
use crate::schema::{self, SchemaError};
use crate::value::{Document, RawDocument, ToValue, Value};

/// The reserved document key identifying a document's persistent identity.
/// It can never be changed by an update operation and is dropped from both
/// halves of the result.
pub const ID_KEY: &str = "_id";

/// A document update operation: fields to assign and fields to remove.
///
/// When serialized and handed to a document store's update operation, it
/// sets everything in `set` and unsets everything in `unset`. Both halves
/// are always initialized, so a no-op update is an `Update` with two empty
/// documents, not a missing one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Update {
    /// Fields to be set, keyed by document key.
    #[serde(rename = "$set", default, skip_serializing_if = "Document::is_empty")]
    pub set: Document,

    /// Fields to be unset, keyed by document key. The values are ignored.
    #[serde(rename = "$unset", default, skip_serializing_if = "Document::is_empty")]
    pub unset: Document,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether applying this update would change nothing.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}

/// Error building an update document.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// The input's record type is malformed (bad tag, duplicate key, ...).
    #[error("invalid record type: {0}")]
    Schema(#[from] SchemaError),

    /// An inline map entry collides with a statically declared field key.
    #[error("cannot have key {key:?} in inline map; conflicts with a declared field")]
    InlineKeyConflict { key: String },

    /// The input cannot be encoded as a document root.
    #[error("cannot marshal value: {0}")]
    Marshal(String),

    /// A raw document could not be decoded.
    #[error("cannot decode document: {0}")]
    Decode(String),

    /// A custom representation hook failed.
    #[error("custom representation failed: {0}")]
    Representation(anyhow::Error),
}

/// A borrowed input to [`as_update`], classified once up front.
pub enum Input<'a> {
    /// Anything already expressible as a value: mappings, raw documents,
    /// scalars headed for the codec fallback.
    Value(Value),
    /// A record introspected through its descriptor.
    Record(&'a dyn Record),
    /// A value that supplies its own representation.
    Custom(&'a dyn Represent),
}

/// What a custom representation hook resolves to. `Custom` chains.
pub enum Repr {
    Value(Value),
    Record(Box<dyn Record>),
    Custom(Box<dyn Represent>),
}

/// A value that supplies an alternate representation to store in its place.
/// The builder re-applies resolution to whatever it returns, so hooks chain.
pub trait Represent {
    fn representation(&self) -> anyhow::Result<Repr>;
}

/// Classification of a caller value into an [`Input`].
pub trait ToInput {
    fn to_input(&self) -> Input<'_>;
}

impl<T: ToInput + ?Sized> ToInput for &T {
    fn to_input(&self) -> Input<'_> {
        (**self).to_input()
    }
}

impl<T: ToInput + ?Sized> ToInput for Box<T> {
    fn to_input(&self) -> Input<'_> {
        (**self).to_input()
    }
}

/// `None` plays the role of the absent reference: it resolves to `Null`
/// and fails the document-root check downstream. Callers wanting hook
/// semantics on an absent value wrap the optional in their own nilable
/// type and implement [`ToInput`] and [`Represent`] on that.
impl<T: ToInput> ToInput for Option<T> {
    fn to_input(&self) -> Input<'_> {
        match self {
            Some(value) => value.to_input(),
            None => Input::Value(Value::Null),
        }
    }
}

macro_rules! value_input {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToInput for $ty {
                fn to_input(&self) -> Input<'_> {
                    Input::Value(self.to_value())
                }
            }
        )*
    };
}

value_input!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String,
    str, DateTime<Utc>, Uuid, Document, RawDocument, Value, serde_json::Value,
);

impl<T: ToValue> ToInput for Vec<T> {
    fn to_input(&self) -> Input<'_> {
        Input::Value(self.to_value())
    }
}

impl<T: ToValue> ToInput for BTreeMap<String, T> {
    fn to_input(&self) -> Input<'_> {
        Input::Value(self.to_value())
    }
}

impl<T: ToValue> ToInput for HashMap<String, T> {
    fn to_input(&self) -> Input<'_> {
        Input::Value(self.to_value())
    }
}

/// Build an update document from `value`.
///
/// The value is first resolved: custom representation hooks are invoked and
/// their results resolved again until a concrete value remains. Records are
/// partitioned field by field into `set` and `unset` according to their
/// descriptor; mappings go wholesale into `set`; raw documents are decoded
/// first; anything else must round-trip through the codec as a document
/// root or the call fails with a marshal error.
///
/// On success both halves are present (possibly empty) and their key sets
/// are disjoint; the identity key appears in neither.
pub fn as_update<T>(value: &T) -> Result<Update, UpdateError>
where
    T: ToInput + ?Sized,
{
    from_input(value.to_input())
}

fn from_input(input: Input<'_>) -> Result<Update, UpdateError> {
    match input {
        Input::Custom(hook) => {
            let repr = hook.representation().map_err(UpdateError::Representation)?;
            from_repr(repr)
        }
        Input::Record(record) => record_as_update(record),
        Input::Value(value) => value_as_update(value),
    }
}

fn from_repr(repr: Repr) -> Result<Update, UpdateError> {
    match repr {
        Repr::Custom(hook) => {
            let next = hook.representation().map_err(UpdateError::Representation)?;
            from_repr(next)
        }
        Repr::Record(record) => record_as_update(record.as_ref()),
        Repr::Value(value) => value_as_update(value),
    }
}

fn record_as_update(record: &dyn Record) -> Result<Update, UpdateError> {
    let info = schema::describe(record.raw_schema_dyn())?;
    let mut update = Update::new();

    if let Some(path) = &info.inline_map {
        if let Field::Map(extra) = field_by_path(record, path) {
            for (key, value) in extra {
                if info.by_key.contains_key(key) {
                    return Err(UpdateError::InlineKeyConflict { key: key.clone() });
                }
                if key.as_str() != ID_KEY {
                    update.set.insert(key.clone(), value.clone());
                }
            }
        }
    }

    for field_info in &info.fields {
        if field_info.key == ID_KEY {
            continue;
        }
        let field = if field_info.inline.is_empty() {
            record.field(field_info.ordinal)
        } else {
            field_by_path(record, &field_info.inline)
        };
        if field_info.omit_empty && field.is_zero() {
            update.unset.insert(field_info.key.clone(), Value::Null);
        } else {
            update.set.insert(field_info.key.clone(), field_value(field)?);
        }
    }

    Ok(update)
}

fn value_as_update(value: Value) -> Result<Update, UpdateError> {
    match value {
        Value::Document(doc) => Ok(map_as_update(doc)),
        Value::Raw(raw) => {
            let doc: Document = rmp_serde::from_slice(raw.bytes())
                .map_err(|err| UpdateError::Decode(err.to_string()))?;
            Ok(map_as_update(doc))
        }
        other => {
            tracing::debug!(kind = other.kind(), "routing value through codec fallback");
            let bytes = rmp_serde::to_vec_named(&other)
                .map_err(|err| UpdateError::Marshal(err.to_string()))?;
            let doc: Document = rmp_serde::from_slice(&bytes).map_err(|_| {
                UpdateError::Marshal(format!("{} is not a document root", other.kind()))
            })?;
            Ok(map_as_update(doc))
        }
    }
}

fn map_as_update(doc: Document) -> Update {
    let mut update = Update::new();
    for (key, value) in doc {
        if key != ID_KEY {
            update.set.insert(key, value);
        }
    }
    update
}

/// Marshal a record into a plain document: `omitempty` fields with zero
/// values are elided, inline sub-records are spliced, and the inline map
/// (if any) is merged after a conflict check. Unlike [`as_update`], the
/// identity key is kept; this is the form a nested record takes inside a
/// `$set` assignment.
pub fn record_to_document(record: &dyn Record) -> Result<Document, UpdateError> {
    let info = schema::describe(record.raw_schema_dyn())?;
    let mut doc = Document::new();

    for field_info in &info.fields {
        let field = if field_info.inline.is_empty() {
            record.field(field_info.ordinal)
        } else {
            field_by_path(record, &field_info.inline)
        };
        if field_info.omit_empty && field.is_zero() {
            continue;
        }
        doc.insert(field_info.key.clone(), field_value(field)?);
    }

    if let Some(path) = &info.inline_map {
        if let Field::Map(extra) = field_by_path(record, path) {
            for (key, value) in extra {
                if info.by_key.contains_key(key) {
                    return Err(UpdateError::InlineKeyConflict { key: key.clone() });
                }
                doc.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(doc)
}

fn field_value(field: Field<'_>) -> Result<Value, UpdateError> {
    match field {
        Field::Value(value) => Ok(value),
        Field::Map(doc) => Ok(Value::Document(doc.clone())),
        Field::Record(record) => Ok(Value::Document(record_to_document(record)?)),
    }
}

/// Walk an inline access path. Every step but the last traverses a nested
/// record; the descriptor guarantees the path shape.
fn field_by_path<'a>(record: &'a dyn Record, path: &[usize]) -> Field<'a> {
    let (last, rest) = path.split_last().expect("field path is never empty");
    let mut current: &'a dyn Record = record;
    for &ordinal in rest {
        match current.field(ordinal) {
            Field::Record(inner) => current = inner,
            _ => unreachable!("descriptor path traverses a non-record field"),
        }
    }
    current.field(*last)
}
