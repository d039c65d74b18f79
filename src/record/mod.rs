//! Record trait and field access
//!
//! A record is a struct that exposes static schema metadata and ordinal
//! field access, the two things the introspector and the update builder
//! need from it. The [`record!`] macro defines a struct and derives the
//! whole surface from per-field `=> "tag"` annotations.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::schema::{FieldKind, RawSchema};
use crate::value::{Document, RawDocument, ToValue, Value};

/// A struct whose fields map onto document keys.
pub trait Record {
    /// Static metadata for this record type.
    fn raw_schema() -> &'static RawSchema
    where
        Self: Sized;

    /// Object-safe access to the same metadata.
    fn raw_schema_dyn(&self) -> &'static RawSchema;

    /// The value of the field at `ordinal` (declaration order).
    fn field(&self, ordinal: usize) -> Field<'_>;
}

/// A view of one record field, preserving its structural kind.
pub enum Field<'a> {
    /// A leaf, already converted.
    Value(Value),
    /// A string-keyed document field.
    Map(&'a Document),
    /// A nested record field.
    Record(&'a dyn Record),
}

impl Field<'_> {
    /// Zero classification for omission purposes. Nested records are zero
    /// when every declared field is recursively zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Field::Value(value) => value.is_zero(),
            Field::Map(doc) => doc.is_empty(),
            Field::Record(record) => is_zero_record(*record),
        }
    }
}

/// Whether every declared field of `record` is recursively zero.
///
/// This walks the raw field list, not the parsed descriptor, so excluded
/// (`-`) fields still participate, matching the classifier contract.
pub fn is_zero_record(record: &dyn Record) -> bool {
    let schema = record.raw_schema_dyn();
    (0..schema.fields.len()).all(|ordinal| record.field(ordinal).is_zero())
}

/// Conversion of a struct field into a [`Field`] view, with the structural
/// kind the introspector sees for it.
pub trait IntoField {
    /// Structural kind of this field type.
    const KIND: FieldKind;

    fn as_field(&self) -> Field<'_>;
}

macro_rules! value_field {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoField for $ty {
                const KIND: FieldKind = FieldKind::Value;

                fn as_field(&self) -> Field<'_> {
                    Field::Value(self.to_value())
                }
            }
        )*
    };
}

value_field!(
    i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, String,
    DateTime<Utc>, Uuid, RawDocument, Value, serde_json::Value,
);

impl IntoField for &'static str {
    const KIND: FieldKind = FieldKind::Value;

    fn as_field(&self) -> Field<'_> {
        Field::Value(self.to_value())
    }
}

impl<T: ToValue> IntoField for Option<T> {
    const KIND: FieldKind = FieldKind::Value;

    fn as_field(&self) -> Field<'_> {
        Field::Value(self.to_value())
    }
}

impl<T: ToValue> IntoField for Vec<T> {
    const KIND: FieldKind = FieldKind::Value;

    fn as_field(&self) -> Field<'_> {
        Field::Value(self.to_value())
    }
}

impl<T: ToValue> IntoField for BTreeMap<String, T> {
    const KIND: FieldKind = FieldKind::Value;

    fn as_field(&self) -> Field<'_> {
        Field::Value(self.to_value())
    }
}

impl<T: ToValue> IntoField for HashMap<String, T> {
    const KIND: FieldKind = FieldKind::Value;

    fn as_field(&self) -> Field<'_> {
        Field::Value(self.to_value())
    }
}

impl IntoField for Document {
    const KIND: FieldKind = FieldKind::Map;

    fn as_field(&self) -> Field<'_> {
        Field::Map(self)
    }
}

/// Define a record struct.
///
/// Each field may carry a `=> "tag"` annotation with the usual grammar:
/// an optional document key, then flags (`omitempty`, `minsize`, `inline`),
/// or `-` to exclude the field. Without an annotation the document key is
/// the lowercased field name.
///
/// ```
/// use document_update_sdk::record;
///
/// record! {
///     #[derive(Debug, Default)]
///     pub struct Account {
///         pub id: String => "_id",
///         pub owner: String,
///         pub balance: i64 => "balance,omitempty",
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $fname:ident : $fty:ty $(=> $tag:literal)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $fname: $fty,
            )*
        }

        impl $crate::record::Record for $name {
            fn raw_schema() -> &'static $crate::schema::RawSchema {
                static SCHEMA: $crate::schema::RawSchema = $crate::schema::RawSchema {
                    type_name: ::core::stringify!($name),
                    type_id: ::core::any::TypeId::of::<$name>,
                    fields: &[
                        $(
                            $crate::schema::FieldSpec {
                                name: ::core::stringify!($fname),
                                tag: $crate::record!(@tag $($tag)?),
                                kind: <$fty as $crate::record::IntoField>::KIND,
                            },
                        )*
                    ],
                };
                &SCHEMA
            }

            fn raw_schema_dyn(&self) -> &'static $crate::schema::RawSchema {
                <Self as $crate::record::Record>::raw_schema()
            }

            #[allow(unused_assignments, unused_variables, unused_mut)]
            fn field(&self, ordinal: usize) -> $crate::record::Field<'_> {
                let mut index = 0usize;
                $(
                    if ordinal == index {
                        return $crate::record::IntoField::as_field(&self.$fname);
                    }
                    index += 1;
                )*
                ::core::panic!(
                    "record {} has no field ordinal {}",
                    ::core::stringify!($name),
                    ordinal,
                )
            }
        }

        impl $crate::record::IntoField for $name {
            const KIND: $crate::schema::FieldKind =
                $crate::schema::FieldKind::Record(<$name as $crate::record::Record>::raw_schema);

            fn as_field(&self) -> $crate::record::Field<'_> {
                $crate::record::Field::Record(self)
            }
        }

        impl $crate::update::ToInput for $name {
            fn to_input(&self) -> $crate::update::Input<'_> {
                $crate::update::Input::Record(self)
            }
        }
    };
    (@tag $tag:literal) => { $tag };
    (@tag) => { "" };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    crate::record! {
        #[derive(Debug, Default)]
        pub struct Sample {
            pub id: String => "_id",
            pub owner: String,
            pub balance: i64 => "balance,omitempty",
            pub hidden: i64 => "-",
        }
    }

    #[test]
    fn test_macro_schema() {
        let raw = Sample::raw_schema();
        assert_eq!(raw.type_name, "Sample");
        assert_eq!(raw.fields.len(), 4);
        assert_eq!(raw.fields[0].name, "id");
        assert_eq!(raw.fields[0].tag, "_id");
        assert_eq!(raw.fields[1].tag, "");
        assert_eq!(raw.fields[3].tag, "-");
    }

    #[test]
    fn test_macro_field_access() {
        let sample = Sample {
            id: "a1".into(),
            owner: "alice".into(),
            balance: 10,
            hidden: 4,
        };
        assert!(matches!(sample.field(0), Field::Value(Value::String(ref s)) if s == "a1"));
        assert!(matches!(sample.field(2), Field::Value(Value::Int(10))));
        assert!(matches!(sample.field(3), Field::Value(Value::Int(4))));
    }

    #[test]
    #[should_panic(expected = "no field ordinal")]
    fn test_macro_field_out_of_range() {
        let _ = Sample::default().field(9);
    }

    #[test]
    fn test_describe_macro_record() {
        let info = schema::describe(Sample::raw_schema()).unwrap();
        assert_eq!(info.fields.len(), 3);
        assert_eq!(info.fields[0].key, "_id");
        assert_eq!(info.fields[1].key, "owner");
        assert_eq!(info.fields[2].key, "balance");
        assert!(info.fields[2].omit_empty);
    }

    crate::record! {
        #[derive(Debug, Default)]
        pub struct ZeroInner {
            pub a: i64,
            pub b: String,
        }
    }

    crate::record! {
        #[derive(Debug, Default)]
        pub struct ZeroOuter {
            pub n: i64,
            pub inner: ZeroInner,
        }
    }

    #[test]
    fn test_record_zero_recurses() {
        let mut outer = ZeroOuter::default();
        assert!(is_zero_record(&outer));
        outer.inner.b = "x".into();
        assert!(!is_zero_record(&outer));
        assert!(matches!(outer.field(1), Field::Record(_)));
    }
}
