//! Record type introspection
//!
//! Turns the static metadata a record type carries (field names, annotation
//! tags, structural kinds) into a cached [`StructInfo`] describing how the
//! record maps onto a document: one document key per field, omission policy,
//! and access paths through inlined sub-records.
//!
//! Descriptors are built once per type and cached for the lifetime of the
//! process. Construction happens off-cache; readers either miss or see a
//! fully built descriptor.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

/// Metadata a record type supplies about itself, before tag parsing.
///
/// The indirection through `fn()` for nested schemas keeps the metadata
/// representable even when record types reference each other.
#[derive(Debug)]
pub struct RawSchema {
    /// Short type name, used in error messages.
    pub type_name: &'static str,
    /// Identity of the described type, used as the cache key.
    pub type_id: fn() -> TypeId,
    /// Declared fields, in declaration order.
    pub fields: &'static [FieldSpec],
}

/// One declared field: its name, its annotation tag, and its structural kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Delimited annotation string: `key,flag1,flag2,...`, possibly empty.
    pub tag: &'static str,
    pub kind: FieldKind,
}

/// How a field participates in the document structure.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// A leaf converted directly into a value.
    Value,
    /// A string-keyed document, eligible for inlining.
    Map,
    /// A nested record, eligible for inlining; carries its schema.
    Record(fn() -> &'static RawSchema),
}

/// Parsed descriptor of one document field.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Document key the field is stored under.
    pub key: String,
    /// Ordinal of the field within its declaring record.
    pub ordinal: usize,
    /// Schedule the field for removal when its value is zero.
    pub omit_empty: bool,
    /// Carried through for encoders that minimize numeric storage.
    pub min_size: bool,
    /// Access path through inlined sub-records; empty for direct fields.
    pub inline: Vec<usize>,
}

/// Parsed descriptor of a record type.
#[derive(Debug, Clone)]
pub struct StructInfo {
    pub type_name: &'static str,
    /// Fields in declaration order, inlined sub-record fields spliced in.
    pub fields: Vec<FieldInfo>,
    /// Document key to index into `fields`.
    pub by_key: HashMap<String, usize>,
    /// Access path to the single inline map field, if any.
    pub inline_map: Option<Vec<usize>>,
}

/// Error building a record descriptor. These indicate a malformed record
/// type and are reported at first use of that type.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("unsupported flag {flag:?} in tag {tag:?} of record {type_name}")]
    UnsupportedFlag {
        flag: String,
        tag: String,
        type_name: &'static str,
    },
    #[error("duplicated key {key:?} in record {type_name}")]
    DuplicatedKey {
        key: String,
        type_name: &'static str,
    },
    #[error("multiple inline maps in record {type_name}")]
    MultipleInlineMaps { type_name: &'static str },
    #[error("inline field {field:?} of record {type_name} must be a record or a string-keyed map")]
    InvalidInline {
        field: &'static str,
        type_name: &'static str,
    },
    #[error("record {type_name} inlines itself, directly or through a cycle")]
    InlineCycle { type_name: &'static str },
}

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<StructInfo>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Describe a record type, building and caching its descriptor on first use.
pub fn describe(raw: &'static RawSchema) -> Result<Arc<StructInfo>, SchemaError> {
    describe_inner(raw, &mut Vec::new())
}

fn describe_inner(
    raw: &'static RawSchema,
    visiting: &mut Vec<TypeId>,
) -> Result<Arc<StructInfo>, SchemaError> {
    let id = (raw.type_id)();
    if let Some(info) = DESCRIPTORS
        .read()
        .expect("descriptor cache poisoned")
        .get(&id)
    {
        return Ok(info.clone());
    }
    if visiting.contains(&id) {
        return Err(SchemaError::InlineCycle {
            type_name: raw.type_name,
        });
    }
    tracing::debug!(record = raw.type_name, "building record descriptor");
    visiting.push(id);
    let built = build(raw, visiting);
    visiting.pop();
    let info = Arc::new(built?);
    let mut cache = DESCRIPTORS.write().expect("descriptor cache poisoned");
    Ok(cache.entry(id).or_insert(info).clone())
}

fn build(raw: &'static RawSchema, visiting: &mut Vec<TypeId>) -> Result<StructInfo, SchemaError> {
    let mut fields: Vec<FieldInfo> = Vec::with_capacity(raw.fields.len());
    let mut by_key: HashMap<String, usize> = HashMap::new();
    let mut inline_map: Option<Vec<usize>> = None;

    for (ordinal, spec) in raw.fields.iter().enumerate() {
        let Some(tag) = parse_tag(spec.tag, raw.type_name)? else {
            continue;
        };

        if tag.inline {
            match spec.kind {
                FieldKind::Map => {
                    if inline_map.is_some() {
                        return Err(SchemaError::MultipleInlineMaps {
                            type_name: raw.type_name,
                        });
                    }
                    inline_map = Some(vec![ordinal]);
                }
                FieldKind::Record(nested) => {
                    let inner = describe_inner(nested(), visiting)?;
                    if let Some(path) = &inner.inline_map {
                        if inline_map.is_some() {
                            return Err(SchemaError::MultipleInlineMaps {
                                type_name: raw.type_name,
                            });
                        }
                        let mut full = Vec::with_capacity(path.len() + 1);
                        full.push(ordinal);
                        full.extend_from_slice(path);
                        inline_map = Some(full);
                    }
                    for inner_field in &inner.fields {
                        if by_key.contains_key(&inner_field.key) {
                            return Err(SchemaError::DuplicatedKey {
                                key: inner_field.key.clone(),
                                type_name: raw.type_name,
                            });
                        }
                        let mut spliced = inner_field.clone();
                        let mut full = Vec::with_capacity(spliced.inline.len() + 2);
                        full.push(ordinal);
                        if spliced.inline.is_empty() {
                            full.push(spliced.ordinal);
                        } else {
                            full.extend_from_slice(&spliced.inline);
                        }
                        spliced.inline = full;
                        by_key.insert(spliced.key.clone(), fields.len());
                        fields.push(spliced);
                    }
                }
                FieldKind::Value => {
                    return Err(SchemaError::InvalidInline {
                        field: spec.name,
                        type_name: raw.type_name,
                    });
                }
            }
            continue;
        }

        let key = if tag.key.is_empty() {
            spec.name.to_lowercase()
        } else {
            tag.key
        };
        if by_key.contains_key(&key) {
            return Err(SchemaError::DuplicatedKey {
                key,
                type_name: raw.type_name,
            });
        }
        by_key.insert(key.clone(), fields.len());
        fields.push(FieldInfo {
            key,
            ordinal,
            omit_empty: tag.omit_empty,
            min_size: tag.min_size,
            inline: Vec::new(),
        });
    }

    Ok(StructInfo {
        type_name: raw.type_name,
        fields,
        by_key,
        inline_map,
    })
}

#[derive(Debug)]
struct ParsedTag {
    key: String,
    omit_empty: bool,
    min_size: bool,
    inline: bool,
}

/// Parse a field tag. `Ok(None)` means the field is excluded (`-`).
fn parse_tag(tag: &'static str, type_name: &'static str) -> Result<Option<ParsedTag>, SchemaError> {
    if tag == "-" {
        return Ok(None);
    }
    let mut parts = tag.split(',');
    let mut parsed = ParsedTag {
        key: parts.next().unwrap_or("").to_string(),
        omit_empty: false,
        min_size: false,
        inline: false,
    };
    for flag in parts {
        match flag {
            "omitempty" => parsed.omit_empty = true,
            "minsize" => parsed.min_size = true,
            "inline" => parsed.inline = true,
            other => {
                return Err(SchemaError::UnsupportedFlag {
                    flag: other.to_string(),
                    tag: tag.to_string(),
                    type_name,
                });
            }
        }
    }
    Ok(Some(parsed))
}
