//! Document Update SDK - differential update documents for document stores
//!
//! Takes a complete, partially-populated value and computes the minimal
//! structural diff against its empty representation, as a two-part update
//! document (`$set` / `$unset`) ready for a document-oriented update
//! operation.
//!
//! Provides:
//! - Update construction from records, string-keyed mappings and raw
//!   pre-encoded documents (`as_update`)
//! - Tag-driven field mapping (`key,omitempty,minsize,inline`, `-`) with a
//!   process-wide cached introspector
//! - Zero-value classification deciding assignment vs removal
//! - Custom representation hooks (`Represent`) resolved and chained before
//!   dispatch
//!
//! ```
//! use document_update_sdk::{as_update, record};
//!
//! record! {
//!     #[derive(Debug, Default)]
//!     pub struct Account {
//!         pub id: String => "_id",
//!         pub owner: String,
//!         pub balance: i64 => "balance,omitempty",
//!     }
//! }
//!
//! let account = Account { id: "a-1".into(), owner: "alice".into(), balance: 0 };
//! let update = as_update(&account).unwrap();
//! assert!(update.set.contains_key("owner"));
//! assert!(update.unset.contains_key("balance"));
//! assert!(!update.set.contains_key("_id"));
//! ```

pub mod record;
pub mod schema;
pub mod update;
pub mod value;

// Re-export commonly used types
pub use record::{Field, IntoField, Record, is_zero_record};
pub use schema::{FieldInfo, FieldKind, FieldSpec, RawSchema, SchemaError, StructInfo, describe};
pub use update::{
    ID_KEY, Input, Repr, Represent, ToInput, Update, UpdateError, as_update, record_to_document,
};
pub use value::{Document, RawDocument, ToValue, Value};
