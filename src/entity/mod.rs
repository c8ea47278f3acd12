//! # Entities
//!
//! The capability interface shared by catalog entities and relational rows,
//! and the serializer that walks it into JSON-ready records.

pub mod schema;
pub mod serializer;
pub mod value;

use std::fmt;

pub use schema::{AttributeDef, EntitySchema, RelationDef, Schema, META_ATTRIBUTES};
pub use serializer::{flatten_includes, to_record};
pub use value::{AttrKind, AttrValue};

/// Result of following a relation attribute
pub enum Related<'a> {
    /// Many-to-one or one-to-one relation
    One(&'a dyn Entity),
    /// One-to-many relation, in backend order
    Many(Vec<&'a dyn Entity>),
    /// Relation not loaded or not set
    Absent,
}

/// An entity record returned by a backend
pub trait Entity: fmt::Debug + Send + Sync {
    /// Backend name of the entity type (e.g. `Dataset` or `DATASET`)
    fn entity_name(&self) -> &str;

    /// Scalar attributes declared by the entity type
    fn instance_attributes(&self) -> Vec<&str>;

    /// Bookkeeping attributes (`id`, `createTime`, ...)
    fn meta_attributes(&self) -> Vec<&str>;

    /// Relation attributes, both to-one and to-many
    fn relation_attributes(&self) -> Vec<&str>;

    /// Value of a scalar attribute
    fn get(&self, name: &str) -> Option<&AttrValue>;

    /// Follow a relation attribute
    fn get_related(&self, name: &str) -> Related<'_>;
}
