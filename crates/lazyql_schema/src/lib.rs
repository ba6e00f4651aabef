//! Schema model for lazyql.
//!
//! This crate describes the generated schema the runtime navigates:
//! - `schema`: Object types, field type strings, the scalar/enum index and the schema builder
//! - `unions`: The per-schema union/interface index
//! - `error`: Schema loading and validation errors

pub mod error;
pub mod schema;
pub mod unions;

pub use error::SchemaError;
pub use schema::{
    FieldType, ObjectType, ParsedType, Schema, SchemaBuilder, SchemaNode, TYPENAME_FIELD,
    UNION_PREFIX,
};
pub use unions::{SchemaUnion, SchemaUnions, UnionField};
