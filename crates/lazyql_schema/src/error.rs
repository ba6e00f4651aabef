//! Schema errors.

use thiserror::Error;

/// An error raised while loading or validating a schema.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema document is not valid JSON or does not have the expected shape.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),

    /// A field refers to a type that is neither a scalar/enum nor an object or union.
    #[error("GraphQL Type not found: {type_name} (declared by `{owner}.{field}`)")]
    UnknownType {
        owner: String,
        field: String,
        type_name: String,
    },
}
