//! Typed errors for the lazyql runtime.
//!
//! Every failure carries a typed [`ErrorCode`] and the name of the operation that raised it.

use lazyql_schema::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Invalid input
    InvalidProxy,
    InvalidFunction,
    InvalidArguments,
    InvalidAssignment,
    InvalidUnion,

    // Schema consistency
    TypeNotFound,
    SchemaError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidProxy => "INVALID_PROXY",
            Self::InvalidFunction => "INVALID_FUNCTION",
            Self::InvalidArguments => "INVALID_ARGUMENTS",
            Self::InvalidAssignment => "INVALID_ASSIGNMENT",
            Self::InvalidUnion => "INVALID_UNION",
            Self::TypeNotFound => "TYPE_NOT_FOUND",
            Self::SchemaError => "SCHEMA_ERROR",
        }
    }

    /// Returns true if the caller passed something the runtime cannot use.
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidProxy
                | Self::InvalidFunction
                | Self::InvalidArguments
                | Self::InvalidAssignment
                | Self::InvalidUnion
        )
    }

    /// Returns true if generated code and the schema disagree.
    pub const fn is_schema_error(&self) -> bool {
        matches!(self, Self::TypeNotFound | Self::SchemaError)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A runtime error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{code}] {message}")]
pub struct ClientError {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// The operation that raised the error.
    pub caller: &'static str,
}

impl ClientError {
    /// Creates a new error.
    pub fn new(code: ErrorCode, message: impl Into<String>, caller: &'static str) -> Self {
        Self {
            code,
            message: message.into(),
            caller,
        }
    }

    // Convenience constructors

    /// A value was passed where an accessor was required.
    pub fn invalid_proxy(message: impl Into<String>, caller: &'static str) -> Self {
        Self::new(ErrorCode::InvalidProxy, message, caller)
    }

    /// A value was passed where a callable field was required.
    pub fn invalid_function(caller: &'static str) -> Self {
        Self::new(ErrorCode::InvalidFunction, "Invalid lazyql function", caller)
    }

    /// Field arguments were not an object.
    pub fn invalid_arguments(type_name: &str, caller: &'static str) -> Self {
        Self::new(
            ErrorCode::InvalidArguments,
            format!("Invalid arguments of type: {type_name}"),
            caller,
        )
    }

    /// A write targeted a field the type does not declare.
    pub fn invalid_assignment(key: impl fmt::Display, caller: &'static str) -> Self {
        Self::new(
            ErrorCode::InvalidAssignment,
            format!("Invalid proxy assignation: {key}"),
            caller,
        )
    }

    /// The concrete type of a union could not be determined.
    pub fn invalid_union(union: &str, key: &str, caller: &'static str) -> Self {
        Self::new(
            ErrorCode::InvalidUnion,
            format!("Invalid Union! Cannot resolve the concrete type of `{union}` to read `{key}`"),
            caller,
        )
    }

    /// A field type is neither a scalar nor a known object or union.
    pub fn type_not_found<'a>(
        type_name: &str,
        available: impl IntoIterator<Item = &'a str>,
        caller: &'static str,
    ) -> Self {
        let available: Vec<&str> = available.into_iter().collect();
        Self::new(
            ErrorCode::TypeNotFound,
            format!(
                "GraphQL Type not found: {type_name}, available fields: \"{}\"",
                available.join(" | ")
            ),
            caller,
        )
    }

    /// Returns true if this is an invalid-input error.
    pub fn is_input_error(&self) -> bool {
        self.code.is_input_error()
    }

    /// Returns true if this is a schema-consistency error.
    pub fn is_schema_error(&self) -> bool {
        self.code.is_schema_error()
    }
}

impl From<SchemaError> for ClientError {
    fn from(err: SchemaError) -> Self {
        Self::new(ErrorCode::SchemaError, err.to_string(), "schema")
    }
}

impl Serialize for ClientError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("ClientError", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        state.serialize_field("caller", self.caller)?;
        state.end()
    }
}

/// Type alias for runtime results.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::InvalidProxy.is_input_error());
        assert!(ErrorCode::InvalidUnion.is_input_error());
        assert!(!ErrorCode::TypeNotFound.is_input_error());

        assert!(ErrorCode::TypeNotFound.is_schema_error());
        assert!(!ErrorCode::InvalidArguments.is_schema_error());
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::invalid_arguments("string", "set_cache");
        assert_eq!(
            err.to_string(),
            "[INVALID_ARGUMENTS] Invalid arguments of type: string"
        );
        assert_eq!(err.caller, "set_cache");

        let err = ClientError::type_not_found("Ghost", ["id", "name"], "ObjectAccessor::get");
        assert_eq!(
            err.message,
            "GraphQL Type not found: Ghost, available fields: \"id | name\""
        );
    }

    #[test]
    fn test_error_serialization() {
        let err = ClientError::invalid_proxy("Invalid source proxy", "assign_selections");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("INVALID_PROXY"));
        assert!(json.contains("assign_selections"));
    }

    #[test]
    fn test_from_schema_error() {
        let schema_err = SchemaError::UnknownType {
            owner: "User".into(),
            field: "pet".into(),
            type_name: "Pet".into(),
        };
        let err = ClientError::from(schema_err);
        assert_eq!(err.code, ErrorCode::SchemaError);
        assert!(err.message.contains("Pet"));
    }
}
