//! Schema definition for lazyql.
//!
//! The schema is the generated, static description of the GraphQL API: for every object type a
//! map from field name to a GraphQL type string (`"String"`, `"[User!]!"`, `"$SearchResult"`)
//! and optional argument types, the union/interface membership table and the scalar/enum index.

use crate::error::SchemaError;
use indexmap::{IndexMap, IndexSet};
use lazyql_core::{ArgTypes, SelectionType};
use serde::{Deserialize, Serialize};

const BUILTIN_SCALARS: [&str; 5] = ["Int", "Float", "String", "Boolean", "ID"];

/// Prefix marking a union or interface reference in a field type string.
pub const UNION_PREFIX: char = '$';

/// Field name every object type exposes.
pub const TYPENAME_FIELD: &str = "__typename";

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldType {
    /// GraphQL type string.
    #[serde(rename = "__type")]
    pub ty: String,

    /// Argument types, present when the field accepts arguments.
    #[serde(rename = "__args", default, skip_serializing_if = "Option::is_none")]
    pub args: Option<ArgTypes>,
}

impl FieldType {
    /// Creates a field type without arguments.
    pub fn new(ty: impl Into<String>) -> Self {
        Self {
            ty: ty.into(),
            args: None,
        }
    }

    /// Sets the argument types.
    pub fn with_args<K, V>(mut self, args: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.args = Some(
            args.into_iter()
                .map(|(name, ty)| (name.into(), ty.into()))
                .collect(),
        );
        self
    }

    /// Parses the type string.
    pub fn parsed(&self) -> ParsedType {
        ParsedType::parse(&self.ty)
    }
}

/// A type string split into its named type and wrappers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    /// The named type, without list or non-null wrappers.
    pub pure_type: String,
    pub is_nullable: bool,
    pub is_array: bool,
    pub nullable_items: bool,
}

impl ParsedType {
    /// Parses a type string such as `"[User!]!"`.
    ///
    /// Only one list level is unwrapped.
    pub fn parse(ty: &str) -> Self {
        let mut rest = ty.trim();
        let mut is_nullable = true;
        let mut is_array = false;
        let mut nullable_items = true;

        if let Some(inner) = rest.strip_suffix('!') {
            is_nullable = false;
            rest = inner;
        }

        if let Some(inner) = rest.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            is_array = true;
            rest = inner;
            if let Some(inner) = rest.strip_suffix('!') {
                nullable_items = false;
                rest = inner;
            }
        }

        Self {
            pure_type: rest.to_string(),
            is_nullable,
            is_array,
            nullable_items,
        }
    }
}

/// An object type: its fields and their declared types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectType {
    pub fields: IndexMap<String, FieldType>,
}

impl ObjectType {
    /// Creates an object type with no fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field without arguments.
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.fields.insert(name.into(), FieldType::new(ty));
        self
    }

    /// Adds a field that accepts arguments.
    pub fn field_with_args<K, V>(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        args: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.fields
            .insert(name.into(), FieldType::new(ty).with_args(args));
        self
    }

    /// Gets a field by name.
    pub fn get(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    /// Returns true if the field is declared.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Returns the declared field names, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

/// A schema type an accessor can be bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaNode {
    Object(String),
    Union(String),
}

impl SchemaNode {
    /// Returns the type name.
    pub fn name(&self) -> &str {
        match self {
            Self::Object(name) | Self::Union(name) => name,
        }
    }

    /// Returns true for unions and interfaces.
    pub fn is_union(&self) -> bool {
        matches!(self, Self::Union(_))
    }
}

/// A generated GraphQL schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default = "default_query_type")]
    pub query_type: String,
    #[serde(default = "default_mutation_type")]
    pub mutation_type: String,
    #[serde(default = "default_subscription_type")]
    pub subscription_type: String,

    /// Object types (including interfaces), keyed by type name.
    #[serde(default)]
    pub types: IndexMap<String, ObjectType>,

    /// Union and interface members, keyed by union name.
    #[serde(default)]
    pub unions: IndexMap<String, Vec<String>>,

    /// Scalar and enum type names.
    #[serde(default)]
    pub scalars: IndexSet<String>,
}

fn default_query_type() -> String {
    "Query".to_string()
}

fn default_mutation_type() -> String {
    "Mutation".to_string()
}

fn default_subscription_type() -> String {
    "Subscription".to_string()
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    /// Creates a schema with the built-in scalars and empty root types.
    pub fn new() -> Self {
        let mut schema = Self {
            query_type: default_query_type(),
            mutation_type: default_mutation_type(),
            subscription_type: default_subscription_type(),
            types: IndexMap::new(),
            unions: IndexMap::new(),
            scalars: IndexSet::new(),
        };
        schema.normalize();
        schema
    }

    /// Loads a schema from its JSON document.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let mut schema: Schema = serde_json::from_str(json)?;
        schema.normalize();
        Ok(schema)
    }

    /// Serializes the schema to its JSON document.
    pub fn to_json(&self) -> Result<String, SchemaError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Gets an object type by name.
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.types.get(name)
    }

    /// Returns the root type name of an operation type.
    pub fn root_type(&self, kind: SelectionType) -> &str {
        match kind {
            SelectionType::Query => &self.query_type,
            SelectionType::Mutation => &self.mutation_type,
            SelectionType::Subscription => &self.subscription_type,
        }
    }

    /// Returns true if the type is a scalar or an enum.
    pub fn is_scalar_or_enum(&self, name: &str) -> bool {
        self.scalars.contains(name)
    }

    /// Returns the members of a union or interface.
    pub fn union_members(&self, name: &str) -> Option<&[String]> {
        self.unions.get(name).map(Vec::as_slice)
    }

    /// Resolves a pure type name to an object type or a union.
    ///
    /// Object types win over unions; a `$`-prefixed name only resolves to a union.
    pub fn resolve_type(&self, pure_type: &str) -> Option<SchemaNode> {
        if self.types.contains_key(pure_type) {
            return Some(SchemaNode::Object(pure_type.to_string()));
        }
        let name = pure_type.strip_prefix(UNION_PREFIX).unwrap_or(pure_type);
        self.unions
            .contains_key(name)
            .then(|| SchemaNode::Union(name.to_string()))
    }

    /// Reports every field whose type cannot be resolved.
    pub fn validate(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        for (owner, object) in &self.types {
            for (field, field_type) in &object.fields {
                let parsed = field_type.parsed();
                if !self.is_scalar_or_enum(&parsed.pure_type)
                    && self.resolve_type(&parsed.pure_type).is_none()
                {
                    errors.push(SchemaError::UnknownType {
                        owner: owner.clone(),
                        field: field.clone(),
                        type_name: parsed.pure_type,
                    });
                }
            }
        }
        errors
    }

    /// Restores the invariants every schema relies on: built-in scalars, root types and
    /// `__typename` on every object type.
    fn normalize(&mut self) {
        for name in BUILTIN_SCALARS {
            self.scalars.insert(name.to_string());
        }
        for root in [
            self.query_type.clone(),
            self.mutation_type.clone(),
            self.subscription_type.clone(),
        ] {
            self.types.entry(root).or_default();
        }
        for object in self.types.values_mut() {
            if !object.has_field(TYPENAME_FIELD) {
                object
                    .fields
                    .insert(TYPENAME_FIELD.to_string(), FieldType::new("String!"));
            }
        }
    }
}

/// Schema builder.
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaBuilder {
    /// Creates a new schema builder with the built-in scalars registered.
    pub fn new() -> Self {
        Self {
            schema: Schema::new(),
        }
    }

    /// Sets the query root type name.
    pub fn query_type(mut self, name: impl Into<String>) -> Self {
        self.schema.query_type = name.into();
        self
    }

    /// Sets the mutation root type name.
    pub fn mutation_type(mut self, name: impl Into<String>) -> Self {
        self.schema.mutation_type = name.into();
        self
    }

    /// Sets the subscription root type name.
    pub fn subscription_type(mut self, name: impl Into<String>) -> Self {
        self.schema.subscription_type = name.into();
        self
    }

    /// Registers a custom scalar.
    pub fn scalar(mut self, name: impl Into<String>) -> Self {
        self.schema.scalars.insert(name.into());
        self
    }

    /// Registers an enum. Enums resolve like scalars.
    pub fn enum_type(self, name: impl Into<String>) -> Self {
        self.scalar(name)
    }

    /// Adds an object type.
    pub fn add_object(mut self, name: impl Into<String>, object: ObjectType) -> Self {
        self.schema.types.insert(name.into(), object);
        self
    }

    /// Adds a union.
    pub fn add_union<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        members: impl IntoIterator<Item = S>,
    ) -> Self {
        self.schema
            .unions
            .insert(name.into(), members.into_iter().map(Into::into).collect());
        self
    }

    /// Adds an interface: an object type holding the shared fields, resolved like a union of
    /// its implementors.
    pub fn add_interface<S: Into<String>>(
        self,
        name: impl Into<String>,
        object: ObjectType,
        implementors: impl IntoIterator<Item = S>,
    ) -> Self {
        let name = name.into();
        self.add_object(name.clone(), object)
            .add_union(name, implementors)
    }

    /// Builds the schema.
    pub fn build(mut self) -> Schema {
        self.schema.normalize();
        self.schema
    }
}
