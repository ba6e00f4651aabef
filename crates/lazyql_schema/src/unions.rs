//! Union and interface index.
//!
//! Built once per schema. For every union it records the member object types, the combined
//! field set of all members and, per field, which members declare it.

use crate::schema::{FieldType, ObjectType, Schema};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Members declaring one field of a union.
#[derive(Debug, Clone, Default)]
pub struct UnionField {
    /// Names of the member types that declare the field.
    pub types_names: Vec<String>,
    /// Field maps of those members, merged.
    pub combined_types: IndexMap<String, FieldType>,
}

/// An indexed union or interface.
#[derive(Debug, Clone)]
pub struct SchemaUnion {
    pub name: String,
    /// Member object types, keyed by type name.
    pub types: IndexMap<String, ObjectType>,
    pub fields_map: IndexMap<String, UnionField>,
    /// Field maps of all members, merged.
    pub combined_types: IndexMap<String, FieldType>,
    fields: IndexSet<String>,
}

impl SchemaUnion {
    fn build(name: &str, members: &[String], schema: &Schema) -> Self {
        let mut types = IndexMap::new();
        let mut fields_map: IndexMap<String, UnionField> = IndexMap::new();
        let mut combined_types = IndexMap::new();
        let mut fields = IndexSet::new();

        for member in members {
            // Members without an object type are tolerated.
            let Some(object) = schema.object(member) else {
                continue;
            };

            for field_name in object.field_names() {
                let entry = fields_map.entry(field_name.to_string()).or_default();
                entry.types_names.push(member.clone());
                entry.combined_types.extend(
                    object
                        .fields
                        .iter()
                        .map(|(name, ty)| (name.clone(), ty.clone())),
                );
                fields.insert(field_name.to_string());
            }
            combined_types.extend(
                object
                    .fields
                    .iter()
                    .map(|(name, ty)| (name.clone(), ty.clone())),
            );
            types.insert(member.clone(), object.clone());
        }

        Self {
            name: name.to_string(),
            types,
            fields_map,
            combined_types,
            fields,
        }
    }

    /// Returns true if any member declares the field.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains(name)
    }

    /// Returns true if the type is a member.
    pub fn has_member(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    /// Gets a member object type.
    pub fn member(&self, type_name: &str) -> Option<&ObjectType> {
        self.types.get(type_name)
    }

    /// Gets the members declaring a field.
    pub fn field(&self, name: &str) -> Option<&UnionField> {
        self.fields_map.get(name)
    }

    /// Returns the field names exposed by the union, in first-seen order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

/// The union index of a schema.
#[derive(Debug, Clone, Default)]
pub struct SchemaUnions {
    unions: IndexMap<String, Arc<SchemaUnion>>,
    /// Member type name to the union context used by selections made under that type.
    selection_groups: FxHashMap<String, Arc<[String]>>,
}

impl SchemaUnions {
    /// Indexes every union of the schema.
    pub fn new(schema: &Schema) -> Self {
        let mut selection_groups: FxHashMap<String, Arc<[String]>> = FxHashMap::default();
        let unions = schema
            .unions
            .iter()
            .map(|(name, members)| {
                for member in members {
                    selection_groups
                        .entry(member.clone())
                        .or_insert_with(|| Arc::from(vec![member.clone()]));
                }
                (
                    name.clone(),
                    Arc::new(SchemaUnion::build(name, members, schema)),
                )
            })
            .collect();

        Self {
            unions,
            selection_groups,
        }
    }

    /// Gets a union by name.
    pub fn get(&self, name: &str) -> Option<&Arc<SchemaUnion>> {
        self.unions.get(name)
    }

    /// Returns the union context for selections made under a member type.
    ///
    /// Known members always get the same shared group.
    pub fn selection_group(&self, type_name: &str) -> Arc<[String]> {
        self.selection_groups
            .get(type_name)
            .cloned()
            .unwrap_or_else(|| Arc::from(vec![type_name.to_string()]))
    }

    /// Returns the number of indexed unions.
    pub fn len(&self) -> usize {
        self.unions.len()
    }

    /// Returns true if the schema declares no union.
    pub fn is_empty(&self) -> bool {
        self.unions.is_empty()
    }

    /// Iterates over the indexed unions.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<SchemaUnion>)> {
        self.unions.iter().map(|(name, union)| (name.as_str(), union))
    }
}
