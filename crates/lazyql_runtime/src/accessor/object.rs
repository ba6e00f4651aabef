//! Object and union accessors.

use super::AccessorCore;
use crate::error::{ClientError, ClientResult};
use crate::value::{Data, FieldValue};
use lazyql_core::{ArgTypes, ArgValues, Selection, SelectionSpec, SelectionType};
use lazyql_schema::{FieldType, SchemaNode, SchemaUnion, TYPENAME_FIELD};
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// An accessor over an object type or a union.
#[derive(Clone)]
pub struct ObjectAccessor {
    pub(crate) core: Rc<AccessorCore>,
}

impl ObjectAccessor {
    /// Reads a field.
    ///
    /// Scalars resolve from the cache, or to `Undefined` (an empty list for list fields) while
    /// their selection is enqueued for fetching. Object and list fields resolve to child
    /// accessors, fields taking arguments to a [`FieldFn`]. Keys the type does not declare
    /// resolve to `Undefined`, except member type names on a union, which narrow to that member.
    pub fn get(&self, key: &str) -> ClientResult<FieldValue> {
        match &self.core.node {
            SchemaNode::Union(name) => self.get_union_field(name, key),
            SchemaNode::Object(name) => {
                let state = &self.core.state;
                let Some(object) = state.schema.object(name) else {
                    return Err(ClientError::type_not_found(
                        name,
                        std::iter::empty(),
                        "ObjectAccessor::get",
                    ));
                };
                let Some(field_type) = object.get(key) else {
                    return Ok(FieldValue::Undefined);
                };
                if field_type.args.is_some() {
                    return Ok(FieldValue::Callable(FieldFn {
                        owner: self.clone(),
                        key: key.to_string(),
                        field_type: field_type.clone(),
                    }));
                }
                let field_type = field_type.clone();
                self.resolve(key, &field_type, None)
            }
        }
    }

    /// Writes a field into the cache and emits a cache change event.
    pub fn set(&self, key: &str, data: impl Into<Data>) -> ClientResult<()> {
        let core = &self.core;
        let state = &core.state;
        let declared = match &core.node {
            SchemaNode::Object(name) => state
                .schema
                .object(name)
                .is_some_and(|object| object.has_field(key)),
            SchemaNode::Union(name) => state
                .unions
                .get(name)
                .is_some_and(|union| union.has_field(key)),
        };
        if !declared {
            return Err(ClientError::invalid_assignment(key, "ObjectAccessor::set"));
        }

        let selection = state.selections.get_selection(
            SelectionSpec::child(key, &core.selection).with_unions(core.unions.clone()),
        );
        let data = data.into().flatten();
        state.write(&selection, data);
        Ok(())
    }

    /// Narrows a union accessor to one of its member types.
    ///
    /// Returns `None` if the type is not a member, or if `null` is cached.
    pub fn on(&self, type_name: &str) -> Option<ObjectAccessor> {
        let SchemaNode::Union(name) = &self.core.node else {
            return None;
        };
        let union = self.core.state.unions.get(name)?;
        if !union.has_member(type_name) {
            return None;
        }
        self.narrow(type_name)
    }

    /// Returns the cached snapshot, or `{}` when nothing is cached.
    pub fn to_json(&self) -> Value {
        self.cache_value()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Returns the cached snapshot.
    pub fn cache_value(&self) -> Option<Value> {
        self.core.state.cache_value(&self.core.selection)
    }

    pub fn selection(&self) -> &Rc<Selection> {
        &self.core.selection
    }

    pub fn schema_node(&self) -> &SchemaNode {
        &self.core.node
    }

    pub fn unions(&self) -> Option<&[String]> {
        self.core.unions.as_deref()
    }

    pub fn parent_typename(&self) -> Option<&str> {
        self.core.parent_typename.as_deref()
    }

    /// Returns the child accessors built through this accessor.
    pub fn children(&self) -> Vec<FieldValue> {
        self.core
            .state
            .accessors
            .children(self.core.id)
            .into_iter()
            .map(FieldValue::from_core)
            .collect()
    }

    /// Returns the scalar selections read through this accessor, in access order.
    pub fn history(&self) -> Vec<Rc<Selection>> {
        self.core
            .state
            .accessors
            .history(self.core.id)
            .unwrap_or_default()
    }

    /// Returns true if both handles refer to the same accessor.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    fn get_union_field(&self, union_name: &str, key: &str) -> ClientResult<FieldValue> {
        let Some(union) = self.core.state.unions.get(union_name).cloned() else {
            return Err(ClientError::type_not_found(
                union_name,
                std::iter::empty(),
                "ObjectAccessor::get",
            ));
        };

        if !union.has_field(key) {
            if union.has_member(key) {
                return Ok(self
                    .narrow(key)
                    .map_or(FieldValue::Value(Value::Null), FieldValue::Object));
            }
            return Ok(FieldValue::Undefined);
        }

        match self.concrete_member(&union) {
            Some(member) => match self.narrow(&member) {
                Some(accessor) => accessor.get(key),
                None => Ok(FieldValue::Value(Value::Null)),
            },
            None if key == TYPENAME_FIELD => {
                self.resolve(key, &FieldType::new("String!"), None)
            }
            None => Err(ClientError::invalid_union(
                union_name,
                key,
                "ObjectAccessor::get",
            )),
        }
    }

    /// Resolves the concrete type of a union accessor: the parent typename when it names a
    /// member, else the cached `__typename`.
    fn concrete_member(&self, union: &SchemaUnion) -> Option<String> {
        if let Some(parent) = &self.core.parent_typename {
            if union.has_member(parent) {
                return Some(parent.clone());
            }
        }
        let cached = self.core.state.cache.borrow().typename(&self.core.selection)?;
        union.has_member(&cached).then_some(cached)
    }

    fn narrow(&self, member: &str) -> Option<ObjectAccessor> {
        let state = &self.core.state;
        state.create_accessor(
            SchemaNode::Object(member.to_string()),
            Rc::clone(&self.core.selection),
            Some(state.unions.selection_group(member)),
            Some(member.to_string()),
        )
    }

    fn resolve(
        &self,
        key: &str,
        field_type: &FieldType,
        args: Option<ArgValues>,
    ) -> ClientResult<FieldValue> {
        let core = &self.core;
        let state = &core.state;
        let parsed = field_type.parsed();
        let selection = state.selections.get_selection(
            SelectionSpec::child(key, &core.selection)
                .with_args(args, field_type.args.clone())
                .with_unions(core.unions.clone()),
        );

        state.interceptors.add_selection_cache(&selection);

        if state.schema.is_scalar_or_enum(&parsed.pure_type) {
            return Ok(self.read_scalar(&selection, parsed.is_array));
        }

        let Some(node) = state.schema.resolve_type(&parsed.pure_type) else {
            let available: Vec<&str> = match &core.node {
                SchemaNode::Object(name) => state
                    .schema
                    .object(name)
                    .map(|object| object.field_names().collect())
                    .unwrap_or_default(),
                SchemaNode::Union(_) => Vec::new(),
            };
            return Err(ClientError::type_not_found(
                &parsed.pure_type,
                available,
                "ObjectAccessor::get",
            ));
        };

        let typename = Some(node.name().to_string());
        let child = if parsed.is_array {
            state
                .create_array_accessor(node, selection, None, typename)
                .map(FieldValue::Array)
        } else {
            state
                .create_accessor(node, selection, None, typename)
                .map(FieldValue::Object)
        };

        match child {
            Some(child) => {
                if let Some(child_core) = child.core() {
                    state.accessors.add_child(core.id, child_core);
                }
                Ok(child)
            }
            None => Ok(FieldValue::Value(Value::Null)),
        }
    }

    fn read_scalar(&self, selection: &Rc<Selection>, is_array: bool) -> FieldValue {
        let core = &self.core;
        let state = &core.state;
        let cached = state.cache_value(selection);

        state.accessors.add_to_history(core.id, selection);

        let in_union = core.unions.is_some() && core.parent_typename.is_some();
        if in_union {
            state.interceptors.add_selection(&self.typename_selection());
        }

        let subscription = selection.kind() == SelectionType::Subscription;

        let Some(value) = cached else {
            state.found_valid_cache.set(false);

            // The server already said this object is of another member type.
            let other_type = in_union
                && self.cache_typename().is_some_and(|typename| {
                    core.parent_typename.as_deref() != Some(typename.as_str())
                });
            let fetch_error = state.has_fetch_error(selection);

            if subscription || (!other_type && !fetch_error) {
                trace!(selection = %selection, "cache miss, fetching");
                self.auto_fetch_keys();
                state.interceptors.add_selection(selection);
            } else {
                debug!(selection = %selection, other_type, fetch_error, "cache miss, fetch suppressed");
            }

            return if is_array {
                FieldValue::Value(Value::Array(Vec::new()))
            } else {
                FieldValue::Undefined
            };
        };

        if !state.allow_cache.get() || subscription {
            self.auto_fetch_keys();
            state.interceptors.add_selection(selection);
        } else {
            state.interceptors.add_selection_cache_refetch(selection);
        }

        FieldValue::Value(value)
    }

    fn typename_selection(&self) -> Rc<Selection> {
        self.core
            .state
            .selections
            .get_selection(SelectionSpec::child(TYPENAME_FIELD, &self.core.selection))
    }

    /// Returns the cached `__typename` of this object, enqueueing it when missing.
    fn cache_typename(&self) -> Option<String> {
        let state = &self.core.state;
        let typename = state.cache.borrow().typename(&self.core.selection);
        if typename.is_none() {
            state.interceptors.add_selection(&self.typename_selection());
        }
        typename
    }

    /// Enqueues the normalization keys of the type being read.
    fn auto_fetch_keys(&self) {
        let core = &self.core;
        let state = &core.state;
        let Some(normalization) = state.normalization.as_ref() else {
            return;
        };

        if let Some(unions) = &core.unions {
            for type_name in unions.iter() {
                let Some(keys) = normalization.keys_for(type_name) else {
                    continue;
                };
                let group = state.unions.selection_group(type_name);
                for key in keys {
                    let selection = state.selections.get_selection(
                        SelectionSpec::child(key.as_str(), &core.selection)
                            .with_unions(Some(Arc::clone(&group))),
                    );
                    state.interceptors.add_selection(&selection);
                }
            }
        } else if let Some(parent) = &core.parent_typename {
            for key in normalization.keys_for(parent).unwrap_or_default() {
                let selection = state
                    .selections
                    .get_selection(SelectionSpec::child(key.as_str(), &core.selection));
                state.interceptors.add_selection(&selection);
            }
        }
    }
}

impl fmt::Debug for ObjectAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}

/// A field taking arguments. Calling it reads the field for the given argument values.
#[derive(Clone)]
pub struct FieldFn {
    owner: ObjectAccessor,
    key: String,
    field_type: FieldType,
}

impl FieldFn {
    /// Reads the field. `args` must be an object, or `null` for no arguments.
    pub fn call(&self, args: Value) -> ClientResult<FieldValue> {
        let args = object_args(args, "FieldFn::call")?;
        self.owner.resolve(&self.key, &self.field_type, args)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the declared argument types.
    pub fn arg_types(&self) -> Option<&ArgTypes> {
        self.field_type.args.as_ref()
    }

    /// Returns the selection of the accessor the field was read from.
    pub fn prev_selection(&self) -> &Rc<Selection> {
        &self.owner.core.selection
    }

    pub fn unions(&self) -> Option<&[String]> {
        self.owner.unions()
    }

    pub(crate) fn owner(&self) -> &ObjectAccessor {
        &self.owner
    }

    /// Returns the selection the field resolves to for the given arguments.
    pub(crate) fn selection_for(&self, args: Option<ArgValues>) -> Rc<Selection> {
        let core = &self.owner.core;
        core.state.selections.get_selection(
            SelectionSpec::child(self.key.as_str(), &core.selection)
                .with_args(args, self.field_type.args.clone())
                .with_unions(core.unions.clone()),
        )
    }
}

impl fmt::Debug for FieldFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldFn")
            .field("key", &self.key)
            .field("prev", &self.owner.core.selection.to_string())
            .field("args", &self.field_type.args)
            .finish()
    }
}

/// Validates field arguments: an object, or `null` for none.
pub(crate) fn object_args(args: Value, caller: &'static str) -> ClientResult<Option<ArgValues>> {
    match args {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(ClientError::invalid_arguments(json_type_name(&other), caller)),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
