//! Values read from and written through accessors.

use crate::accessor::{AccessorCore, AccessorKind, ArrayAccessor, FieldFn, ObjectAccessor};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::fmt;
use std::rc::Rc;

/// The result of reading a field.
#[derive(Clone, Default)]
pub enum FieldValue {
    /// Not fetched yet, or not a field of the type.
    #[default]
    Undefined,
    /// A scalar, enum or `null`.
    Value(Value),
    Object(ObjectAccessor),
    Array(ArrayAccessor),
    /// A field taking arguments.
    Callable(FieldFn),
}

impl FieldValue {
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Value(Value::Null))
    }

    /// Returns true for `Undefined` and `null`.
    pub fn is_nullish(&self) -> bool {
        self.is_undefined() || self.is_null()
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectAccessor> {
        match self {
            Self::Object(accessor) => Some(accessor),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayAccessor> {
        match self {
            Self::Array(accessor) => Some(accessor),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&FieldFn> {
        match self {
            Self::Callable(function) => Some(function),
            _ => None,
        }
    }

    /// Serializes the value. Accessors serialize to their cached snapshot.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Undefined | Self::Callable(_) => None,
            Self::Value(value) => Some(value.clone()),
            Self::Object(accessor) => Some(accessor.to_json()),
            Self::Array(accessor) => Some(accessor.to_json()),
        }
    }

    pub(crate) fn core(&self) -> Option<&Rc<AccessorCore>> {
        match self {
            Self::Object(accessor) => Some(&accessor.core),
            Self::Array(accessor) => Some(&accessor.core),
            _ => None,
        }
    }

    pub(crate) fn from_core(core: Rc<AccessorCore>) -> Self {
        match core.kind {
            AccessorKind::Object => Self::Object(ObjectAccessor { core }),
            AccessorKind::Array => Self::Array(ArrayAccessor { core }),
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Object(accessor) => f.debug_tuple("Object").field(accessor).finish(),
            Self::Array(accessor) => f.debug_tuple("Array").field(accessor).finish(),
            Self::Callable(function) => f.debug_tuple("Callable").field(function).finish(),
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ObjectAccessor> for FieldValue {
    fn from(accessor: ObjectAccessor) -> Self {
        Self::Object(accessor)
    }
}

impl From<ArrayAccessor> for FieldValue {
    fn from(accessor: ArrayAccessor) -> Self {
        Self::Array(accessor)
    }
}

impl From<&ObjectAccessor> for FieldValue {
    fn from(accessor: &ObjectAccessor) -> Self {
        Self::Object(accessor.clone())
    }
}

impl From<&ArrayAccessor> for FieldValue {
    fn from(accessor: &ArrayAccessor) -> Self {
        Self::Array(accessor.clone())
    }
}

impl From<FieldFn> for FieldValue {
    fn from(function: FieldFn) -> Self {
        Self::Callable(function)
    }
}

/// A value written into the cache. Composites may embed accessors.
#[derive(Clone, Default)]
pub enum Data {
    #[default]
    Undefined,
    Value(Value),
    Object(ObjectAccessor),
    Array(ArrayAccessor),
    Map(IndexMap<String, Data>),
    List(Vec<Data>),
}

impl Data {
    /// Resolves the data to the plain value stored in the cache.
    ///
    /// An accessor resolves to its cached snapshot, or `None` when nothing is cached.
    pub fn flatten(&self) -> Option<Value> {
        match self {
            Self::Undefined => None,
            Self::Value(value) => Some(value.clone()),
            Self::Object(accessor) => accessor.cache_value(),
            Self::Array(accessor) => accessor.cache_value(),
            Self::Map(_) | Self::List(_) => self.to_json(),
        }
    }

    /// Serializes nested data: `Undefined` members are dropped, `Undefined` items become
    /// `null` and accessors serialize like `to_json`.
    fn to_json(&self) -> Option<Value> {
        match self {
            Self::Undefined => None,
            Self::Value(value) => Some(value.clone()),
            Self::Object(accessor) => Some(accessor.to_json()),
            Self::Array(accessor) => Some(accessor.to_json()),
            Self::Map(members) => Some(Value::Object(
                members
                    .iter()
                    .filter_map(|(key, data)| data.to_json().map(|value| (key.clone(), value)))
                    .collect::<Map<_, _>>(),
            )),
            Self::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|data| data.to_json().unwrap_or(Value::Null))
                    .collect(),
            )),
        }
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => f.write_str("Undefined"),
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Object(accessor) => f.debug_tuple("Object").field(accessor).finish(),
            Self::Array(accessor) => f.debug_tuple("Array").field(accessor).finish(),
            Self::Map(members) => f.debug_tuple("Map").field(members).finish(),
            Self::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<Option<Value>> for Data {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Undefined, Self::Value)
    }
}

impl From<ObjectAccessor> for Data {
    fn from(accessor: ObjectAccessor) -> Self {
        Self::Object(accessor)
    }
}

impl From<&ObjectAccessor> for Data {
    fn from(accessor: &ObjectAccessor) -> Self {
        Self::Object(accessor.clone())
    }
}

impl From<ArrayAccessor> for Data {
    fn from(accessor: ArrayAccessor) -> Self {
        Self::Array(accessor)
    }
}

impl From<&ArrayAccessor> for Data {
    fn from(accessor: &ArrayAccessor) -> Self {
        Self::Array(accessor.clone())
    }
}

impl From<FieldValue> for Data {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Undefined | FieldValue::Callable(_) => Self::Undefined,
            FieldValue::Value(value) => Self::Value(value),
            FieldValue::Object(accessor) => Self::Object(accessor),
            FieldValue::Array(accessor) => Self::Array(accessor),
        }
    }
}

impl From<IndexMap<String, Data>> for Data {
    fn from(members: IndexMap<String, Data>) -> Self {
        Self::Map(members)
    }
}

impl From<Vec<Data>> for Data {
    fn from(items: Vec<Data>) -> Self {
        Self::List(items)
    }
}

impl<K: Into<String>, const N: usize> From<[(K, Data); N]> for Data {
    fn from(members: [(K, Data); N]) -> Self {
        Self::Map(
            members
                .into_iter()
                .map(|(key, data)| (key.into(), data))
                .collect(),
        )
    }
}
