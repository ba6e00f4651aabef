//! Direct cache writes.

use crate::accessor::{object_args, ArrayAccessor, FieldFn, ObjectAccessor};
use crate::client::Client;
use crate::error::{ClientError, ClientResult};
use crate::value::{Data, FieldValue};
use lazyql_core::Selection;
use serde_json::Value;
use std::rc::Rc;

/// What [`Client::set_cache`] writes to.
#[derive(Debug, Clone)]
pub enum CacheTarget {
    /// A selection.
    Selection(Rc<Selection>),
    /// The selection of an accessor.
    Proxy(FieldValue),
    /// The selection a field taking arguments resolves to for the given arguments.
    Function {
        field: FieldValue,
        args: Option<Value>,
    },
}

impl CacheTarget {
    /// Targets a field taking arguments.
    pub fn function(field: impl Into<FieldValue>, args: impl Into<Option<Value>>) -> Self {
        Self::Function {
            field: field.into(),
            args: args.into(),
        }
    }
}

impl From<Rc<Selection>> for CacheTarget {
    fn from(selection: Rc<Selection>) -> Self {
        Self::Selection(selection)
    }
}

impl From<&Rc<Selection>> for CacheTarget {
    fn from(selection: &Rc<Selection>) -> Self {
        Self::Selection(Rc::clone(selection))
    }
}

impl From<FieldValue> for CacheTarget {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Callable(_) => Self::Function {
                field: value,
                args: None,
            },
            value => Self::Proxy(value),
        }
    }
}

impl From<&FieldValue> for CacheTarget {
    fn from(value: &FieldValue) -> Self {
        Self::from(value.clone())
    }
}

impl From<ObjectAccessor> for CacheTarget {
    fn from(accessor: ObjectAccessor) -> Self {
        Self::Proxy(FieldValue::Object(accessor))
    }
}

impl From<&ObjectAccessor> for CacheTarget {
    fn from(accessor: &ObjectAccessor) -> Self {
        Self::Proxy(FieldValue::Object(accessor.clone()))
    }
}

impl From<ArrayAccessor> for CacheTarget {
    fn from(accessor: ArrayAccessor) -> Self {
        Self::Proxy(FieldValue::Array(accessor))
    }
}

impl From<&ArrayAccessor> for CacheTarget {
    fn from(accessor: &ArrayAccessor) -> Self {
        Self::Proxy(FieldValue::Array(accessor.clone()))
    }
}

impl From<FieldFn> for CacheTarget {
    fn from(field: FieldFn) -> Self {
        Self::function(field, None)
    }
}

impl Client {
    /// Writes data into the cache and emits a cache change event.
    ///
    /// Accessors embedded in `data` are replaced by their cached snapshot. `Data::Undefined`
    /// removes the cached value.
    pub fn set_cache(
        &self,
        target: impl Into<CacheTarget>,
        data: impl Into<Data>,
    ) -> ClientResult<()> {
        let selection = match target.into() {
            CacheTarget::Selection(selection) => selection,
            CacheTarget::Proxy(value) => match value.core() {
                Some(core) if core.belongs_to(&self.state) => Rc::clone(&core.selection),
                _ => return Err(ClientError::invalid_proxy("Invalid lazyql proxy", "set_cache")),
            },
            CacheTarget::Function { field, args } => {
                let args = object_args(args.unwrap_or(Value::Null), "set_cache")?;
                match field.as_callable() {
                    Some(function) if function.owner().core.belongs_to(&self.state) => {
                        function.selection_for(args)
                    }
                    _ => return Err(ClientError::invalid_function("set_cache")),
                }
            }
        };

        let data = data.into().flatten();
        self.state.write(&selection, data);
        Ok(())
    }
}
