//! List accessors.

use super::AccessorCore;
use crate::cache::{CacheRef, MAX_LIST_LEN};
use crate::events::CacheChangeEvent;
use crate::value::{Data, FieldValue};
use lazyql_core::{Selection, SelectionSpec};
use lazyql_schema::{SchemaNode, TYPENAME_FIELD};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// An accessor over a list of objects.
#[derive(Clone)]
pub struct ArrayAccessor {
    pub(crate) core: Rc<AccessorCore>,
}

impl ArrayAccessor {
    /// Returns the length of the cached list.
    ///
    /// For a list that is not cached yet this returns 0, and reads the first item so the list
    /// gets fetched.
    pub fn len(&self) -> usize {
        let core = &self.core;
        let state = &core.state;
        if core.unresolved {
            let selection = self.item_selection(0);
            state.interceptors.add_selection_cache(&selection);
            if let Some(item) = state.create_accessor(
                core.node.clone(),
                selection,
                core.unions.clone(),
                core.parent_typename.clone(),
            ) {
                state.accessors.add_child(core.id, &item.core);
                trace!(list = %core.selection, "reading first item of unresolved list");
                if let Err(err) = item.get(TYPENAME_FIELD) {
                    debug!(list = %core.selection, error = %err, "first item read failed");
                }
            }
            return 0;
        }
        state
            .cache
            .borrow()
            .list_len(&core.selection)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads an item.
    ///
    /// Cached `null` and missing items resolve to `null` and `Undefined` when caching is allowed,
    /// everything else to an item accessor.
    pub fn get(&self, index: usize) -> FieldValue {
        let core = &self.core;
        let state = &core.state;
        let selection = self.item_selection(index);
        state.interceptors.add_selection_cache(&selection);

        if state.allow_cache.get() && state.cache_reference(&core.selection) != CacheRef::Undefined
        {
            match state.cache_reference(&selection) {
                CacheRef::Undefined => return FieldValue::Undefined,
                CacheRef::Null => return FieldValue::Value(Value::Null),
                CacheRef::Scalar | CacheRef::Node(_) => {}
            }
        }

        match state.create_accessor(
            core.node.clone(),
            selection,
            core.unions.clone(),
            core.parent_typename.clone(),
        ) {
            Some(item) => {
                state.accessors.add_child(core.id, &item.core);
                FieldValue::Object(item)
            }
            None => FieldValue::Value(Value::Null),
        }
    }

    /// Writes an item into the cache and emits a cache change event.
    pub fn set(&self, index: usize, data: impl Into<Data>) {
        let selection = self.item_selection(index);
        let data = data.into().flatten();
        self.core.state.write(&selection, data);
    }

    /// Truncates or pads with `null` the cached list, keeping its identity.
    ///
    /// Does nothing but warn if no list is cached or `len` exceeds [`MAX_LIST_LEN`].
    pub fn set_len(&self, len: usize) {
        let core = &self.core;
        let state = &core.state;
        if len > MAX_LIST_LEN {
            warn!(list = %core.selection, len, "Array length out of range");
            return;
        }
        let resized = state.cache.borrow_mut().resize_list(&core.selection, len);
        if !resized {
            warn!(list = %core.selection, "Invalid array assignation to unresolved proxy array");
            return;
        }
        state.events.send_cache_change(&CacheChangeEvent {
            selection: Rc::clone(&core.selection),
            data: state.cache_value(&core.selection),
        });
    }

    /// Returns the cached snapshot, or `[]` when nothing is cached.
    pub fn to_json(&self) -> Value {
        self.cache_value()
            .unwrap_or_else(|| Value::Array(Vec::new()))
    }

    /// Returns the cached snapshot.
    pub fn cache_value(&self) -> Option<Value> {
        self.core.state.cache_value(&self.core.selection)
    }

    /// Reads every item of the cached list.
    pub fn items(&self) -> Vec<FieldValue> {
        (0..self.len()).map(|index| self.get(index)).collect()
    }

    pub fn selection(&self) -> &Rc<Selection> {
        &self.core.selection
    }

    /// Returns the item type.
    pub fn schema_node(&self) -> &SchemaNode {
        &self.core.node
    }

    /// Returns false if no list was cached when the accessor was built.
    pub fn is_resolved(&self) -> bool {
        !self.core.unresolved
    }

    /// Returns the item accessors built through this accessor.
    pub fn children(&self) -> Vec<FieldValue> {
        self.core
            .state
            .accessors
            .children(self.core.id)
            .into_iter()
            .map(FieldValue::from_core)
            .collect()
    }

    /// Returns true if both handles refer to the same accessor.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    fn item_selection(&self, index: usize) -> Rc<Selection> {
        self.core
            .state
            .selections
            .get_selection(SelectionSpec::child(index, &self.core.selection))
    }
}

impl fmt::Debug for ArrayAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.core, f)
    }
}
