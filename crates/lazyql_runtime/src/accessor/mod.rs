//! The accessor engine.
//!
//! An accessor is a lazily materialized view of the schema-shaped graph, bound to a selection
//! and a schema type. Reading a field through it resolves the child selection, consults the
//! cache and registers the selection with the interceptors: scalars come back as values (or
//! `Undefined` on a miss), object and list fields come back as child accessors.
//!
//! - `object`: Object and union accessors, callable fields
//! - `array`: List accessors

mod array;
mod object;

pub use array::ArrayAccessor;
pub use object::{FieldFn, ObjectAccessor};

pub(crate) use object::object_args;

use crate::accessor_cache::AccessorId;
use crate::client::ClientState;
use lazyql_core::Selection;
use lazyql_schema::SchemaNode;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum AccessorKind {
    Object,
    Array,
}

/// State shared by every handle of one accessor.
pub(crate) struct AccessorCore {
    pub(crate) id: AccessorId,
    pub(crate) state: Rc<ClientState>,
    pub(crate) kind: AccessorKind,
    pub(crate) node: SchemaNode,
    pub(crate) selection: Rc<Selection>,
    /// Concrete types the accessor's selections are valid under.
    pub(crate) unions: Option<Arc<[String]>>,
    pub(crate) parent_typename: Option<String>,
    /// No list was cached when a list accessor was built.
    pub(crate) unresolved: bool,
}

impl AccessorCore {
    /// Returns true if the accessor belongs to the given client state.
    pub(crate) fn belongs_to(&self, state: &Rc<ClientState>) -> bool {
        Rc::ptr_eq(&self.state, state)
    }
}

impl Drop for AccessorCore {
    fn drop(&mut self) {
        self.state.accessors.forget(self.id);
    }
}

impl fmt::Debug for AccessorCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("selection", &self.selection.to_string())
            .field("node", &self.node)
            .field("unions", &self.unions)
            .field("parent_typename", &self.parent_typename)
            .finish()
    }
}
