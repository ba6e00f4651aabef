//! Accessor memoization and bookkeeping.
//!
//! Accessors are memoized per selection on the identity of the cached value they observed, so
//! unchanged data keeps yielding the same accessor. The memo table only holds weak references:
//! an accessor nobody holds is released together with the snapshot identity it was keyed on.

use crate::accessor::{AccessorCore, AccessorKind};
use crate::cache::CacheRef;
use indexmap::{IndexMap, IndexSet};
use lazyql_core::{Selection, SelectionId};
use lazyql_schema::SchemaNode;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

pub(crate) type AccessorId = u64;

/// Everything besides the selection an accessor is memoized on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    pub(crate) reference: CacheRef,
    pub(crate) node: SchemaNode,
    pub(crate) kind: AccessorKind,
    /// Compared by content.
    pub(crate) unions: Option<Arc<[String]>>,
}

/// Identifies a child slot of a parent: one accessor per selection and shape.
type ChildKey = (SelectionId, AccessorKind, SchemaNode);

#[derive(Default)]
pub(crate) struct AccessorCache {
    memo: RefCell<FxHashMap<SelectionId, Vec<(MemoKey, Weak<AccessorCore>)>>>,
    /// Structural children, kept alive by their parent. A newer accessor for the same slot
    /// replaces the one built from an older snapshot.
    children: RefCell<FxHashMap<AccessorId, IndexMap<ChildKey, Rc<AccessorCore>>>>,
    /// Scalar selections read through each accessor, in access order.
    history: RefCell<FxHashMap<AccessorId, IndexSet<Rc<Selection>>>>,
    next_id: Cell<AccessorId>,
}

impl AccessorCache {
    pub(crate) fn next_id(&self) -> AccessorId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn lookup(&self, selection: &Selection, key: &MemoKey) -> Option<Rc<AccessorCore>> {
        self.memo
            .borrow()
            .get(&selection.id())?
            .iter()
            .find(|(memo_key, _)| memo_key == key)
            .and_then(|(_, accessor)| accessor.upgrade())
    }

    /// Memoizes an accessor, pruning released accessors of the same selection.
    pub(crate) fn insert(&self, selection: &Selection, key: MemoKey, accessor: &Rc<AccessorCore>) {
        let mut memo = self.memo.borrow_mut();
        let entries = memo.entry(selection.id()).or_default();
        entries.retain(|(memo_key, weak)| weak.strong_count() > 0 && *memo_key != key);
        entries.push((key, Rc::downgrade(accessor)));
    }

    pub(crate) fn add_child(&self, parent: AccessorId, child: &Rc<AccessorCore>) {
        let key = (child.selection.id(), child.kind, child.node.clone());
        // The replaced child is dropped after the borrow ends, since dropping it re-enters `forget`.
        let replaced = self
            .children
            .borrow_mut()
            .entry(parent)
            .or_default()
            .insert(key, Rc::clone(child));
        drop(replaced);
    }

    pub(crate) fn children(&self, parent: AccessorId) -> Vec<Rc<AccessorCore>> {
        self.children
            .borrow()
            .get(&parent)
            .map(|children| children.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn add_to_history(&self, accessor: AccessorId, selection: &Rc<Selection>) {
        self.history
            .borrow_mut()
            .entry(accessor)
            .or_default()
            .insert(Rc::clone(selection));
    }

    pub(crate) fn history(&self, accessor: AccessorId) -> Option<Vec<Rc<Selection>>> {
        self.history
            .borrow()
            .get(&accessor)
            .filter(|history| !history.is_empty())
            .map(|history| history.iter().cloned().collect())
    }

    /// Drops the bookkeeping of a released accessor.
    pub(crate) fn forget(&self, accessor: AccessorId) {
        // Children are dropped after the borrow ends, since dropping them re-enters here.
        let children = self
            .children
            .try_borrow_mut()
            .ok()
            .and_then(|mut children| children.remove(&accessor));
        if let Ok(mut history) = self.history.try_borrow_mut() {
            history.remove(&accessor);
        }
        drop(children);
    }

    /// Returns the number of memoized accessors still alive.
    pub(crate) fn live_count(&self) -> usize {
        self.memo
            .borrow()
            .values()
            .flatten()
            .filter(|(_, accessor)| accessor.strong_count() > 0)
            .count()
    }
}
