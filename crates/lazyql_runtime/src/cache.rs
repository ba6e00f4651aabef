//! The normalized client cache.
//!
//! Values are addressed by the cache path of a selection (`query.me.name`). The default
//! [`InMemoryCache`] keeps a tree of nodes in which every object and list carries an identity.
//! Replacing a composite value gives it a fresh identity, while writing below it keeps the
//! identity of every ancestor. Accessors are memoized on that identity.

use indexmap::IndexMap;
use lazyql_core::{Selection, SelectionKey};
use lazyql_schema::TYPENAME_FIELD;
use serde_json::{Map, Value};
use tracing::warn;

/// Largest list length the cache pads up to. Writes past it are ignored.
pub const MAX_LIST_LEN: usize = 1 << 20;

/// Identity of the value currently cached for a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRef {
    /// Nothing cached.
    Undefined,
    /// An explicit `null`.
    Null,
    /// A scalar value. Scalars have no identity of their own.
    Scalar,
    /// An object or list.
    Node(u64),
}

/// A normalized value store addressed by selections.
///
/// `None` means "not fetched", `Some(Value::Null)` means "confirmed absent".
pub trait ClientCache {
    /// Returns the value cached for a selection.
    fn get_cache_from_selection(&self, selection: &Selection) -> Option<Value>;

    /// Returns the identity of the value cached for a selection.
    fn cache_reference(&self, selection: &Selection) -> CacheRef;

    /// Stores a value for a selection. `None` removes it.
    fn set_cache_from_selection(&mut self, selection: &Selection, value: Option<Value>);

    /// Truncates or pads with `null` the list cached for a selection, keeping its identity.
    ///
    /// Returns false if no list is cached or `len` exceeds [`MAX_LIST_LEN`].
    fn resize_list(&mut self, selection: &Selection, len: usize) -> bool;

    /// Returns the whole cache as one JSON document.
    fn snapshot(&self) -> Value;

    /// Removes every cached value.
    fn clear(&mut self);

    /// Returns the length of the list cached for a selection.
    fn list_len(&self, selection: &Selection) -> Option<usize> {
        match self.get_cache_from_selection(selection) {
            Some(Value::Array(items)) => Some(items.len()),
            _ => None,
        }
    }

    /// Returns the `__typename` of the object cached for a selection.
    fn typename(&self, selection: &Selection) -> Option<String> {
        match self.get_cache_from_selection(selection) {
            Some(Value::Object(mut fields)) => match fields.remove(TYPENAME_FIELD) {
                Some(Value::String(typename)) => Some(typename),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Scalar(Value),
    Object {
        id: u64,
        fields: IndexMap<String, Node>,
    },
    List {
        id: u64,
        items: Vec<Node>,
    },
}

impl Node {
    fn from_value(value: Value, next_id: &mut u64) -> Self {
        match value {
            Value::Object(map) => Self::Object {
                id: bump(next_id),
                fields: map
                    .into_iter()
                    .map(|(key, value)| (key, Self::from_value(value, next_id)))
                    .collect(),
            },
            Value::Array(values) => Self::List {
                id: bump(next_id),
                items: values
                    .into_iter()
                    .map(|value| Self::from_value(value, next_id))
                    .collect(),
            },
            scalar => Self::Scalar(scalar),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Scalar(value) => value.clone(),
            Self::Object { fields, .. } => Value::Object(
                fields
                    .iter()
                    .map(|(key, node)| (key.clone(), node.to_value()))
                    .collect::<Map<_, _>>(),
            ),
            Self::List { items, .. } => Value::Array(items.iter().map(Self::to_value).collect()),
        }
    }

    fn reference(&self) -> CacheRef {
        match self {
            Self::Scalar(Value::Null) => CacheRef::Null,
            Self::Scalar(_) => CacheRef::Scalar,
            Self::Object { id, .. } | Self::List { id, .. } => CacheRef::Node(*id),
        }
    }

    fn child(&self, segment: &SelectionKey) -> Option<&Node> {
        match (self, segment) {
            (Self::Object { fields, .. }, SelectionKey::Field(name)) => fields.get(name),
            (Self::List { items, .. }, SelectionKey::Index(index)) => items.get(*index),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &SelectionKey) -> Option<&mut Node> {
        match (self, segment) {
            (Self::Object { fields, .. }, SelectionKey::Field(name)) => fields.get_mut(name),
            (Self::List { items, .. }, SelectionKey::Index(index)) => items.get_mut(*index),
            _ => None,
        }
    }

    /// Turns this node into the container `segment` addresses, unless it already is one.
    fn ensure_container(&mut self, segment: &SelectionKey, next_id: &mut u64) {
        let fits = matches!(
            (&*self, segment),
            (Self::Object { .. }, SelectionKey::Field(_))
                | (Self::List { .. }, SelectionKey::Index(_))
        );
        if fits {
            return;
        }
        *self = match segment {
            SelectionKey::Field(_) => Self::Object {
                id: bump(next_id),
                fields: IndexMap::new(),
            },
            SelectionKey::Index(_) => Self::List {
                id: bump(next_id),
                items: Vec::new(),
            },
        };
    }

    /// Returns the child slot for `segment`, inserting a `null` placeholder if missing.
    fn entry(&mut self, segment: &SelectionKey) -> Option<&mut Node> {
        match (self, segment) {
            (Self::Object { fields, .. }, SelectionKey::Field(name)) => Some(
                fields
                    .entry(name.clone())
                    .or_insert(Self::Scalar(Value::Null)),
            ),
            (Self::List { items, .. }, SelectionKey::Index(index)) => {
                pad(items, *index);
                items.get_mut(*index)
            }
            _ => None,
        }
    }

    fn put(&mut self, segment: &SelectionKey, value: Option<Node>) {
        match (self, segment, value) {
            (Self::Object { fields, .. }, SelectionKey::Field(name), Some(node)) => {
                fields.insert(name.clone(), node);
            }
            (Self::Object { fields, .. }, SelectionKey::Field(name), None) => {
                fields.shift_remove(name);
            }
            (Self::List { items, .. }, SelectionKey::Index(index), Some(node)) => {
                pad(items, *index);
                if let Some(slot) = items.get_mut(*index) {
                    *slot = node;
                }
            }
            // Lists cannot hold holes.
            (Self::List { items, .. }, SelectionKey::Index(index), None) => {
                if let Some(slot) = items.get_mut(*index) {
                    *slot = Self::Scalar(Value::Null);
                }
            }
            _ => {}
        }
    }
}

/// Pads `items` with `null` so that `index` is in range, up to [`MAX_LIST_LEN`].
fn pad(items: &mut Vec<Node>, index: usize) {
    if index < MAX_LIST_LEN && items.len() <= index {
        items.resize(index + 1, Node::Scalar(Value::Null));
    }
}

fn out_of_range(path: &[SelectionKey]) -> bool {
    path.iter()
        .any(|segment| matches!(segment, SelectionKey::Index(index) if *index >= MAX_LIST_LEN))
}

fn bump(next_id: &mut u64) -> u64 {
    let id = *next_id;
    *next_id += 1;
    id
}

fn write_path(node: &mut Node, path: &[SelectionKey], value: Option<Node>, next_id: &mut u64) {
    let Some((segment, rest)) = path.split_first() else {
        return;
    };

    if value.is_some() {
        node.ensure_container(segment, next_id);
    }

    if rest.is_empty() {
        node.put(segment, value);
        return;
    }

    let child = if value.is_some() {
        node.entry(segment)
    } else {
        node.child_mut(segment)
    };
    if let Some(child) = child {
        write_path(child, rest, value, next_id);
    }
}

/// An in-memory normalized cache.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    root: Node,
    next_id: u64,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            root: Node::Object {
                id: 0,
                fields: IndexMap::new(),
            },
            next_id: 1,
        }
    }

    /// Creates a cache holding a previous snapshot, e.g. `{"query": {...}}`.
    pub fn from_snapshot(snapshot: Value) -> Self {
        let mut cache = Self::new();
        if let Value::Object(roots) = snapshot {
            let Self { root, next_id } = &mut cache;
            for (key, value) in roots {
                root.put(
                    &SelectionKey::Field(key),
                    Some(Node::from_value(value, next_id)),
                );
            }
        }
        cache
    }

    fn node(&self, selection: &Selection) -> Option<&Node> {
        selection
            .cache_path()
            .iter()
            .try_fold(&self.root, |node, segment| node.child(segment))
    }

    fn node_mut(&mut self, selection: &Selection) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for segment in selection.cache_path() {
            node = node.child_mut(segment)?;
        }
        Some(node)
    }
}

impl ClientCache for InMemoryCache {
    fn get_cache_from_selection(&self, selection: &Selection) -> Option<Value> {
        self.node(selection).map(Node::to_value)
    }

    fn cache_reference(&self, selection: &Selection) -> CacheRef {
        self.node(selection)
            .map_or(CacheRef::Undefined, Node::reference)
    }

    fn set_cache_from_selection(&mut self, selection: &Selection, value: Option<Value>) {
        if value.is_some() && out_of_range(selection.cache_path()) {
            warn!(%selection, max = MAX_LIST_LEN, "list index out of range, write ignored");
            return;
        }
        let Self { root, next_id } = self;
        let node = value.map(|value| Node::from_value(value, next_id));
        write_path(root, selection.cache_path(), node, next_id);
    }

    fn resize_list(&mut self, selection: &Selection, len: usize) -> bool {
        if len > MAX_LIST_LEN {
            warn!(%selection, len, max = MAX_LIST_LEN, "list length out of range");
            return false;
        }
        match self.node_mut(selection) {
            Some(Node::List { items, .. }) => {
                items.resize(len, Node::Scalar(Value::Null));
                true
            }
            _ => false,
        }
    }

    fn snapshot(&self) -> Value {
        self.root.to_value()
    }

    fn clear(&mut self) {
        *self = Self {
            root: Node::Object {
                id: 0,
                fields: IndexMap::new(),
            },
            next_id: self.next_id,
        };
    }

    fn list_len(&self, selection: &Selection) -> Option<usize> {
        match self.node(selection) {
            Some(Node::List { items, .. }) => Some(items.len()),
            _ => None,
        }
    }

    fn typename(&self, selection: &Selection) -> Option<String> {
        match self.node(selection)?.child(&SelectionKey::from(TYPENAME_FIELD))? {
            Node::Scalar(Value::String(typename)) => Some(typename.clone()),
            _ => None,
        }
    }
}
