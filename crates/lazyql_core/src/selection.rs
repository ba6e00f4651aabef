//! Selections and structural selection interning.
//!
//! A [`Selection`] identifies one field access in the query tree. Selections are only ever
//! created through a [`SelectionManager`], which guarantees that two structurally identical
//! accesses (same parent, key, arguments and union context) yield the *same* `Rc<Selection>`.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// Argument values of a selection.
pub type ArgValues = Map<String, Value>;

/// Declared argument types of a field, keyed by argument name.
pub type ArgTypes = IndexMap<String, String>;

/// An interned selection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionId(u32);

impl SelectionId {
    /// Returns the raw index.
    #[must_use]
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// The operation a selection belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionType {
    #[default]
    Query,
    Mutation,
    Subscription,
}

impl SelectionType {
    /// Returns the key of the root selection for this operation type.
    pub const fn root_key(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Mutation => "mutation",
            Self::Subscription => "subscription",
        }
    }
}

/// The key of a selection: a field name or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectionKey {
    Field(String),
    Index(usize),
}

impl SelectionKey {
    /// Returns the field name, if this is a field key.
    pub fn as_field(&self) -> Option<&str> {
        match self {
            Self::Field(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// Returns the index, if this is an index key.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Self::Field(_) => None,
            Self::Index(index) => Some(*index),
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for SelectionKey {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<String> for SelectionKey {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl From<usize> for SelectionKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An immutable node of the query tree.
///
/// Equality and hashing are by identifier. Since selections are interned, identifier equality
/// is the same as reference equality.
pub struct Selection {
    id: SelectionId,
    key: SelectionKey,
    prev: Option<Rc<Selection>>,
    args: Option<ArgValues>,
    arg_types: Option<ArgTypes>,
    unions: Option<Arc<[String]>>,
    kind: SelectionType,
    alias: Option<String>,
    cache_path: Vec<SelectionKey>,
}

impl Selection {
    /// Returns the interned identifier.
    pub fn id(&self) -> SelectionId {
        self.id
    }

    /// Returns the field name or list index.
    pub fn key(&self) -> &SelectionKey {
        &self.key
    }

    /// Returns the parent selection, `None` for roots.
    pub fn prev(&self) -> Option<&Rc<Selection>> {
        self.prev.as_ref()
    }

    /// Returns the argument values, if any were supplied.
    pub fn args(&self) -> Option<&ArgValues> {
        self.args.as_ref()
    }

    /// Returns the declared argument types of the field.
    pub fn arg_types(&self) -> Option<&ArgTypes> {
        self.arg_types.as_ref()
    }

    /// Returns the concrete type names this selection is valid under.
    pub fn unions(&self) -> Option<&Arc<[String]>> {
        self.unions.as_ref()
    }

    /// Returns the operation type.
    pub fn kind(&self) -> SelectionType {
        self.kind
    }

    /// Returns the response alias, present when the selection carries arguments.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Returns the path of segments from the root, used to address the cache.
    ///
    /// A field with arguments is addressed as `name(args)` with its arguments in canonical
    /// form, which no plain field name can spell.
    pub fn cache_path(&self) -> &[SelectionKey] {
        &self.cache_path
    }

    /// Returns true for the query, mutation and subscription roots.
    pub fn is_root(&self) -> bool {
        self.prev.is_none()
    }

    /// Returns the chain of selections from the root down to and including this one.
    pub fn selections_list(self: &Rc<Self>) -> Vec<Rc<Selection>> {
        let mut list = vec![Rc::clone(self)];
        let mut current = self.prev.as_ref();
        while let Some(selection) = current {
            list.push(Rc::clone(selection));
            current = selection.prev.as_ref();
        }
        list.reverse();
        list
    }
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Selection {}

impl Hash for Selection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.cache_path.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("id", &self.id.0)
            .field("path", &self.to_string())
            .field("kind", &self.kind)
            .field("args", &self.args)
            .field("unions", &self.unions)
            .finish()
    }
}

/// Description of a field access, handed to [`SelectionManager::get_selection`].
#[derive(Debug, Clone)]
pub struct SelectionSpec {
    pub key: SelectionKey,
    pub prev: Option<Rc<Selection>>,
    pub args: Option<ArgValues>,
    pub arg_types: Option<ArgTypes>,
    pub unions: Option<Arc<[String]>>,
    pub kind: Option<SelectionType>,
}

impl SelectionSpec {
    /// Describes the root selection of an operation type.
    pub fn root(kind: SelectionType) -> Self {
        Self {
            key: SelectionKey::from(kind.root_key()),
            prev: None,
            args: None,
            arg_types: None,
            unions: None,
            kind: Some(kind),
        }
    }

    /// Describes a child selection.
    pub fn child(key: impl Into<SelectionKey>, prev: &Rc<Selection>) -> Self {
        Self {
            key: key.into(),
            prev: Some(Rc::clone(prev)),
            args: None,
            arg_types: None,
            unions: None,
            kind: None,
        }
    }

    /// Sets the argument values and declared argument types.
    pub fn with_args(mut self, args: Option<ArgValues>, arg_types: Option<ArgTypes>) -> Self {
        self.args = args;
        self.arg_types = arg_types;
        self
    }

    /// Sets the union context.
    pub fn with_unions(mut self, unions: Option<Arc<[String]>>) -> Self {
        self.unions = unions;
        self
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct InternKey {
    prev: Option<SelectionId>,
    key: SelectionKey,
    args: Option<String>,
    unions: Option<Vec<String>>,
    kind: SelectionType,
}

/// Interns selections so that structurally identical accesses share one instance.
///
/// Selections live as long as the manager.
#[derive(Debug, Default)]
pub struct SelectionManager {
    selections: RefCell<FxHashMap<InternKey, Rc<Selection>>>,
    /// Map from (field name, canonical arguments) to alias.
    aliases: RefCell<FxHashMap<(String, String), String>>,
    next_id: Cell<u32>,
}

impl SelectionManager {
    /// Creates an empty selection manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the canonical selection for a field access, creating it on first use.
    pub fn get_selection(&self, spec: SelectionSpec) -> Rc<Selection> {
        let args = spec.args.filter(|args| !args.is_empty());
        let canonical_args = args.as_ref().map(canonical_args);
        let kind = spec
            .kind
            .or_else(|| spec.prev.as_ref().map(|prev| prev.kind))
            .unwrap_or_default();

        let intern_key = InternKey {
            prev: spec.prev.as_ref().map(|prev| prev.id),
            key: spec.key.clone(),
            args: canonical_args.clone(),
            unions: spec.unions.as_ref().map(|unions| unions.to_vec()),
            kind,
        };

        if let Some(existing) = self.selections.borrow().get(&intern_key) {
            return Rc::clone(existing);
        }

        let (alias, segment) = match (&spec.key, &canonical_args) {
            (SelectionKey::Field(name), Some(canonical)) => (
                Some(self.alias_for(name, canonical)),
                SelectionKey::Field(format!("{name}({canonical})")),
            ),
            _ => (None, spec.key.clone()),
        };
        let cache_path = match &spec.prev {
            Some(prev) => {
                let mut path = prev.cache_path.clone();
                path.push(segment);
                path
            }
            None => vec![segment],
        };

        let id = SelectionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let selection = Rc::new(Selection {
            id,
            key: spec.key,
            prev: spec.prev,
            args,
            arg_types: spec.arg_types,
            unions: spec.unions,
            kind,
            alias,
            cache_path,
        });
        self.selections
            .borrow_mut()
            .insert(intern_key, Rc::clone(&selection));
        selection
    }

    /// Returns the query root selection.
    pub fn query_root(&self) -> Rc<Selection> {
        self.get_selection(SelectionSpec::root(SelectionType::Query))
    }

    /// Returns the mutation root selection.
    pub fn mutation_root(&self) -> Rc<Selection> {
        self.get_selection(SelectionSpec::root(SelectionType::Mutation))
    }

    /// Returns the subscription root selection.
    pub fn subscription_root(&self) -> Rc<Selection> {
        self.get_selection(SelectionSpec::root(SelectionType::Subscription))
    }

    /// Returns the number of interned selections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.selections.borrow().len()
    }

    /// Returns true if no selection has been interned yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.borrow().is_empty()
    }

    /// Aliases are `{name}_{n}` with `n` unique per manager, so two distinct
    /// (name, arguments) pairs never share an alias.
    fn alias_for(&self, name: &str, canonical: &str) -> String {
        let mut aliases = self.aliases.borrow_mut();
        let next = aliases.len() + 1;
        aliases
            .entry((name.to_string(), canonical.to_string()))
            .or_insert_with(|| format!("{name}_{next}"))
            .clone()
    }
}

/// Serializes arguments with object keys sorted, so argument order never matters.
fn canonical_args(args: &ArgValues) -> String {
    let mut out = String::new();
    write_canonical(&mut out, &Value::Object(args.clone()));
    out
}

fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, value)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(out, value);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Option<ArgValues> {
        value.as_object().cloned()
    }

    #[test]
    fn test_interning_returns_same_instance() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let a = manager.get_selection(SelectionSpec::child("user", &query));
        let b = manager.get_selection(SelectionSpec::child("user", &query));
        let c = manager.get_selection(SelectionSpec::child("users", &query));

        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert!(Rc::ptr_eq(&query, &manager.query_root()));
        assert_eq!(manager.len(), 3);
    }

    #[test]
    fn test_argument_order_does_not_matter() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let a = manager.get_selection(
            SelectionSpec::child("users", &query).with_args(args(json!({"a": 1, "b": 2})), None),
        );
        let b = manager.get_selection(
            SelectionSpec::child("users", &query).with_args(args(json!({"b": 2, "a": 1})), None),
        );
        let c = manager.get_selection(
            SelectionSpec::child("users", &query).with_args(args(json!({"a": 2})), None),
        );

        assert!(Rc::ptr_eq(&a, &b));
        assert!(!Rc::ptr_eq(&a, &c));
        assert_ne!(a.alias(), c.alias());
    }

    #[test]
    fn test_empty_args_are_no_args() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let plain = manager.get_selection(SelectionSpec::child("users", &query));
        let empty = manager
            .get_selection(SelectionSpec::child("users", &query).with_args(args(json!({})), None));

        assert!(Rc::ptr_eq(&plain, &empty));
        assert_eq!(plain.alias(), None);
    }

    #[test]
    fn test_unions_distinguish_selections() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let search = manager.get_selection(SelectionSpec::child("search", &query));
        let group: Arc<[String]> = Arc::from(vec!["Human".to_string()]);
        let plain = manager.get_selection(SelectionSpec::child("name", &search));
        let scoped = manager.get_selection(
            SelectionSpec::child("name", &search).with_unions(Some(Arc::clone(&group))),
        );
        let scoped_again = manager
            .get_selection(SelectionSpec::child("name", &search).with_unions(Some(group)));

        assert!(!Rc::ptr_eq(&plain, &scoped));
        assert!(Rc::ptr_eq(&scoped, &scoped_again));
        assert_eq!(plain.cache_path(), scoped.cache_path());
    }

    #[test]
    fn test_cache_path_spells_arguments() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let user = manager.get_selection(
            SelectionSpec::child("user", &query).with_args(args(json!({"id": "1"})), None),
        );
        let name = manager.get_selection(SelectionSpec::child("name", &user));

        assert_eq!(user.alias(), Some("user_1"));
        assert_eq!(
            name.cache_path(),
            &[
                SelectionKey::from("query"),
                SelectionKey::from(r#"user({"id":"1"})"#),
                SelectionKey::from("name"),
            ]
        );
        assert_eq!(name.to_string(), r#"query.user({"id":"1"}).name"#);
    }

    #[test]
    fn test_arguments_never_collide_with_plain_fields() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let plain = manager.get_selection(SelectionSpec::child("user1", &query));
        let user = manager.get_selection(
            SelectionSpec::child("user", &query).with_args(args(json!({"id": "1"})), None),
        );
        assert_ne!(plain.cache_path(), user.cache_path());

        // Fill the alias counter so `user` reaches 11 while `user1` is still at 1.
        for id in 2..11 {
            manager.get_selection(
                SelectionSpec::child("user", &query).with_args(args(json!({"id": id})), None),
            );
        }
        let eleventh = manager.get_selection(
            SelectionSpec::child("user", &query).with_args(args(json!({"id": 11})), None),
        );
        let other = manager.get_selection(
            SelectionSpec::child("user1", &query).with_args(args(json!({"id": 1})), None),
        );
        assert_eq!(eleventh.alias(), Some("user_11"));
        assert_eq!(other.alias(), Some("user1_12"));
        assert_ne!(eleventh.alias(), other.alias());
        assert_ne!(eleventh.cache_path(), other.cache_path());
    }

    #[test]
    fn test_kind_is_inherited() {
        let manager = SelectionManager::new();
        let subscription = manager.subscription_root();
        let field = manager.get_selection(SelectionSpec::child("onMessage", &subscription));
        let item = manager.get_selection(SelectionSpec::child(0usize, &field));

        assert_eq!(field.kind(), SelectionType::Subscription);
        assert_eq!(item.kind(), SelectionType::Subscription);
        assert_eq!(item.key().as_index(), Some(0));
    }

    #[test]
    fn test_selections_list() {
        let manager = SelectionManager::new();
        let query = manager.query_root();
        let user = manager.get_selection(SelectionSpec::child("user", &query));
        let name = manager.get_selection(SelectionSpec::child("name", &user));

        let list = name.selections_list();
        assert_eq!(list.len(), 3);
        assert!(Rc::ptr_eq(&list[0], &query));
        assert!(Rc::ptr_eq(&list[1], &user));
        assert!(Rc::ptr_eq(&list[2], &name));
        assert!(query.is_root());
    }
}
