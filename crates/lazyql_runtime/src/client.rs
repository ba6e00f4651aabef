//! The client context.
//!
//! A [`Client`] owns everything the accessor engine works against: the schema and its union
//! index, the selection manager, the accessor cache, the normalized cache, the interceptors and
//! the event handler. Nothing is global, so independent clients can coexist in one process.

use crate::accessor::{AccessorCore, AccessorKind, ArrayAccessor, ObjectAccessor};
use crate::accessor_cache::{AccessorCache, MemoKey};
use crate::cache::{CacheRef, ClientCache, InMemoryCache};
use crate::config::{ClientConfig, NormalizationConfig};
use crate::error::{ClientError, ClientResult, ErrorCode};
use crate::events::{CacheChangeEvent, EventHandler};
use crate::interceptor::InterceptorManager;
use lazyql_core::{Selection, SelectionId, SelectionManager};
use lazyql_schema::{Schema, SchemaNode, SchemaUnions};
use rustc_hash::FxHashSet;
use serde_json::Value;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// State shared by a client and all of its accessors.
pub(crate) struct ClientState {
    pub(crate) schema: Arc<Schema>,
    pub(crate) unions: Arc<SchemaUnions>,
    pub(crate) selections: SelectionManager,
    pub(crate) accessors: AccessorCache,
    pub(crate) cache: RefCell<Box<dyn ClientCache>>,
    pub(crate) interceptors: InterceptorManager,
    pub(crate) events: EventHandler,
    pub(crate) normalization: Option<NormalizationConfig>,
    pub(crate) allow_cache: Cell<bool>,
    /// Cleared by every cache miss.
    pub(crate) found_valid_cache: Cell<bool>,
    /// Selections the fetch layer failed to fetch.
    pub(crate) fetch_errors: RefCell<FxHashSet<SelectionId>>,
}

impl ClientState {
    /// Returns the object accessor for a selection, or `None` for a cached `null`.
    pub(crate) fn create_accessor(
        self: &Rc<Self>,
        node: SchemaNode,
        selection: Rc<Selection>,
        unions: Option<Arc<[String]>>,
        parent_typename: Option<String>,
    ) -> Option<ObjectAccessor> {
        if self.allow_cache.get() && self.cache_reference(&selection) == CacheRef::Null {
            return None;
        }
        let core = self.memo(AccessorKind::Object, node, selection, unions, parent_typename);
        Some(ObjectAccessor { core })
    }

    /// Returns the list accessor for a selection, or `None` for a cached `null`.
    pub(crate) fn create_array_accessor(
        self: &Rc<Self>,
        node: SchemaNode,
        selection: Rc<Selection>,
        unions: Option<Arc<[String]>>,
        parent_typename: Option<String>,
    ) -> Option<ArrayAccessor> {
        if self.allow_cache.get() && self.cache_reference(&selection) == CacheRef::Null {
            return None;
        }
        let core = self.memo(AccessorKind::Array, node, selection, unions, parent_typename);
        Some(ArrayAccessor { core })
    }

    fn memo(
        self: &Rc<Self>,
        kind: AccessorKind,
        node: SchemaNode,
        selection: Rc<Selection>,
        unions: Option<Arc<[String]>>,
        parent_typename: Option<String>,
    ) -> Rc<AccessorCore> {
        let unresolved = match kind {
            AccessorKind::Object => false,
            AccessorKind::Array => match self.cache.borrow().list_len(&selection) {
                None => true,
                Some(len) => len == 0 && !self.allow_cache.get(),
            },
        };
        // Every unresolved list shares one identity.
        let reference = if unresolved {
            CacheRef::Undefined
        } else {
            self.cache_reference(&selection)
        };

        let key = MemoKey {
            reference,
            node: node.clone(),
            kind,
            unions: unions.clone(),
        };
        if let Some(core) = self.accessors.lookup(&selection, &key) {
            return core;
        }

        let core = Rc::new(AccessorCore {
            id: self.accessors.next_id(),
            state: Rc::clone(self),
            kind,
            node,
            selection,
            unions,
            parent_typename,
            unresolved,
        });
        self.accessors.insert(&core.selection, key, &core);
        trace!(selection = %core.selection, ?kind, "accessor created");
        core
    }

    pub(crate) fn cache_reference(&self, selection: &Selection) -> CacheRef {
        self.cache.borrow().cache_reference(selection)
    }

    pub(crate) fn cache_value(&self, selection: &Selection) -> Option<Value> {
        self.cache.borrow().get_cache_from_selection(selection)
    }

    /// Writes into the cache and notifies listeners.
    pub(crate) fn write(&self, selection: &Rc<Selection>, data: Option<Value>) {
        debug!(selection = %selection, removed = data.is_none(), "cache write");
        self.cache
            .borrow_mut()
            .set_cache_from_selection(selection, data.clone());
        self.events.send_cache_change(&CacheChangeEvent {
            selection: Rc::clone(selection),
            data,
        });
    }

    pub(crate) fn has_fetch_error(&self, selection: &Selection) -> bool {
        self.fetch_errors.borrow().contains(&selection.id())
    }
}

/// A lazyql client.
///
/// The `query`, `mutation` and `subscription` roots are the entry points into the graph.
pub struct Client {
    pub(crate) state: Rc<ClientState>,
    query: ObjectAccessor,
    mutation: ObjectAccessor,
    subscription: ObjectAccessor,
}

impl Client {
    /// Creates a client with the default configuration and an in-memory cache.
    pub fn new(schema: impl Into<Arc<Schema>>) -> Self {
        Self::with_config(schema, ClientConfig::default())
    }

    /// Creates a client with an in-memory cache.
    pub fn with_config(schema: impl Into<Arc<Schema>>, config: ClientConfig) -> Self {
        Self::with_cache(schema, config, Box::new(InMemoryCache::new()))
    }

    /// Creates a client on top of the given cache.
    pub fn with_cache(
        schema: impl Into<Arc<Schema>>,
        config: ClientConfig,
        cache: Box<dyn ClientCache>,
    ) -> Self {
        let schema: Arc<Schema> = schema.into();
        let unions = Arc::new(SchemaUnions::new(&schema));
        let state = Rc::new(ClientState {
            schema,
            unions,
            selections: SelectionManager::new(),
            accessors: AccessorCache::default(),
            cache: RefCell::new(cache),
            interceptors: InterceptorManager::new(),
            events: EventHandler::new(),
            normalization: config.normalization,
            allow_cache: Cell::new(config.allow_cache),
            found_valid_cache: Cell::new(true),
            fetch_errors: RefCell::default(),
        });

        // Roots are built even over a cached `null`.
        let root = |selection: Rc<Selection>| {
            let node = SchemaNode::Object(state.schema.root_type(selection.kind()).to_string());
            ObjectAccessor {
                core: state.memo(AccessorKind::Object, node, selection, None, None),
            }
        };
        let query = root(state.selections.query_root());
        let mutation = root(state.selections.mutation_root());
        let subscription = root(state.selections.subscription_root());

        debug!(
            types = state.schema.types.len(),
            unions = state.unions.len(),
            "client created"
        );

        Self {
            state,
            query,
            mutation,
            subscription,
        }
    }

    /// Returns the query root.
    pub fn query(&self) -> &ObjectAccessor {
        &self.query
    }

    /// Returns the mutation root.
    pub fn mutation(&self) -> &ObjectAccessor {
        &self.mutation
    }

    /// Returns the subscription root.
    pub fn subscription(&self) -> &ObjectAccessor {
        &self.subscription
    }

    /// Builds an object accessor for a selection.
    ///
    /// Returns `None` when caching is allowed and `null` is cached for the selection.
    pub fn create_accessor(
        &self,
        node: SchemaNode,
        selection: &Rc<Selection>,
        unions: Option<Arc<[String]>>,
        parent_typename: Option<&str>,
    ) -> ClientResult<Option<ObjectAccessor>> {
        self.check_node(&node, "create_accessor")?;
        Ok(self.state.create_accessor(
            node,
            Rc::clone(selection),
            unions,
            parent_typename.map(str::to_string),
        ))
    }

    /// Builds a list accessor for a selection.
    ///
    /// Returns `None` when caching is allowed and `null` is cached for the selection.
    pub fn create_array_accessor(
        &self,
        node: SchemaNode,
        selection: &Rc<Selection>,
        unions: Option<Arc<[String]>>,
        parent_typename: Option<&str>,
    ) -> ClientResult<Option<ArrayAccessor>> {
        self.check_node(&node, "create_array_accessor")?;
        Ok(self.state.create_array_accessor(
            node,
            Rc::clone(selection),
            unions,
            parent_typename.map(str::to_string),
        ))
    }

    fn check_node(&self, node: &SchemaNode, caller: &'static str) -> ClientResult<()> {
        let known = match node {
            SchemaNode::Object(name) => self.state.schema.object(name).is_some(),
            SchemaNode::Union(name) => self.state.unions.get(name).is_some(),
        };
        if known {
            Ok(())
        } else {
            Err(ClientError::new(
                ErrorCode::TypeNotFound,
                format!("GraphQL Type not found: {}", node.name()),
                caller,
            ))
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.state.schema
    }

    pub fn unions(&self) -> &SchemaUnions {
        &self.state.unions
    }

    pub fn selections(&self) -> &SelectionManager {
        &self.state.selections
    }

    /// Borrows the cache.
    ///
    /// The borrow must be released before reading or writing through accessors.
    pub fn cache(&self) -> Ref<'_, dyn ClientCache> {
        Ref::map(self.state.cache.borrow(), |cache| &**cache)
    }

    pub fn interceptors(&self) -> &InterceptorManager {
        &self.state.interceptors
    }

    pub fn events(&self) -> &EventHandler {
        &self.state.events
    }

    pub fn allow_cache(&self) -> bool {
        self.state.allow_cache.get()
    }

    /// Sets whether reads may be served from the cache.
    pub fn set_allow_cache(&self, allow_cache: bool) {
        self.state.allow_cache.set(allow_cache);
    }

    /// Returns false if any read missed the cache since the last reset.
    pub fn found_valid_cache(&self) -> bool {
        self.state.found_valid_cache.get()
    }

    pub fn reset_found_valid_cache(&self) {
        self.state.found_valid_cache.set(true);
    }

    /// Records that fetching a selection failed. Misses on it are no longer enqueued,
    /// except for subscriptions.
    pub fn record_fetch_error(&self, selection: &Selection) {
        debug!(selection = %selection, "fetch error recorded");
        self.state.fetch_errors.borrow_mut().insert(selection.id());
    }

    pub fn has_fetch_error(&self, selection: &Selection) -> bool {
        self.state.has_fetch_error(selection)
    }

    pub fn clear_fetch_errors(&self) {
        self.state.fetch_errors.borrow_mut().clear();
    }

    /// Returns the number of memoized accessors still alive.
    pub fn live_accessors(&self) -> usize {
        self.state.accessors.live_count()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("allow_cache", &self.allow_cache())
            .field("selections", &self.state.selections.len())
            .field("live_accessors", &self.live_accessors())
            .finish()
    }
}
