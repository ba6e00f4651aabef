//! Selection interceptors.
//!
//! Every field access registers its selection here, in access order. An interceptor records
//! three classes of selections:
//! - fetch: missing from the cache, or always fetched (subscriptions, cache disabled)
//! - cache: observed, for change tracking
//! - refetch: served from the cache and revalidated in the background
//!
//! The global interceptor is always listening. Scoped interceptors record while they are
//! registered with the manager and listening.

use indexmap::IndexSet;
use lazyql_core::Selection;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type SelectionListener = Rc<dyn Fn(&Rc<Selection>)>;

/// Records the selections accessed while it listens.
pub struct Interceptor {
    fetch_selections: RefCell<IndexSet<Rc<Selection>>>,
    cache_selections: RefCell<IndexSet<Rc<Selection>>>,
    refetch_selections: RefCell<IndexSet<Rc<Selection>>>,
    listening: Cell<bool>,
    listeners: RefCell<Vec<SelectionListener>>,
}

impl Default for Interceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor {
    /// Creates a listening interceptor.
    pub fn new() -> Self {
        Self {
            fetch_selections: RefCell::default(),
            cache_selections: RefCell::default(),
            refetch_selections: RefCell::default(),
            listening: Cell::new(true),
            listeners: RefCell::default(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.get()
    }

    pub fn set_listening(&self, listening: bool) {
        self.listening.set(listening);
    }

    /// Registers a listener called with every selection newly added to the fetch set.
    pub fn on_selection_add(&self, listener: impl Fn(&Rc<Selection>) + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    /// Adds a selection to the fetch set.
    pub fn add_fetch(&self, selection: &Rc<Selection>) {
        if !self.is_listening() {
            return;
        }
        let added = self
            .fetch_selections
            .borrow_mut()
            .insert(Rc::clone(selection));
        if added {
            let listeners = self.listeners.borrow().clone();
            for listener in listeners {
                listener(selection);
            }
        }
    }

    /// Adds a selection to the change-tracking set.
    pub fn add_cache(&self, selection: &Rc<Selection>) {
        if self.is_listening() {
            self.cache_selections
                .borrow_mut()
                .insert(Rc::clone(selection));
        }
    }

    /// Adds a selection to the background refetch set.
    pub fn add_refetch(&self, selection: &Rc<Selection>) {
        if self.is_listening() {
            self.refetch_selections
                .borrow_mut()
                .insert(Rc::clone(selection));
        }
    }

    /// Returns the fetch set, in access order.
    pub fn fetch_selections(&self) -> Vec<Rc<Selection>> {
        self.fetch_selections.borrow().iter().cloned().collect()
    }

    /// Returns the change-tracking set, in access order.
    pub fn cache_selections(&self) -> Vec<Rc<Selection>> {
        self.cache_selections.borrow().iter().cloned().collect()
    }

    /// Returns the background refetch set, in access order.
    pub fn refetch_selections(&self) -> Vec<Rc<Selection>> {
        self.refetch_selections.borrow().iter().cloned().collect()
    }

    pub fn has_fetch(&self, selection: &Selection) -> bool {
        self.fetch_selections.borrow().contains(selection)
    }

    pub fn has_cache(&self, selection: &Selection) -> bool {
        self.cache_selections.borrow().contains(selection)
    }

    pub fn has_refetch(&self, selection: &Selection) -> bool {
        self.refetch_selections.borrow().contains(selection)
    }

    /// Takes the fetch set, leaving it empty.
    pub fn take_fetch_selections(&self) -> Vec<Rc<Selection>> {
        self.fetch_selections.take().into_iter().collect()
    }

    /// Empties every set.
    pub fn clear(&self) {
        self.fetch_selections.borrow_mut().clear();
        self.cache_selections.borrow_mut().clear();
        self.refetch_selections.borrow_mut().clear();
    }
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("fetch", &self.fetch_selections.borrow().len())
            .field("cache", &self.cache_selections.borrow().len())
            .field("refetch", &self.refetch_selections.borrow().len())
            .field("listening", &self.is_listening())
            .finish()
    }
}

/// Fans selections out to the global interceptor and every registered scoped interceptor.
#[derive(Debug, Default)]
pub struct InterceptorManager {
    global: Rc<Interceptor>,
    interceptors: RefCell<Vec<Rc<Interceptor>>>,
}

impl InterceptorManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the global interceptor.
    pub fn global(&self) -> &Rc<Interceptor> {
        &self.global
    }

    /// Creates and registers a scoped interceptor.
    pub fn create_interceptor(&self) -> Rc<Interceptor> {
        let interceptor = Rc::new(Interceptor::new());
        self.interceptors
            .borrow_mut()
            .push(Rc::clone(&interceptor));
        interceptor
    }

    /// Unregisters a scoped interceptor.
    pub fn remove_interceptor(&self, interceptor: &Rc<Interceptor>) {
        self.interceptors
            .borrow_mut()
            .retain(|registered| !Rc::ptr_eq(registered, interceptor));
    }

    /// Requests a fetch of the selection.
    pub fn add_selection(&self, selection: &Rc<Selection>) {
        for interceptor in self.all() {
            interceptor.add_fetch(selection);
        }
    }

    /// Tracks the selection for changes.
    pub fn add_selection_cache(&self, selection: &Rc<Selection>) {
        for interceptor in self.all() {
            interceptor.add_cache(selection);
        }
    }

    /// Requests a background refetch of the selection.
    pub fn add_selection_cache_refetch(&self, selection: &Rc<Selection>) {
        for interceptor in self.all() {
            interceptor.add_refetch(selection);
        }
    }

    fn all(&self) -> Vec<Rc<Interceptor>> {
        let mut all = vec![Rc::clone(&self.global)];
        all.extend(self.interceptors.borrow().iter().cloned());
        all
    }
}
