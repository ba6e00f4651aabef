//! Cache change notifications.

use lazyql_core::Selection;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A write into the cache.
#[derive(Debug, Clone)]
pub struct CacheChangeEvent {
    pub selection: Rc<Selection>,
    /// The value written, `None` when the entry was removed.
    pub data: Option<Value>,
}

/// Handle returned by [`EventHandler::on_cache_change`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&CacheChangeEvent)>;

/// Dispatches cache change events to listeners, synchronously and in registration order.
#[derive(Default)]
pub struct EventHandler {
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_id: Cell<u64>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn on_cache_change(&self, listener: impl Fn(&CacheChangeEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Notifies every listener.
    ///
    /// Listeners may register listeners or write to the cache; those changes apply from the
    /// next event on.
    pub fn send_cache_change(&self, event: &CacheChangeEvent) {
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl std::fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHandler")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
