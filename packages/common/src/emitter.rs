//! # Event bus
//!
//! Stateful entities embed an [`Emitter`] instead of inheriting listener
//! plumbing. Listeners are plain closures; subscribing hands back a
//! [`SubscriptionId`] used to unsubscribe.
//!
//! Firing takes a snapshot of the listener list, so a listener may
//! subscribe or unsubscribe (itself or others) while an event is being
//! delivered. A listener that fires the same emitter re-entrantly does not
//! receive the nested event.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Emitter::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<E> = Rc<RefCell<dyn FnMut(&E)>>;

/// Typed publish/subscribe component.
pub struct Emitter<E> {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener<E>)>>,
}

impl<E> Emitter<E> {
    pub fn new() -> Self {
        Self {
            next_id: Cell::new(0),
            listeners: RefCell::new(Vec::new()),
        }
    }

    /// Register a listener; it is called for every event fired afterwards.
    pub fn subscribe(&self, listener: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        let listener: Listener<E> = Rc::new(RefCell::new(listener));
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener. Returns false when the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn fire(&self, event: &E) {
        let snapshot: Vec<(SubscriptionId, Listener<E>)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            // Skip listeners removed by an earlier listener of this round.
            if !self.is_subscribed(id) {
                continue;
            }
            if let Ok(mut callback) = listener.try_borrow_mut() {
                (&mut *callback)(event);
            }
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.listeners.borrow().iter().any(|(existing, _)| *existing == id)
    }
}

impl<E> Default for Emitter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Emitter<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Payload of an [`Observable`] change.
#[derive(Debug, Clone, PartialEq)]
pub struct Changed<T> {
    pub old: T,
    pub new: T,
}

/// A value whose setter emits [`Changed`] when the value actually changes.
#[derive(Debug)]
pub struct Observable<T> {
    value: RefCell<T>,
    changed: Emitter<Changed<T>>,
}

impl<T: Clone + PartialEq> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
            changed: Emitter::new(),
        }
    }

    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }

    pub fn set(&self, new: T) {
        let old = self.value.replace(new.clone());
        if old != new {
            self.changed.fire(&Changed { old, new });
        }
    }

    pub fn on_change(&self, listener: impl FnMut(&Changed<T>) + 'static) -> SubscriptionId {
        self.changed.subscribe(listener)
    }

    pub fn changed(&self) -> &Emitter<Changed<T>> {
        &self.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_reaches_all_listeners_in_order() {
        let emitter: Emitter<u32> = Emitter::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&log);
        emitter.subscribe(move |v| a.borrow_mut().push(format!("a{}", v)));
        let b = Rc::clone(&log);
        emitter.subscribe(move |v| b.borrow_mut().push(format!("b{}", v)));

        emitter.fire(&1);
        assert_eq!(*log.borrow(), vec!["a1", "b1"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let emitter: Emitter<()> = Emitter::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = emitter.subscribe(move |_| c.set(c.get() + 1));

        emitter.fire(&());
        assert!(emitter.unsubscribe(id));
        emitter.fire(&());

        assert_eq!(count.get(), 1);
        assert!(!emitter.unsubscribe(id));
    }

    #[test]
    fn test_listener_can_subscribe_while_firing() {
        let emitter: Rc<Emitter<()>> = Rc::new(Emitter::new());
        let inner = Rc::clone(&emitter);
        emitter.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        emitter.fire(&());
        assert_eq!(emitter.listener_count(), 2);
    }

    #[test]
    fn test_observable_emits_only_on_change() {
        let value = Observable::new(1u64);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        value.on_change(move |c| s.borrow_mut().push((c.old, c.new)));

        value.set(1);
        value.set(2);

        assert_eq!(value.get(), 2);
        assert_eq!(*seen.borrow(), vec![(1, 2)]);
    }
}
