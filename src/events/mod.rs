//! Topic-based event bus and the event vocabulary exchanged through it.
//!
//! Every engine service talks to the others by emitting on an
//! [`EventSystem`] rather than holding direct references. Handlers are kept
//! in an explicit registry (topic → ordered listener records) and removed by
//! identity through the [`ListenerId`] returned on subscription.
//!
//! Submodules:
//! - [`asset`] – commands and messages for the background asset loader thread
//! - [`input`] – raw host input, normalized input events and gestures
//! - [`payload`] – the closed [`Payload`] enum carried by every emission
//! - [`topics`] – well-known `<namespace>:<action>` topic names
//!
//! # Example
//!
//! ```ignore
//! let events = EventSystem::new();
//! let sub = events.on(topics::SCENE_ENTER, |payload| {
//!     if let Payload::Scene(t) = payload {
//!         log::info!("entered {}", t.to);
//!     }
//! });
//! events.emit(topics::SCENE_ENTER, &Payload::Empty);
//! sub.unsubscribe();
//! ```

pub mod asset;
pub mod input;
pub mod payload;
pub mod topics;

pub use payload::Payload;

use std::any::Any;
use std::cell::RefCell;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::{Rc, Weak};

use log::{error, trace};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Shared handler callback. Handlers needing mutable state capture a `Cell`
/// or `RefCell`; the bus itself never hands out `&mut` access.
pub type Handler = Rc<dyn Fn(&Payload)>;

/// Identity of a single registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    handler: Handler,
    once: bool,
}

#[derive(Default)]
struct Registry {
    topics: FxHashMap<String, Vec<Listener>>,
    next_id: u64,
}

impl Registry {
    fn insert(&mut self, topic: &str, handler: Handler, once: bool) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Listener { id, handler, once });
        id
    }

    fn remove(&mut self, topic: &str, id: ListenerId) -> bool {
        let Some(listeners) = self.topics.get_mut(topic) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            self.topics.remove(topic);
        }
        removed
    }

    fn contains(&self, topic: &str, id: ListenerId) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|listeners| listeners.iter().any(|l| l.id == id))
    }
}

/// Publish/subscribe hub.
///
/// Cloning an `EventSystem` yields another handle onto the same registry, so
/// services can each keep one without lifetimes tying them together.
#[derive(Clone, Default)]
pub struct EventSystem {
    registry: Rc<RefCell<Registry>>,
}

impl EventSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `topic`.
    pub fn on(&self, topic: &str, handler: impl Fn(&Payload) + 'static) -> Subscription {
        self.subscribe(topic, Rc::new(handler), false)
    }

    /// Subscribe `handler` for a single emission of `topic`.
    pub fn once(&self, topic: &str, handler: impl Fn(&Payload) + 'static) -> Subscription {
        self.subscribe(topic, Rc::new(handler), true)
    }

    fn subscribe(&self, topic: &str, handler: Handler, once: bool) -> Subscription {
        let id = self.registry.borrow_mut().insert(topic, handler, once);
        Subscription {
            topic: topic.to_string(),
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }

    /// Remove a listener by identity. Returns false if it was not registered.
    pub fn off(&self, topic: &str, id: ListenerId) -> bool {
        self.registry.borrow_mut().remove(topic, id)
    }

    /// Invoke every handler registered for `topic`, in registration order.
    ///
    /// A panicking handler is logged and skipped; the remaining handlers of
    /// this emission still run. Returns the number of handlers invoked.
    pub fn emit(&self, topic: &str, payload: &Payload) -> usize {
        let snapshot: SmallVec<[(ListenerId, Handler, bool); 4]> = {
            let registry = self.registry.borrow();
            match registry.topics.get(topic) {
                Some(listeners) => listeners
                    .iter()
                    .map(|l| (l.id, Rc::clone(&l.handler), l.once))
                    .collect(),
                None => {
                    trace!("emit '{}' with no listeners", topic);
                    return 0;
                }
            }
        };

        // One-shot listeners leave the registry before running so a
        // re-entrant emit of the same topic cannot call them twice.
        for (id, _, once) in snapshot.iter() {
            if *once {
                self.off(topic, *id);
            }
        }

        let mut invoked = 0;
        for (id, handler, once) in snapshot {
            // Skip listeners removed by an earlier handler of this emission.
            if !once && !self.registry.borrow().contains(topic, id) {
                continue;
            }
            invoked += 1;
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(payload))) {
                error!(
                    "event handler for '{}' panicked: {}",
                    topic,
                    describe_panic(panic.as_ref())
                );
            }
        }
        invoked
    }

    /// Drop every subscription on every topic.
    pub fn clear(&self) {
        self.registry.borrow_mut().topics.clear();
    }

    /// Drop every subscription on one topic.
    pub fn clear_topic(&self, topic: &str) {
        self.registry.borrow_mut().topics.remove(topic);
    }

    pub fn listener_count(&self, topic: &str) -> usize {
        self.registry
            .borrow()
            .topics
            .get(topic)
            .map_or(0, |listeners| listeners.len())
    }

    pub fn has_topic(&self, topic: &str) -> bool {
        self.registry.borrow().topics.contains_key(topic)
    }

    /// Number of topics with at least one listener.
    pub fn topic_count(&self) -> usize {
        self.registry.borrow().topics.len()
    }
}

/// Handle returned by [`EventSystem::on`] and [`EventSystem::once`].
///
/// Dropping a subscription does not unsubscribe; call
/// [`Subscription::unsubscribe`] explicitly.
#[derive(Debug, Clone)]
pub struct Subscription {
    topic: String,
    id: ListenerId,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the listener is still registered on a live bus.
    pub fn is_active(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.borrow().contains(&self.topic, self.id))
    }

    /// Remove the listener. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.borrow_mut().remove(&self.topic, self.id),
            None => false,
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn describe_panic(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    #[test]
    fn handlers_run_in_registration_order() {
        let events = EventSystem::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            events.on("test:order", move |_| order.borrow_mut().push(i));
        }
        assert_eq!(events.emit("test:order", &Payload::Empty), 3);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn panicking_handler_does_not_stop_the_others() {
        let events = EventSystem::new();
        let hits = Rc::new(Cell::new(0));
        events.on("test:panic", |_| panic!("bad consumer"));
        let h = Rc::clone(&hits);
        events.on("test:panic", move |_| h.set(h.get() + 1));
        events.emit("test:panic", &Payload::Empty);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn unsubscribing_last_listener_removes_topic() {
        let events = EventSystem::new();
        let a = events.on("test:topic", |_| {});
        let b = events.on("test:topic", |_| {});
        assert_eq!(events.listener_count("test:topic"), 2);
        assert!(a.unsubscribe());
        assert!(events.has_topic("test:topic"));
        assert!(events.off("test:topic", b.id()));
        assert!(!events.has_topic("test:topic"));
        assert_eq!(events.topic_count(), 0);
    }

    #[test]
    fn unsubscribe_twice_reports_false() {
        let events = EventSystem::new();
        let sub = events.on("test:twice", |_| {});
        let copy = sub.clone();
        assert!(sub.unsubscribe());
        assert!(!copy.unsubscribe());
    }

    #[test]
    fn once_fires_a_single_time() {
        let events = EventSystem::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        events.once("test:once", move |_| h.set(h.get() + 1));
        events.emit("test:once", &Payload::Empty);
        events.emit("test:once", &Payload::Empty);
        assert_eq!(hits.get(), 1);
        assert!(!events.has_topic("test:once"));
    }

    #[test]
    fn handler_may_emit_and_subscribe_reentrantly() {
        let events = EventSystem::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let inner_events = events.clone();
        let s = Rc::clone(&seen);
        events.on("test:outer", move |_| {
            s.borrow_mut().push("outer");
            let s2 = Rc::clone(&s);
            inner_events.on("test:inner", move |_| s2.borrow_mut().push("inner"));
            inner_events.emit("test:inner", &Payload::Empty);
        });
        events.emit("test:outer", &Payload::Empty);
        assert_eq!(*seen.borrow(), vec!["outer", "inner"]);
    }

    #[test]
    fn listener_removed_mid_emission_is_skipped() {
        let events = EventSystem::new();
        let hits = Rc::new(Cell::new(0));
        let victim: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let v = Rc::clone(&victim);
        events.on("test:remove", move |_| {
            if let Some(sub) = v.borrow_mut().take() {
                sub.unsubscribe();
            }
        });
        let h = Rc::clone(&hits);
        *victim.borrow_mut() = Some(events.on("test:remove", move |_| h.set(h.get() + 1)));
        assert_eq!(events.emit("test:remove", &Payload::Empty), 1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn clear_drops_everything() {
        let events = EventSystem::new();
        let sub = events.on("a:b", |_| {});
        events.on("c:d", |_| {});
        events.clear();
        assert_eq!(events.topic_count(), 0);
        assert!(!sub.is_active());
        assert_eq!(events.emit("a:b", &Payload::Empty), 0);
    }
}
