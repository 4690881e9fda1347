//! Change-notifying objects.
//!
//! Anything an expression can read properties from implements [`Object`].
//! Objects that can change expose a [`Notifier`]; reactive bindings subscribe
//! to it and re-evaluate when a property they read is announced as changed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::value::Value;

// ── Notifier ──────────────────────────────────────────────────────────────

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next(counter: &Cell<u64>) -> Self {
        let id = counter.get();
        counter.set(id + 1);
        SubscriptionId(id)
    }
}

type Listener = Rc<dyn Fn(&str)>;

/// "A named property changed" broadcaster.
///
/// Listeners run synchronously inside [`notify`](Notifier::notify). The
/// listener list is snapshotted before dispatch, so a listener may subscribe,
/// unsubscribe or notify again without corrupting the iteration.
#[derive(Default)]
pub struct Notifier {
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: impl Fn(&str) + 'static) -> SubscriptionId {
        let id = SubscriptionId::next(&self.next_id);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            let at = listeners.iter().position(|(i, _)| *i == id);
            at.map(|at| listeners.remove(at))
        };
        removed.is_some()
    }

    /// Announce that `property` changed. An empty name means "everything".
    pub fn notify(&self, property: &str) {
        let snapshot: Vec<Listener> = self.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            listener(property);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").field("listeners", &self.listener_count()).finish()
    }
}

// ── Object ────────────────────────────────────────────────────────────────

/// A host object whose properties can be read by name.
pub trait Object {
    /// Name used in diagnostics (`property 'x' not found on <type_name>`).
    fn type_name(&self) -> &str;

    /// Read a property. `None` means the object has no such property.
    fn get(&self, name: &str) -> Option<Value>;

    /// Change notifications, if this object ever changes.
    fn notifier(&self) -> Option<&Notifier> {
        None
    }
}

// ── PropertyBag ───────────────────────────────────────────────────────────

/// A named-value object that notifies on every [`set`](PropertyBag::set).
///
/// Controllers typically keep their bindable state in one of these and
/// delegate [`Object`] to it.
///
/// ```rust
/// use guml_ui::object::{Object, PropertyBag};
///
/// let state = PropertyBag::new("State").with("count", 0);
/// state.set("count", 1);
/// assert_eq!(state.get("count"), Some(1.into()));
/// ```
pub struct PropertyBag {
    type_name: String,
    values: RefCell<Vec<(String, Value)>>,
    notifier: Notifier,
}

impl PropertyBag {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), values: RefCell::new(Vec::new()), notifier: Notifier::new() }
    }

    /// Builder-style initial value; does not notify.
    pub fn with(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.borrow_mut().push((name.into(), value.into()));
        self
    }

    /// Store `value` under `name` and notify listeners of `name`.
    pub fn set(&self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        {
            let mut values = self.values.borrow_mut();
            match values.iter_mut().find(|(k, _)| k == name) {
                Some((_, slot)) => *slot = value,
                None => values.push((name.to_string(), value)),
            }
        }
        self.notifier.notify(name);
    }

    pub fn names(&self) -> Vec<String> {
        self.values.borrow().iter().map(|(k, _)| k.clone()).collect()
    }
}

impl Object for PropertyBag {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().iter().find(|(k, _)| k == name).map(|(_, v)| v.clone())
    }

    fn notifier(&self) -> Option<&Notifier> {
        Some(&self.notifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_reaches_every_listener() {
        let n = Notifier::new();
        let hits = Rc::new(RefCell::new(Vec::new()));
        let h = hits.clone();
        n.subscribe(move |p| h.borrow_mut().push(format!("a:{p}")));
        let h = hits.clone();
        n.subscribe(move |p| h.borrow_mut().push(format!("b:{p}")));
        n.notify("x");
        assert_eq!(*hits.borrow(), ["a:x", "b:x"]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let n = Notifier::new();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let id = n.subscribe(move |_| c.set(c.get() + 1));
        n.notify("x");
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
        n.notify("x");
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_dispatch() {
        let n = Rc::new(Notifier::new());
        let id_cell = Rc::new(Cell::new(None));
        let (n2, id2) = (n.clone(), id_cell.clone());
        let id = n.subscribe(move |_| {
            if let Some(id) = id2.get() {
                n2.unsubscribe(id);
            }
        });
        id_cell.set(Some(id));
        n.notify("x");
        assert_eq!(n.listener_count(), 0);
    }

    #[test]
    fn property_bag_set_notifies_name() {
        let bag = PropertyBag::new("Bag").with("a", 1);
        let seen = Rc::new(RefCell::new(String::new()));
        let s = seen.clone();
        bag.notifier().unwrap().subscribe(move |p| *s.borrow_mut() = p.to_string());
        bag.set("a", 2);
        assert_eq!(*seen.borrow(), "a");
        assert_eq!(bag.get("a"), Some(Value::Int(2)));
        assert_eq!(bag.get("missing"), None);
        bag.set("b", "new");
        assert_eq!(bag.names(), ["a", "b"]);
    }
}
