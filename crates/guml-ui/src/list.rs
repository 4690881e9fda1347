//! Observable lists, the data source of `each` blocks.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::object::SubscriptionId;
use crate::value::Value;

/// One structural change, carrying the affected index and element.
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange {
    /// Appended at `index == len - 1`.
    Add { index: usize, value: Value },
    /// Inserted before the element previously at `index`.
    Insert { index: usize, value: Value },
    Remove { index: usize, value: Value },
}

impl ListChange {
    pub fn index(&self) -> usize {
        match self {
            ListChange::Add { index, .. } | ListChange::Insert { index, .. } | ListChange::Remove { index, .. } => *index,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            ListChange::Add { value, .. } | ListChange::Insert { value, .. } | ListChange::Remove { value, .. } => value,
        }
    }

    /// The two-state view of a change: removal, or some kind of addition.
    pub fn is_remove(&self) -> bool {
        matches!(self, ListChange::Remove { .. })
    }
}

type ListListener = Rc<dyn Fn(&ListChange)>;

#[derive(Default)]
struct Inner {
    items: RefCell<Vec<Value>>,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, ListListener)>>,
}

/// A shared, ordered list of [`Value`]s that announces every structural change.
///
/// Cloning shares the list. Listeners run synchronously after the change is
/// applied, so they observe the new contents.
#[derive(Clone, Default)]
pub struct ObservableList(Rc<Inner>);

impl ObservableList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    pub fn push(&self, value: impl Into<Value>) {
        let value = value.into();
        let index = {
            let mut items = self.0.items.borrow_mut();
            items.push(value.clone());
            items.len() - 1
        };
        self.emit(&ListChange::Add { index, value });
    }

    pub fn extend<I: IntoIterator<Item = V>, V: Into<Value>>(&self, values: I) {
        for v in values {
            self.push(v);
        }
    }

    /// Insert before `index`; `index == len` appends and is reported as `Add`.
    ///
    /// # Panics
    /// If `index > len`.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let len = self.len();
        assert!(index <= len, "insert index {index} out of bounds for list of length {len}");
        if index == len {
            return self.push(value);
        }
        self.0.items.borrow_mut().insert(index, value.clone());
        self.emit(&ListChange::Insert { index, value });
    }

    /// Remove the element at `index`, or `None` if out of bounds.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let value = {
            let mut items = self.0.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            items.remove(index)
        };
        self.emit(&ListChange::Remove { index, value: value.clone() });
        Some(value)
    }

    /// Remove the first element equal to `value`.
    pub fn remove_item(&self, value: &Value) -> bool {
        let position = self.0.items.borrow().iter().position(|v| v == value);
        match position {
            Some(i) => self.remove(i).is_some(),
            None => false,
        }
    }

    /// Drop everything from `len` on, last element first.
    pub fn truncate(&self, len: usize) {
        while self.len() > len {
            self.remove(self.len() - 1);
        }
    }

    pub fn clear(&self) {
        self.truncate(0);
    }

    pub fn subscribe(&self, listener: impl Fn(&ListChange) + 'static) -> SubscriptionId {
        let id = SubscriptionId::next(&self.0.next_id);
        self.0.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        // The listener may own the last handle to state whose drop
        // unsubscribes again, so release the borrow first.
        let removed = {
            let mut listeners = self.0.listeners.borrow_mut();
            let at = listeners.iter().position(|(i, _)| *i == id);
            at.map(|at| listeners.remove(at))
        };
        removed.is_some()
    }

    pub fn listener_count(&self) -> usize {
        self.0.listeners.borrow().len()
    }

    /// `true` if both handles share one list.
    pub fn ptr_eq(&self, other: &ObservableList) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn emit(&self, change: &ListChange) {
        let snapshot: Vec<ListListener> = self.0.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            listener(change);
        }
    }
}

impl<V: Into<Value>> FromIterator<V> for ObservableList {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let list = ObservableList::new();
        list.0.items.borrow_mut().extend(iter.into_iter().map(Into::into));
        list
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.items.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(list: &ObservableList) -> Rc<RefCell<Vec<ListChange>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        list.subscribe(move |c| l.borrow_mut().push(c.clone()));
        log
    }

    #[test]
    fn push_and_insert_report_positions() {
        let list: ObservableList = ["a", "c"].into_iter().collect();
        let log = recorded(&list);
        list.insert(1, "b");
        list.push("d");
        list.insert(4, "e");
        assert_eq!(
            *log.borrow(),
            [
                ListChange::Insert { index: 1, value: "b".into() },
                ListChange::Add { index: 3, value: "d".into() },
                ListChange::Add { index: 4, value: "e".into() },
            ]
        );
        assert_eq!(list.len(), 5);
    }

    #[test]
    fn bulk_removal_runs_back_to_front() {
        let list: ObservableList = [1, 2, 3].into_iter().collect();
        let log = recorded(&list);
        list.clear();
        let indices: Vec<_> = log.borrow().iter().map(ListChange::index).collect();
        assert_eq!(indices, [2, 1, 0]);
        assert!(log.borrow().iter().all(ListChange::is_remove));
        assert!(list.is_empty());
    }

    #[test]
    fn remove_item_and_out_of_bounds() {
        let list: ObservableList = [1, 2, 3].into_iter().collect();
        assert!(list.remove_item(&Value::Int(2)));
        assert!(!list.remove_item(&Value::Int(9)));
        assert_eq!(list.remove(7), None);
        assert_eq!(list.to_vec(), [Value::Int(1), Value::Int(3)]);
    }

    #[test]
    fn listener_sees_applied_change() {
        let list = ObservableList::new();
        let observed = Rc::new(Cell::new(0));
        let (l, o) = (list.clone(), observed.clone());
        list.subscribe(move |_| o.set(l.len()));
        list.push(1);
        assert_eq!(observed.get(), 1);
    }

    #[test]
    fn unsubscribe() {
        let list = ObservableList::new();
        let id = list.subscribe(|_| {});
        assert_eq!(list.listener_count(), 1);
        assert!(list.unsubscribe(id));
        assert_eq!(list.listener_count(), 0);
    }
}
