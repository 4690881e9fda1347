use std::cell::RefCell;
use std::rc::Rc;

use crate::list::ObservableList;
use crate::object::{Object, SubscriptionId};

/// A live listener registration the renderer installed.
pub(crate) enum Subscription {
    Object(Rc<dyn Object>, SubscriptionId),
    List(ObservableList, SubscriptionId),
    /// Everything one reactive binding watches; it re-subscribes on refresh.
    Nested(Rc<Subscriptions>),
}

impl Subscription {
    fn cancel(&self) {
        match self {
            Subscription::Object(object, id) => {
                if let Some(notifier) = object.notifier() {
                    notifier.unsubscribe(*id);
                }
            }
            Subscription::List(list, id) => {
                list.unsubscribe(*id);
            }
            Subscription::Nested(subs) => subs.cancel_all(),
        }
    }
}

/// Everything installed for one rendered subtree, cancelled together when
/// the subtree goes away.
#[derive(Default)]
pub(crate) struct Subscriptions(RefCell<Vec<Subscription>>);

impl Subscriptions {
    pub(crate) fn add(&self, sub: Subscription) {
        self.0.borrow_mut().push(sub);
    }

    pub(crate) fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub(crate) fn cancel_all(&self) {
        let subs = std::mem::take(&mut *self.0.borrow_mut());
        for sub in &subs {
            sub.cancel();
        }
    }
}
