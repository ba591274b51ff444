//! Idle registrations, fired once the whole chain has drained.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

struct IdleLink {
    callback: Rc<dyn Fn()>,
    index: Cell<usize>,
    removed: Cell<bool>,
}

/// Ordered list of idle callbacks.
#[derive(Default)]
pub(crate) struct IdleList {
    links: RefCell<Vec<Rc<IdleLink>>>,
}

impl IdleList {
    pub(crate) fn add(self: &Rc<Self>, callback: Rc<dyn Fn()>) -> IdleSubscription {
        let mut links = self.links.borrow_mut();
        let link = Rc::new(IdleLink {
            callback,
            index: Cell::new(links.len()),
            removed: Cell::new(false),
        });
        links.push(Rc::clone(&link));

        IdleSubscription {
            link,
            list: Rc::downgrade(self),
        }
    }

    fn remove(&self, link: &Rc<IdleLink>) {
        let mut links = self.links.borrow_mut();
        let index = link.index.get();
        if !links.get(index).is_some_and(|l| Rc::ptr_eq(l, link)) {
            return;
        }

        links.remove(index);
        for (i, l) in links.iter().enumerate().skip(index) {
            l.index.set(i);
        }
    }

    pub(crate) fn clear(&self) {
        for link in self.links.borrow_mut().drain(..) {
            link.removed.set(true);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.links.borrow().len()
    }

    /// Invoke every registered callback in list order.
    ///
    /// Callbacks may add or remove idle subscriptions; additions wait for the
    /// next notification, removals take effect immediately.
    pub(crate) fn notify(&self) {
        let snapshot: Vec<Rc<IdleLink>> = self.links.borrow().clone();
        tracing::debug!(callbacks = snapshot.len(), "chain idle");

        for link in snapshot {
            if link.removed.get() {
                continue;
            }
            (link.callback)();
        }
    }
}

/// Handle to an idle registration.
pub struct IdleSubscription {
    link: Rc<IdleLink>,
    list: Weak<IdleList>,
}

impl IdleSubscription {
    /// Stop receiving idle notifications. Idempotent.
    pub fn unsubscribe(&self) {
        if self.link.removed.replace(true) {
            return;
        }
        if let Some(list) = self.list.upgrade() {
            list.remove(&self.link);
        }
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.link.removed.get()
    }
}

impl fmt::Debug for IdleSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleSubscription")
            .field("index", &self.link.index.get())
            .field("removed", &self.link.removed.get())
            .finish()
    }
}
