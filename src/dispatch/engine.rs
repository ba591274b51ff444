//! Dispatch engine: the ordered, pausable chain of subscriptions.

use crate::error::BusError;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::rc::Rc;

use super::idle::{IdleList, IdleSubscription};
use super::types::{BufferState, Dispatched, Link, Subscription};

/// Shared state behind a [`Dispatcher`] and its handles.
pub(crate) struct Chain<T> {
    /// Sorted by descending priority, then insertion order.
    links: RefCell<Vec<Rc<Link<T>>>>,
    next_seq: Cell<u64>,
    idle: Rc<IdleList>,
}

impl<T: 'static> Chain<T> {
    fn new() -> Self {
        Self {
            links: RefCell::new(Vec::new()),
            next_seq: Cell::new(0),
            idle: Rc::new(IdleList::default()),
        }
    }

    fn insert(&self, link: Rc<Link<T>>) {
        let mut links = self.links.borrow_mut();
        links.push(link);
        links.sort_by_key(|l| (Reverse(l.priority), l.seq));

        for (i, l) in links.iter().enumerate() {
            l.index.set(i);
        }
    }

    pub(crate) fn remove(&self, link: &Rc<Link<T>>) {
        let mut links = self.links.borrow_mut();
        let index = link.index.get();
        if !links.get(index).is_some_and(|l| Rc::ptr_eq(l, link)) {
            // Already gone, e.g. cleared by remove_all.
            return;
        }

        links.remove(index);
        for (i, l) in links.iter().enumerate().skip(index) {
            l.index.set(i);
        }
    }

    fn clear(&self) {
        for link in self.links.borrow_mut().drain(..) {
            link.retire();
        }
        self.idle.clear();
    }

    /// Push `command` through the chain starting at `start`.
    ///
    /// Iterates over a snapshot, so subscriptions added by callbacks only see
    /// later commands. Removed links are skipped. A link that is paused once
    /// its callback returns captures the command and ends the traversal.
    pub(crate) fn dispatch(&self, start: usize, command: T) -> Dispatched {
        let snapshot: Vec<Rc<Link<T>>> = self.links.borrow().iter().skip(start).cloned().collect();

        for link in snapshot {
            if link.removed.get() {
                continue;
            }

            tracing::trace!(index = link.index.get(), priority = link.priority, "deliver");
            (link.callback)(&command);

            let mut buffer = link.buffer.borrow_mut();
            if let BufferState::Paused(queue) = &mut *buffer {
                queue.push_back(command);
                let index = link.index.get();
                tracing::debug!(index, buffered = queue.len(), "command captured");
                return Dispatched::Buffered { index };
            }
        }

        Dispatched::Completed
    }

    pub(crate) fn resume(&self, link: &Rc<Link<T>>) -> Result<(), BusError> {
        // Unpause before replaying so downstream callbacks see this link active.
        let queue = match link.buffer.replace(BufferState::Active) {
            BufferState::Paused(queue) => queue,
            BufferState::Active => return Err(BusError::NotPaused(link.index.get())),
        };

        tracing::debug!(
            index = link.index.get(),
            buffered = queue.len(),
            "resuming subscription"
        );

        link.draining.set(true);
        for command in queue {
            if link.removed.get() {
                tracing::debug!("subscription removed while draining, dropping the rest");
                break;
            }
            self.dispatch(link.index.get() + 1, command);
        }
        link.draining.set(false);

        self.after_resume();
        Ok(())
    }

    fn after_resume(&self) {
        let settled = self.links.borrow().iter().all(|l| l.is_settled());
        if settled {
            self.idle.notify();
        }
    }
}

/// Priority-ordered chain of command subscribers.
///
/// Subscribers run synchronously in descending priority, ties in subscribe
/// order. Any subscriber may pause itself to intercept commands and resume
/// later to replay them into the rest of the chain.
///
/// The dispatcher is single-threaded; callbacks may freely re-enter it.
pub struct Dispatcher<T> {
    chain: Rc<Chain<T>>,
}

impl<T: 'static> Dispatcher<T> {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            chain: Rc::new(Chain::new()),
        }
    }

    /// Register `callback` at `priority`. Higher priorities run first.
    pub fn subscribe<F>(&self, callback: F, priority: i64) -> Subscription<T>
    where
        F: Fn(&T) + 'static,
    {
        let seq = self.chain.next_seq.get();
        self.chain.next_seq.set(seq + 1);

        let link = Rc::new(Link::new(Rc::new(callback), priority, seq));
        self.chain.insert(Rc::clone(&link));

        Subscription {
            link,
            chain: Rc::downgrade(&self.chain),
        }
    }

    /// Register a callback fired whenever a resume leaves the whole chain
    /// with nothing paused and nothing draining.
    pub fn add_idle<F>(&self, callback: F) -> IdleSubscription
    where
        F: Fn() + 'static,
    {
        self.chain.idle.add(Rc::new(callback))
    }

    /// Drop every subscription and idle registration. Outstanding handles
    /// become inert.
    pub fn remove_all_subscriptions(&self) {
        self.chain.clear();
    }

    /// Push `command` through the chain starting at position `start`.
    pub fn dispatch(&self, start: usize, command: T) -> Dispatched {
        self.chain.dispatch(start, command)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.chain.links.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn idle_len(&self) -> usize {
        self.chain.idle.len()
    }

    /// True when no subscription is paused or draining.
    pub fn is_idle(&self) -> bool {
        self.chain.links.borrow().iter().all(|l| l.is_settled())
    }
}

impl<T: 'static> Default for Dispatcher<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::OnceCell;

    type Log = Rc<RefCell<Vec<(&'static str, u32)>>>;

    fn recorder(log: &Log, name: &'static str) -> impl Fn(&u32) + 'static {
        let log = Rc::clone(log);
        move |cmd: &u32| log.borrow_mut().push((name, *cmd))
    }

    /// Subscriber that pauses itself on every command it sees.
    fn pausing(
        dispatcher: &Dispatcher<u32>,
        log: &Log,
        name: &'static str,
        priority: i64,
    ) -> Subscription<u32> {
        let slot: Rc<OnceCell<Subscription<u32>>> = Rc::new(OnceCell::new());
        let handle = {
            let slot = Rc::clone(&slot);
            let log = Rc::clone(log);
            dispatcher.subscribe(
                move |cmd: &u32| {
                    log.borrow_mut().push((name, *cmd));
                    if let Some(sub) = slot.get() {
                        sub.pause();
                    }
                },
                priority,
            )
        };
        let _ = slot.set(handle.clone());
        handle
    }

    #[test]
    fn test_priority_order_with_stable_ties() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        dispatcher.subscribe(recorder(&log, "a"), 5);
        dispatcher.subscribe(recorder(&log, "b"), 1);
        dispatcher.subscribe(recorder(&log, "c"), 5);
        dispatcher.subscribe(recorder(&log, "d"), 3);

        assert_eq!(dispatcher.dispatch(0, 7), Dispatched::Completed);

        let order: Vec<_> = log.borrow().iter().map(|(n, _)| *n).collect();
        assert_eq!(order, vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_indices_stay_dense() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let low = dispatcher.subscribe(|_| {}, 1);
        let high = dispatcher.subscribe(|_| {}, 9);
        let mid = dispatcher.subscribe(|_| {}, 5);

        assert_eq!((high.index(), mid.index(), low.index()), (0, 1, 2));

        high.unsubscribe();
        assert_eq!((mid.index(), low.index()), (0, 1));
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_pause_stops_propagation() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        dispatcher.subscribe(recorder(&log, "a"), 3);
        let b = pausing(&dispatcher, &log, "b", 2);
        dispatcher.subscribe(recorder(&log, "c"), 1);

        let outcome = dispatcher.dispatch(0, 1);

        assert_eq!(outcome, Dispatched::Buffered { index: 1 });
        assert_eq!(*log.borrow(), vec![("a", 1), ("b", 1)]);
        assert!(b.is_paused());
        assert_eq!(b.buffered(), 1);
    }

    #[test]
    fn test_resume_replays_downstream_once_in_order() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        dispatcher.subscribe(recorder(&log, "a"), 3);
        let b = pausing(&dispatcher, &log, "b", 2);
        dispatcher.subscribe(recorder(&log, "c"), 1);

        dispatcher.dispatch(0, 1);
        dispatcher.dispatch(0, 2);
        dispatcher.dispatch(0, 3);
        log.borrow_mut().clear();

        b.resume().unwrap();

        assert_eq!(*log.borrow(), vec![("c", 1), ("c", 2), ("c", 3)]);
        assert!(!b.is_paused());
    }

    #[test]
    fn test_resume_when_active_fails() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let sub = dispatcher.subscribe(|_| {}, 0);

        assert_eq!(sub.resume(), Err(BusError::NotPaused(0)));
    }

    #[test]
    fn test_pause_twice_keeps_buffer() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        let sub = dispatcher.subscribe(recorder(&log, "gate"), 1);
        dispatcher.subscribe(recorder(&log, "tail"), 0);

        sub.pause();
        dispatcher.dispatch(0, 1);
        sub.pause();
        assert_eq!(sub.buffered(), 1);

        sub.resume().unwrap();
        assert_eq!(log.borrow().last(), Some(&("tail", 1)));
    }

    #[test]
    fn test_subscribe_during_dispatch_waits_for_next_command() {
        let dispatcher: Rc<Dispatcher<u32>> = Rc::new(Dispatcher::new());
        let log: Log = Rc::default();

        {
            let inner = Rc::downgrade(&dispatcher);
            let log = Rc::clone(&log);
            let added = Cell::new(false);
            dispatcher.subscribe(
                move |_cmd: &u32| {
                    if added.replace(true) {
                        return;
                    }
                    if let Some(d) = inner.upgrade() {
                        d.subscribe(recorder(&log, "late"), -1);
                    }
                },
                0,
            );
        }

        dispatcher.dispatch(0, 1);
        assert!(log.borrow().is_empty());

        dispatcher.dispatch(0, 2);
        assert_eq!(*log.borrow(), vec![("late", 2)]);
    }

    #[test]
    fn test_unsubscribe_during_dispatch_skips_later_entry() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        let victim_slot: Rc<OnceCell<Subscription<u32>>> = Rc::new(OnceCell::new());
        {
            let slot = Rc::clone(&victim_slot);
            dispatcher.subscribe(
                move |_cmd: &u32| {
                    if let Some(victim) = slot.get() {
                        victim.unsubscribe();
                    }
                },
                2,
            );
        }
        let victim = dispatcher.subscribe(recorder(&log, "victim"), 1);
        let _ = victim_slot.set(victim.clone());
        dispatcher.subscribe(recorder(&log, "tail"), 0);

        dispatcher.dispatch(0, 1);

        assert_eq!(*log.borrow(), vec![("tail", 1)]);
        assert!(victim.is_unsubscribed());
        assert_eq!(dispatcher.len(), 2);
    }

    #[test]
    fn test_unsubscribe_paused_drops_buffer() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        let sub = dispatcher.subscribe(recorder(&log, "gate"), 1);
        dispatcher.subscribe(recorder(&log, "tail"), 0);

        sub.pause();
        dispatcher.dispatch(0, 1);
        sub.unsubscribe();

        assert_eq!(sub.buffered(), 0);
        assert_eq!(sub.resume(), Err(BusError::Unsubscribed));
        assert_eq!(dispatcher.dispatch(0, 2), Dispatched::Completed);
        assert_eq!(log.borrow().last(), Some(&("tail", 2)));
    }

    #[test]
    fn test_idle_fires_only_on_full_drain() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let idle_hits = Rc::new(Cell::new(0));
        {
            let idle_hits = Rc::clone(&idle_hits);
            dispatcher.add_idle(move || idle_hits.set(idle_hits.get() + 1));
        }

        let first = dispatcher.subscribe(|_| {}, 2);
        let second = dispatcher.subscribe(|_| {}, 1);

        first.pause();
        second.pause();
        dispatcher.dispatch(0, 1);

        first.resume().unwrap();
        assert_eq!(idle_hits.get(), 0);
        assert!(!dispatcher.is_idle());

        second.resume().unwrap();
        assert_eq!(idle_hits.get(), 1);
        assert!(dispatcher.is_idle());
    }

    #[test]
    fn test_idle_waits_for_outer_drain() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let idle_hits = Rc::new(Cell::new(0));
        {
            let idle_hits = Rc::clone(&idle_hits);
            dispatcher.add_idle(move || idle_hits.set(idle_hits.get() + 1));
        }

        let inner_slot: Rc<OnceCell<Subscription<u32>>> = Rc::new(OnceCell::new());
        let outer = dispatcher.subscribe(|_| {}, 2);
        {
            let slot = Rc::clone(&inner_slot);
            let hits = Rc::clone(&idle_hits);
            let inner = dispatcher.subscribe(
                move |_cmd: &u32| {
                    // Resumed from inside the outer drain: no idle yet.
                    if let Some(sub) = slot.get() {
                        if sub.is_paused() {
                            sub.resume().unwrap();
                            assert_eq!(hits.get(), 0);
                        }
                    }
                },
                1,
            );
            let _ = inner_slot.set(inner);
        }

        outer.pause();
        dispatcher.dispatch(0, 1);
        inner_slot.get().unwrap().pause();

        outer.resume().unwrap();
        assert_eq!(idle_hits.get(), 1);
    }

    #[test]
    fn test_remove_all_resets() {
        let dispatcher: Dispatcher<u32> = Dispatcher::new();
        let log: Log = Rc::default();

        let old = dispatcher.subscribe(recorder(&log, "old"), 0);
        let idle = dispatcher.add_idle(|| {});
        dispatcher.remove_all_subscriptions();

        assert!(dispatcher.is_empty());
        assert_eq!(dispatcher.idle_len(), 0);
        assert!(old.is_unsubscribed());
        assert!(idle.is_unsubscribed());

        let fresh = dispatcher.subscribe(recorder(&log, "new"), 0);
        old.unsubscribe();
        assert_eq!(fresh.index(), 0);

        dispatcher.dispatch(0, 4);
        assert_eq!(*log.borrow(), vec![("new", 4)]);
    }
}
