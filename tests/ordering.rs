//! Property tests for chain ordering.

use proptest::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use whiteboard::{Dispatched, Dispatcher, Subscription};

proptest! {
    /// Delivery order is descending priority, ties in subscribe order.
    #[test]
    fn prop_delivery_order(priorities in prop::collection::vec(-5i64..5, 0..40)) {
        let dispatcher: Dispatcher<()> = Dispatcher::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (id, priority) in priorities.iter().enumerate() {
            let order = Rc::clone(&order);
            dispatcher.subscribe(move |_| order.borrow_mut().push(id), *priority);
        }

        prop_assert_eq!(dispatcher.dispatch(0, ()), Dispatched::Completed);

        let mut expected: Vec<usize> = (0..priorities.len()).collect();
        expected.sort_by_key(|&id| (std::cmp::Reverse(priorities[id]), id));
        prop_assert_eq!(&*order.borrow(), &expected);
    }

    /// Indices stay a dense 0..n permutation through arbitrary removals.
    #[test]
    fn prop_indices_dense_after_removals(
        priorities in prop::collection::vec(-3i64..3, 1..30),
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..30),
    ) {
        let dispatcher: Dispatcher<()> = Dispatcher::new();
        let mut live: Vec<Subscription<()>> = priorities
            .iter()
            .map(|p| dispatcher.subscribe(|_| {}, *p))
            .collect();

        for pick in removals {
            if live.is_empty() {
                break;
            }
            let sub = live.remove(pick.index(live.len()));
            sub.unsubscribe();
        }

        prop_assert_eq!(dispatcher.len(), live.len());
        let mut indices: Vec<usize> = live.iter().map(|s| s.index()).collect();
        indices.sort_unstable();
        prop_assert_eq!(indices, (0..live.len()).collect::<Vec<_>>());
    }
}
