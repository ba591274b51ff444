//! Command bus: the public façade over the dispatch chain.
//!
//! The bus owns a standing "gate" subscription at the front of the chain.
//! The first [`CommandBus::root`] call of a scheduler tick closes the gate
//! and asks the scheduler to reopen it on the next tick. Root commands issued
//! while the gate is closed (typically from inside a subscriber reacting to
//! the first one) are captured there and replayed, in order, once it opens.
//! A root command issued while the gate is replaying closes it again and
//! waits for the following tick.

use crate::dispatch::{Dispatched, Dispatcher, IdleSubscription, Subscription};
use crate::error::BusError;
use crate::scheduler::Scheduler;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Priority used when the caller has no preference.
pub const DEFAULT_PRIORITY: i64 = 0;

/// Bus configuration.
#[derive(Clone, Debug)]
pub struct BusConfig {
    /// Priority of the gate subscription. Must stay above every other
    /// subscriber for root serialization to hold.
    /// Default: i64::MAX
    pub gate_priority: i64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            gate_priority: i64::MAX,
        }
    }
}

struct BusInner<T> {
    dispatcher: Dispatcher<T>,
    gate: RefCell<Subscription<T>>,
    /// Set by explicit `pause()`, cleared by `resume()`.
    paused: Rc<Cell<bool>>,
    scheduler: Rc<dyn Scheduler>,
    config: BusConfig,
}

/// Shared command bus.
///
/// Cloning is cheap and every clone drives the same chain, so the bus can be
/// handed to each collaborator as an explicit context object.
pub struct CommandBus<T> {
    inner: Rc<BusInner<T>>,
}

impl<T: 'static> CommandBus<T> {
    /// Create a bus with the default configuration.
    pub fn new<S: Scheduler + 'static>(scheduler: S) -> Self {
        Self::with_config(scheduler, BusConfig::default())
    }

    /// Create a bus with a custom configuration.
    pub fn with_config<S: Scheduler + 'static>(scheduler: S, config: BusConfig) -> Self {
        let dispatcher = Dispatcher::new();
        let gate = dispatcher.subscribe(|_: &T| {}, config.gate_priority);

        Self {
            inner: Rc::new(BusInner {
                dispatcher,
                gate: RefCell::new(gate),
                paused: Rc::new(Cell::new(false)),
                scheduler: Rc::new(scheduler),
                config,
            }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.inner.config
    }

    /// Register a subscriber. See [`Dispatcher::subscribe`].
    pub fn subscribe<F>(&self, callback: F, priority: i64) -> Subscription<T>
    where
        F: Fn(&T) + 'static,
    {
        self.inner.dispatcher.subscribe(callback, priority)
    }

    /// Register an idle callback. See [`Dispatcher::add_idle`].
    pub fn add_idle<F>(&self, callback: F) -> IdleSubscription
    where
        F: Fn() + 'static,
    {
        self.inner.dispatcher.add_idle(callback)
    }

    /// Inject an externally originated command.
    pub fn root(&self, command: T) -> Dispatched {
        let gate = self.gate();

        if gate.is_paused() {
            tracing::debug!("gate closed, deferring root command");
            return self.inner.dispatcher.dispatch(0, command);
        }

        gate.pause();
        self.schedule_release(gate.clone());

        // The gate is replaying earlier root commands; this one waits behind them.
        if gate.is_draining() {
            tracing::debug!("gate draining, deferring root command");
            return self.inner.dispatcher.dispatch(0, command);
        }

        // This command opened the tick, it goes straight past the gate.
        self.inner.dispatcher.dispatch(gate.index() + 1, command)
    }

    /// Inject a command at an arbitrary chain position, bypassing the gate
    /// when `start` is past it.
    pub fn dispatch_from(&self, start: usize, command: T) -> Dispatched {
        self.inner.dispatcher.dispatch(start, command)
    }

    /// Hold every root command at the gate until [`CommandBus::resume`].
    pub fn pause(&self) {
        self.inner.paused.set(true);
        self.gate().pause();
    }

    /// Reopen the gate and replay whatever it held.
    pub fn resume(&self) -> Result<(), BusError> {
        self.inner.paused.set(false);
        self.gate().resume()
    }

    /// True between `pause()` and `resume()`.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.get()
    }

    /// True while root commands are being held, either by an explicit pause
    /// or until the current tick ends.
    pub fn is_gate_closed(&self) -> bool {
        self.gate().is_paused()
    }

    /// Drop every subscription and install a fresh gate.
    pub fn remove_all_subscriptions(&self) {
        self.inner.dispatcher.remove_all_subscriptions();

        let gate = self
            .inner
            .dispatcher
            .subscribe(|_: &T| {}, self.inner.config.gate_priority);
        *self.inner.gate.borrow_mut() = gate;
        self.inner.paused.set(false);
    }

    /// Number of subscribers, the gate included.
    pub fn subscriber_count(&self) -> usize {
        self.inner.dispatcher.len()
    }

    pub fn dispatcher(&self) -> &Dispatcher<T> {
        &self.inner.dispatcher
    }

    /// Non-owning handle, for callbacks that must not keep the bus alive.
    pub fn downgrade(&self) -> WeakCommandBus<T> {
        WeakCommandBus {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn gate(&self) -> Subscription<T> {
        self.inner.gate.borrow().clone()
    }

    fn schedule_release(&self, gate: Subscription<T>) {
        let paused = Rc::clone(&self.inner.paused);

        self.inner.scheduler.defer(Box::new(move || {
            if paused.get() {
                tracing::trace!("bus paused, gate stays closed");
                return;
            }
            // Replaced by remove_all, or reopened by an explicit resume.
            if gate.is_unsubscribed() || !gate.is_paused() {
                return;
            }
            if let Err(e) = gate.resume() {
                tracing::warn!(error = %e, "failed to reopen gate");
            }
        }));
    }
}

impl<T> Clone for CommandBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for CommandBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandBus")
            .field("subscribers", &self.subscriber_count())
            .field("paused", &self.is_paused())
            .field("gate_closed", &self.is_gate_closed())
            .finish()
    }
}

/// Weak reference to a [`CommandBus`].
pub struct WeakCommandBus<T> {
    inner: Weak<BusInner<T>>,
}

impl<T> WeakCommandBus<T> {
    pub fn upgrade(&self) -> Option<CommandBus<T>> {
        self.inner.upgrade().map(|inner| CommandBus { inner })
    }
}

impl<T> Clone for WeakCommandBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}
