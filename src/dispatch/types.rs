//! Subscription types for the dispatch chain.

use crate::error::BusError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use super::engine::Chain;

/// Callback invoked for every command reaching a subscription.
pub(crate) type Callback<T> = Rc<dyn Fn(&T)>;

/// Buffering state of a subscription.
///
/// A paused subscription owns the queue of commands it intercepted.
pub(crate) enum BufferState<T> {
    Active,
    Paused(VecDeque<T>),
}

impl<T> BufferState<T> {
    pub(crate) fn is_paused(&self) -> bool {
        matches!(self, BufferState::Paused(_))
    }
}

/// Outcome of pushing one command through the chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// The command reached the end of the chain.
    Completed,
    /// A paused subscription captured the command.
    Buffered {
        /// Chain position of the capturing subscription.
        index: usize,
    },
}

/// One node of the dispatch chain.
pub(crate) struct Link<T> {
    pub(crate) priority: i64,
    /// Insertion order, breaks ties between equal priorities.
    pub(crate) seq: u64,
    pub(crate) index: Cell<usize>,
    pub(crate) callback: Callback<T>,
    pub(crate) buffer: RefCell<BufferState<T>>,
    pub(crate) draining: Cell<bool>,
    pub(crate) removed: Cell<bool>,
}

impl<T> Link<T> {
    pub(crate) fn new(callback: Callback<T>, priority: i64, seq: u64) -> Self {
        Self {
            priority,
            seq,
            index: Cell::new(0),
            callback,
            buffer: RefCell::new(BufferState::Active),
            draining: Cell::new(false),
            removed: Cell::new(false),
        }
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.buffer.borrow().is_paused()
    }

    /// Paused links and links replaying their buffer keep the chain busy.
    pub(crate) fn is_settled(&self) -> bool {
        !self.is_paused() && !self.draining.get()
    }

    /// Flag the link removed and drop anything it buffered.
    pub(crate) fn retire(&self) -> usize {
        self.removed.set(true);
        match self.buffer.replace(BufferState::Active) {
            BufferState::Paused(queue) => queue.len(),
            BufferState::Active => 0,
        }
    }
}

/// Handle to a subscription in the dispatch chain.
///
/// Cloning the handle is cheap; all clones refer to the same subscription.
pub struct Subscription<T> {
    pub(crate) link: Rc<Link<T>>,
    pub(crate) chain: Weak<Chain<T>>,
}

impl<T: 'static> Subscription<T> {
    /// Remove the subscription from the chain. Calling this more than once
    /// is a no-op.
    ///
    /// Commands buffered by a paused subscription are dropped.
    pub fn unsubscribe(&self) {
        if self.link.removed.get() {
            return;
        }

        let dropped = self.link.retire();
        if dropped > 0 {
            tracing::debug!(
                index = self.link.index.get(),
                dropped,
                "unsubscribed while paused, dropping buffered commands"
            );
        }

        if let Some(chain) = self.chain.upgrade() {
            chain.remove(&self.link);
        }
    }

    /// Start intercepting commands.
    ///
    /// From now on every command reaching this subscription is buffered here
    /// instead of flowing further down the chain. Pausing an already paused
    /// subscription keeps its current buffer.
    pub fn pause(&self) {
        if self.link.removed.get() {
            return;
        }

        let mut buffer = self.link.buffer.borrow_mut();
        if !buffer.is_paused() {
            *buffer = BufferState::Paused(VecDeque::new());
        }
    }

    /// Stop intercepting and replay every buffered command, in arrival
    /// order, into the part of the chain after this subscription.
    pub fn resume(&self) -> Result<(), BusError> {
        if self.link.removed.get() {
            return Err(BusError::Unsubscribed);
        }
        let chain = self.chain.upgrade().ok_or(BusError::Closed)?;
        chain.resume(&self.link)
    }

    pub fn is_paused(&self) -> bool {
        self.link.is_paused()
    }

    pub fn is_unsubscribed(&self) -> bool {
        self.link.removed.get()
    }

    /// True while `resume` is replaying this subscription's buffer.
    pub fn is_draining(&self) -> bool {
        self.link.draining.get()
    }

    pub fn priority(&self) -> i64 {
        self.link.priority
    }

    /// Current position in the chain.
    pub fn index(&self) -> usize {
        self.link.index.get()
    }

    /// Number of commands waiting in the buffer.
    pub fn buffered(&self) -> usize {
        match &*self.link.buffer.borrow() {
            BufferState::Paused(queue) => queue.len(),
            BufferState::Active => 0,
        }
    }
}

impl<T> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            link: Rc::clone(&self.link),
            chain: Weak::clone(&self.chain),
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("index", &self.link.index.get())
            .field("priority", &self.link.priority)
            .field("paused", &self.link.is_paused())
            .field("removed", &self.link.removed.get())
            .finish()
    }
}
