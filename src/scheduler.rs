//! Deferred execution for the bus.
//!
//! The bus never blocks. Work that must happen "after the current command
//! has finished" is handed to a [`Scheduler`], which runs it on a later turn
//! of the host's loop.

use crate::error::BusError;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + 'static>;

/// Runs tasks after the current synchronous work unwinds.
pub trait Scheduler {
    /// Queue `task` for a later tick. Must not run it inline.
    fn defer(&self, task: Task);
}

/// Default bound for [`TickQueue::run_until_idle`].
pub const DEFAULT_MAX_TICKS: usize = 1024;

/// Cooperative next-tick queue driven by the host.
///
/// Each call to [`TickQueue::run_tick`] runs the tasks queued before it;
/// anything deferred while those run waits for the following tick.
pub struct TickQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    max_ticks: usize,
}

impl TickQueue {
    pub fn new() -> Self {
        Self::with_max_ticks(DEFAULT_MAX_TICKS)
    }

    pub fn with_max_ticks(max_ticks: usize) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            max_ticks,
        }
    }

    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }

    /// Run one tick. Returns how many tasks ran.
    pub fn run_tick(&self) -> usize {
        let due = self.receiver.len();
        let mut ran = 0;

        while ran < due {
            match self.receiver.try_recv() {
                Ok(task) => {
                    task();
                    ran += 1;
                }
                Err(_) => break,
            }
        }

        if ran > 0 {
            tracing::trace!(ran, left = self.receiver.len(), "tick");
        }
        ran
    }

    /// Run ticks until nothing is queued. Returns the number of ticks.
    pub fn run_until_idle(&self) -> Result<usize, BusError> {
        let mut ticks = 0;
        while !self.receiver.is_empty() {
            if ticks == self.max_ticks {
                return Err(BusError::TickLimitExceeded(self.max_ticks));
            }
            self.run_tick();
            ticks += 1;
        }
        Ok(ticks)
    }
}

impl Default for TickQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TickQueue {
    fn defer(&self, task: Task) {
        // The queue owns a receiver, so the channel never disconnects.
        let _ = self.sender.send(task);
    }
}

impl<S: Scheduler + ?Sized> Scheduler for std::rc::Rc<S> {
    fn defer(&self, task: Task) {
        (**self).defer(task)
    }
}
