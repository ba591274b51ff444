//! Command dispatch chain.
//!
//! Commands travel through subscriptions ordered by descending priority.
//! Any subscription can pause itself to become an interceptor:
//! - the command that reached it is buffered there
//! - lower-priority subscriptions do not see it
//! - on resume, buffered commands replay in arrival order starting right
//!   after the resumed subscription
//!
//! Idle callbacks fire after a resume leaves nothing paused or draining.
//!
//! # Example
//!
//! ```
//! use whiteboard::Dispatcher;
//!
//! let dispatcher = Dispatcher::new();
//! let gate = dispatcher.subscribe(|cmd: &u32| println!("gate saw {cmd}"), 10);
//! dispatcher.subscribe(|cmd: &u32| println!("tail saw {cmd}"), 0);
//!
//! gate.pause();
//! dispatcher.dispatch(0, 1); // buffered at the gate
//! gate.resume().unwrap(); // tail sees 1
//! ```

mod engine;
mod idle;
mod types;

pub use engine::Dispatcher;
pub use idle::IdleSubscription;
pub use types::{Dispatched, Subscription};
