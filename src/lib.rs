//! # Whiteboard
//!
//! Core of an interactive whiteboard: a model kept in sync with drawing
//! tools through a priority-ranked, pausable command bus.
//!
//! ## Core Concepts
//!
//! - **Dispatcher**: ordered chain of subscribers, highest priority first
//! - **Pause/resume**: a paused subscriber intercepts and buffers commands,
//!   replaying them downstream when it resumes
//! - **Idle**: callbacks fired once nothing in the chain is paused or draining
//! - **Command bus**: gates root commands so a burst issued within one
//!   scheduler tick is serialized instead of interleaved
//!
//! ## Example
//!
//! ```
//! use std::rc::Rc;
//! use whiteboard::{Command, TickQueue, Whiteboard, WhiteboardConfig};
//!
//! let ticks = Rc::new(TickQueue::new());
//! let board = Whiteboard::open(Rc::clone(&ticks), WhiteboardConfig::default())?;
//!
//! board.bus().root(Command::foreground_color("#000000"));
//! board.bus().root(Command::select_tool("Line")); // held until the next tick
//! ticks.run_until_idle()?;
//!
//! assert_eq!(board.model().selected_tool, "Line");
//! # Ok::<(), whiteboard::WhiteboardError>(())
//! ```

pub mod bus;
pub mod dispatch;
pub mod error;
pub mod scheduler;
pub mod whiteboard;

// Re-exports
pub use bus::{BusConfig, CommandBus, WeakCommandBus, DEFAULT_PRIORITY};
pub use dispatch::{Dispatched, Dispatcher, IdleSubscription, Subscription};
pub use error::{BusError, Result, WhiteboardError};
pub use scheduler::{Scheduler, Task, TickQueue, DEFAULT_MAX_TICKS};
pub use whiteboard::{
    CanvasTool, Command, CommandLogger, CommandPriority, FileStorage, MemoryStorage, Model,
    ModelController, ModelPersistence, ModelStorage, SharedModel, StorageConfig, Tool,
    ToolController, Whiteboard, WhiteboardBus, WhiteboardConfig,
};
