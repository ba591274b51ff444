//! Whiteboard application layer.
//!
//! Everything here is a consumer of the command bus:
//! - [`ModelController`] applies commands to the shared [`Model`]
//! - [`ToolController`] switches the active drawing tool
//! - [`ModelPersistence`] saves the model whenever the bus goes idle
//! - [`CommandLogger`] traces every command
//!
//! [`Whiteboard`] wires them to one bus.

mod command;
mod logging;
mod model;
mod model_controller;
mod storage;
mod tools;

pub use command::{Command, CommandPriority, WhiteboardBus};
pub use logging::CommandLogger;
pub use model::{shared, Model, SharedModel, DEFAULT_FOREGROUND_COLOR};
pub use model_controller::{apply, ModelController};
pub use storage::{
    FileStorage, MemoryStorage, ModelPersistence, ModelStorage, StorageConfig,
    DEFAULT_STORAGE_KEY,
};
pub use tools::{default_tools, CanvasTool, Tool, ToolController, DELETE, FREEHAND, LINE, SELECT};

use crate::bus::BusConfig;
use crate::error::{Result, WhiteboardError};
use crate::scheduler::Scheduler;
use std::rc::Rc;

/// Whiteboard configuration.
#[derive(Clone, Debug)]
pub struct WhiteboardConfig {
    /// Bus settings.
    pub bus: BusConfig,

    /// Where to persist the model (None = in memory only).
    pub storage: Option<StorageConfig>,

    /// Trace every command.
    pub log_commands: bool,
}

impl Default for WhiteboardConfig {
    fn default() -> Self {
        Self {
            bus: BusConfig::default(),
            storage: None,
            log_commands: true,
        }
    }
}

/// A running whiteboard: bus, model and the subscribers keeping them in sync.
pub struct Whiteboard {
    bus: WhiteboardBus,
    model: SharedModel,
    storage: Rc<dyn ModelStorage>,
    model_controller: ModelController,
    tools: ToolController,
    persistence: ModelPersistence,
    logger: CommandLogger,
}

impl Whiteboard {
    /// Build the whiteboard, restoring the stored model if there is one.
    pub fn open<S: Scheduler + 'static>(scheduler: S, config: WhiteboardConfig) -> Result<Self> {
        let storage: Rc<dyn ModelStorage> = match config.storage {
            Some(storage) => Rc::new(FileStorage::new(storage)),
            None => Rc::new(MemoryStorage::new()),
        };
        Self::with_storage(scheduler, config.bus, config.log_commands, storage)
    }

    /// Build the whiteboard on top of an existing storage backend.
    pub fn with_storage<S: Scheduler + 'static>(
        scheduler: S,
        bus_config: BusConfig,
        log_commands: bool,
        storage: Rc<dyn ModelStorage>,
    ) -> Result<Self> {
        let bus = WhiteboardBus::with_config(scheduler, bus_config);

        let initial = match storage.load() {
            Ok(model) => model,
            Err(WhiteboardError::ModelNotFound(_)) => Model::empty(),
            Err(e) => return Err(e),
        };
        let selected_tool = initial.selected_tool.clone();
        let model = shared(initial);

        let mut model_controller = ModelController::new(Rc::clone(&model));
        model_controller.start(&bus);

        let mut tools = ToolController::new();
        if let Err(e) = tools.init_with(&bus, &selected_tool) {
            tracing::warn!(error = %e, "stored tool unavailable, falling back to freehand");
            tools.init(&bus)?;
            model.borrow_mut().selected_tool = FREEHAND.to_string();
        }

        let mut persistence = ModelPersistence::new();
        persistence.start_storing(&bus, Rc::clone(&model), Rc::clone(&storage));

        let mut logger = CommandLogger::new();
        if log_commands {
            logger.start(&bus);
        }

        Ok(Self {
            bus,
            model,
            storage,
            model_controller,
            tools,
            persistence,
            logger,
        })
    }

    pub fn bus(&self) -> &WhiteboardBus {
        &self.bus
    }

    /// Copy of the current model.
    pub fn model(&self) -> Model {
        self.model.borrow().clone()
    }

    pub fn shared_model(&self) -> &SharedModel {
        &self.model
    }

    pub fn tools(&self) -> &ToolController {
        &self.tools
    }

    pub fn storage(&self) -> &Rc<dyn ModelStorage> {
        &self.storage
    }

    /// Reset the model to its defaults and drop the stored copy.
    pub fn reset(&self) -> Result<()> {
        self.model.borrow_mut().reset();
        self.storage.remove()
    }

    /// Detach every subscriber from the bus.
    pub fn shutdown(&mut self) {
        self.logger.stop();
        self.persistence.stop_storing();
        self.tools.destroy();
        self.model_controller.stop();
    }
}

impl Drop for Whiteboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
