//! Keeps the model in sync with commands on the bus.

use crate::dispatch::Subscription;
use std::rc::Rc;

use super::command::{Command, CommandPriority, WhiteboardBus};
use super::model::{Model, SharedModel};

/// Apply a command to the model. Returns true if the model changed.
pub fn apply(model: &mut Model, command: &Command) -> bool {
    let (field, value) = match command {
        Command::ForegroundColor { color } => (&mut model.foreground_color, color),
        Command::SelectTool { name } => (&mut model.selected_tool, name),
        Command::OpenColorPalette { .. } => return false,
    };

    if *field == *value {
        return false;
    }
    value.clone_into(field);
    true
}

/// Subscriber updating a [`SharedModel`] at [`CommandPriority::MODEL`].
pub struct ModelController {
    model: SharedModel,
    subscription: Option<Subscription<Command>>,
}

impl ModelController {
    pub fn new(model: SharedModel) -> Self {
        Self {
            model,
            subscription: None,
        }
    }

    /// Start applying commands. A second call while running is ignored.
    pub fn start(&mut self, bus: &WhiteboardBus) {
        if self.is_running() {
            tracing::warn!("model is already being updated");
            return;
        }

        let model = Rc::clone(&self.model);
        let subscription = bus.subscribe(
            move |command: &Command| {
                if apply(&mut model.borrow_mut(), command) {
                    tracing::debug!(kind = command.kind(), "model updated");
                }
            },
            CommandPriority::MODEL,
        );
        self.subscription = Some(subscription);
    }

    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    pub fn is_running(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| !s.is_unsubscribed())
    }

    pub fn model(&self) -> &SharedModel {
        &self.model
    }
}
