//! Command tracing.

use crate::dispatch::Subscription;

use super::command::{Command, CommandPriority, WhiteboardBus};

/// Logs every command that makes it to the end of the chain.
#[derive(Default)]
pub struct CommandLogger {
    subscription: Option<Subscription<Command>>,
}

impl CommandLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, bus: &WhiteboardBus) {
        if self.subscription.is_some() {
            return;
        }

        let subscription = bus.subscribe(
            |command: &Command| tracing::info!(kind = command.kind(), ?command, "command"),
            CommandPriority::LOGGING,
        );
        self.subscription = Some(subscription);
    }

    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}
