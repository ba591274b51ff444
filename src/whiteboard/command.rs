//! Whiteboard commands and priority bands.

use crate::bus::CommandBus;
use serde::{Deserialize, Serialize};

/// Bus carrying whiteboard commands.
pub type WhiteboardBus = CommandBus<Command>;

/// Intent broadcast through the whiteboard bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Change the stroke color for new shapes.
    ForegroundColor { color: String },

    /// Open the color palette anchored to a toolbar span.
    #[serde(rename_all = "camelCase")]
    OpenColorPalette { min_x: f64, max_x: f64, y: f64 },

    /// Switch the active drawing tool.
    SelectTool { name: String },
}

impl Command {
    pub fn foreground_color(color: impl Into<String>) -> Self {
        Command::ForegroundColor {
            color: color.into(),
        }
    }

    pub fn select_tool(name: impl Into<String>) -> Self {
        Command::SelectTool { name: name.into() }
    }

    /// Wire name of the command type.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::ForegroundColor { .. } => "FOREGROUND_COLOR",
            Command::OpenColorPalette { .. } => "OPEN_COLOR_PALETTE",
            Command::SelectTool { .. } => "SELECT_TOOL",
        }
    }
}

/// Priority bands used by the whiteboard's own subscribers.
pub struct CommandPriority;

impl CommandPriority {
    pub const BEFORE_MODEL: i64 = 5;
    pub const MODEL: i64 = 4;
    pub const AFTER_MODEL_BEFORE_UI: i64 = 3;
    pub const UI: i64 = 2;
    pub const AFTER_UI: i64 = 1;
    /// Runs after everything else.
    pub const LOGGING: i64 = i64::MIN;
}
