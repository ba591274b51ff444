//! Whiteboard model state.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

use super::tools::FREEHAND;

/// Foreground color of a fresh model.
pub const DEFAULT_FOREGROUND_COLOR: &str = "#ffffff";

/// User-facing whiteboard settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub foreground_color: String,
    pub selected_tool: String,
}

impl Model {
    pub fn empty() -> Self {
        Self {
            foreground_color: DEFAULT_FOREGROUND_COLOR.to_string(),
            selected_tool: FREEHAND.to_string(),
        }
    }

    /// Restore the defaults in place.
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Copy every field from `source`.
    pub fn update_from(&mut self, source: &Model) {
        self.clone_from(source);
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::empty()
    }
}

/// Model shared between subscribers on the bus.
pub type SharedModel = Rc<RefCell<Model>>;

pub fn shared(model: Model) -> SharedModel {
    Rc::new(RefCell::new(model))
}
