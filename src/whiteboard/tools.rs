//! Drawing tools and the controller switching between them.
//!
//! Tools here only track selection. Pointer handling and drawing live with
//! the canvas host, which attaches its listeners in `on_select` and detaches
//! them in `on_deselect`.

use crate::dispatch::Subscription;
use crate::error::{Result, WhiteboardError};
use std::cell::RefCell;
use std::rc::Rc;

use super::command::{Command, CommandPriority, WhiteboardBus};

pub const FREEHAND: &str = "FreeHand";
pub const LINE: &str = "Line";
pub const DELETE: &str = "Delete";
pub const SELECT: &str = "Select";

/// A tool that can be made active on the canvas.
pub trait Tool {
    fn name(&self) -> &str;

    fn on_select(&mut self);

    fn on_deselect(&mut self);

    fn is_selected(&self) -> bool;
}

/// Built-in canvas tool.
#[derive(Clone, Debug)]
pub struct CanvasTool {
    name: &'static str,
    selected: bool,
    /// How many times the tool was activated.
    activations: usize,
}

impl CanvasTool {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            selected: false,
            activations: 0,
        }
    }

    pub fn freehand() -> Self {
        Self::new(FREEHAND)
    }

    pub fn line() -> Self {
        Self::new(LINE)
    }

    pub fn delete() -> Self {
        Self::new(DELETE)
    }

    pub fn select() -> Self {
        Self::new(SELECT)
    }

    pub fn activations(&self) -> usize {
        self.activations
    }
}

impl Tool for CanvasTool {
    fn name(&self) -> &str {
        self.name
    }

    fn on_select(&mut self) {
        // Re-selecting the active tool keeps a single activation.
        if !self.selected {
            self.selected = true;
            self.activations += 1;
        }
    }

    fn on_deselect(&mut self) {
        self.selected = false;
    }

    fn is_selected(&self) -> bool {
        self.selected
    }
}

/// The default tool set: freehand, line and delete.
pub fn default_tools() -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(CanvasTool::freehand()),
        Box::new(CanvasTool::line()),
        Box::new(CanvasTool::delete()),
    ]
}

struct ToolState {
    tools: Vec<Box<dyn Tool>>,
    current: Option<usize>,
}

impl ToolState {
    fn select(&mut self, name: &str) -> Result<()> {
        let next = self
            .tools
            .iter()
            .position(|t| t.name() == name)
            .ok_or_else(|| WhiteboardError::UnknownTool(name.to_string()))?;

        if let Some(current) = self.current {
            if current != next {
                self.tools[current].on_deselect();
            }
        }

        self.current = Some(next);
        self.tools[next].on_select();
        Ok(())
    }

    fn deselect(&mut self) {
        if let Some(current) = self.current.take() {
            self.tools[current].on_deselect();
        }
    }
}

/// Switches tools in response to `SelectTool` commands.
pub struct ToolController {
    state: Rc<RefCell<ToolState>>,
    subscription: Option<Subscription<Command>>,
}

impl ToolController {
    pub fn new() -> Self {
        Self::with_tools(default_tools())
    }

    pub fn with_tools(tools: Vec<Box<dyn Tool>>) -> Self {
        Self {
            state: Rc::new(RefCell::new(ToolState {
                tools,
                current: None,
            })),
            subscription: None,
        }
    }

    /// Subscribe at [`CommandPriority::UI`] and activate the freehand tool.
    pub fn init(&mut self, bus: &WhiteboardBus) -> Result<()> {
        self.init_with(bus, FREEHAND)
    }

    /// Subscribe and activate `initial`.
    pub fn init_with(&mut self, bus: &WhiteboardBus, initial: &str) -> Result<()> {
        self.state.borrow_mut().select(initial)?;

        if let Some(old) = self.subscription.take() {
            old.unsubscribe();
        }

        let state = Rc::clone(&self.state);
        let subscription = bus.subscribe(
            move |command: &Command| {
                if let Command::SelectTool { name } = command {
                    if let Err(e) = state.borrow_mut().select(name) {
                        tracing::warn!(error = %e, "ignoring tool selection");
                    }
                }
            },
            CommandPriority::UI,
        );
        self.subscription = Some(subscription);
        Ok(())
    }

    /// Activate a tool directly, without going through the bus.
    pub fn select(&self, name: &str) -> Result<()> {
        self.state.borrow_mut().select(name)
    }

    /// Name of the active tool.
    pub fn current(&self) -> Option<String> {
        let state = self.state.borrow();
        state.current.map(|i| state.tools[i].name().to_string())
    }

    /// Names of the tools that are currently selected.
    pub fn selected_tools(&self) -> Vec<String> {
        self.state
            .borrow()
            .tools
            .iter()
            .filter(|t| t.is_selected())
            .map(|t| t.name().to_string())
            .collect()
    }

    /// Deselect the active tool and unsubscribe.
    pub fn destroy(&mut self) {
        self.state.borrow_mut().deselect();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

impl Default for ToolController {
    fn default() -> Self {
        Self::new()
    }
}
