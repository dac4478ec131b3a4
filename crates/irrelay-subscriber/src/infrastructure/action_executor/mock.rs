//! Mock action executor for unit and integration tests.
//!
//! The real executor moves the pointer, presses keys, and starts programs on
//! the test machine.  `MockActionExecutor` records each call in order instead,
//! so tests can assert exactly which actions a sequence of signals produced.
//!
//! ```ignore
//! let executor = Arc::new(MockActionExecutor::new());
//! let dispatcher = HandlerDispatcher::new(executor.clone());
//!
//! dispatcher.execute(&Handler::key("space"), 0).unwrap();
//!
//! assert_eq!(executor.actions(), vec![RecordedAction::Key("space".into())]);
//! ```
//!
//! [`MockActionExecutor::failing`] builds an executor whose every call
//! returns [`ActionError::Platform`], for exercising error paths.

use std::sync::Mutex;

use irrelay_core::keymap::{MouseButton, ScrollDirection};

use crate::application::dispatch_handler::{ActionError, ActionExecutor};

/// One recorded executor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedAction {
    Key(String),
    MouseJump(i32, i32),
    MouseMove(i32, i32),
    MouseClick(MouseButton),
    MouseScroll(ScrollDirection),
    Spawn(Vec<String>),
    Command(Vec<String>),
}

/// Records all calls without touching the OS.
#[derive(Debug, Default)]
pub struct MockActionExecutor {
    actions: Mutex<Vec<RecordedAction>>,
    /// When `true`, every call returns an error and nothing is recorded.
    pub should_fail: bool,
}

impl MockActionExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor whose every call fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Snapshot of the recorded calls, oldest first.
    pub fn actions(&self) -> Vec<RecordedAction> {
        self.actions.lock().unwrap().clone()
    }

    /// Forgets all recorded calls.
    pub fn clear(&self) {
        self.actions.lock().unwrap().clear();
    }

    fn record(&self, action: RecordedAction) -> Result<(), ActionError> {
        if self.should_fail {
            return Err(ActionError::Platform("mock failure".into()));
        }
        self.actions.lock().unwrap().push(action);
        Ok(())
    }
}

impl ActionExecutor for MockActionExecutor {
    fn simulate_key(&self, chord: &str) -> Result<(), ActionError> {
        self.record(RecordedAction::Key(chord.to_string()))
    }

    fn mouse_jump(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.record(RecordedAction::MouseJump(x, y))
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> Result<(), ActionError> {
        self.record(RecordedAction::MouseMove(dx, dy))
    }

    fn mouse_click(&self, button: MouseButton) -> Result<(), ActionError> {
        self.record(RecordedAction::MouseClick(button))
    }

    fn mouse_scroll(&self, direction: ScrollDirection) -> Result<(), ActionError> {
        self.record(RecordedAction::MouseScroll(direction))
    }

    fn spawn_detached(&self, argv: &[String]) -> Result<(), ActionError> {
        self.record(RecordedAction::Spawn(argv.to_vec()))
    }

    fn run_to_completion(&self, argv: &[String]) -> Result<(), ActionError> {
        self.record(RecordedAction::Command(argv.to_vec()))
    }
}
