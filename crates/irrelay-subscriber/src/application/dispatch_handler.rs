//! HandlerDispatcher: runs the action of a resolved [`Handler`].
//!
//! The dispatcher delegates every OS-level effect to an [`ActionExecutor`]
//! trait object.  Platform implementations live in the infrastructure layer.
//!
//! A [`Handler`] holds exactly one [`HandlerAction`]; when a config entry
//! sets several, the precedence key > callback > spawn > command > mouse was
//! already applied while building it (see `irrelay_core::keymap::entry`).

use std::sync::Arc;

use irrelay_core::keymap::{Handler, HandlerAction, MouseAction, MouseButton, ScrollDirection};
use thiserror::Error;
use tracing::debug;

/// Error type for OS action execution.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot run an empty command line")]
    EmptyArgv,

    #[error("no async runtime available to supervise {program}")]
    NoRuntime { program: String },

    #[error("platform error: {0}")]
    Platform(String),
}

/// Error returned when a handler's action fails.
#[derive(Debug, Error)]
#[error("{action} handler failed: {source}")]
pub struct DispatchError {
    pub action: &'static str,
    #[source]
    pub source: ActionError,
}

/// OS-level effects a handler can trigger.
///
/// Implementations must not block for long: `run_to_completion` starts the
/// process and supervises it in the background.
pub trait ActionExecutor: Send + Sync {
    /// Presses and releases a key chord such as `"ctrl+q"`.
    fn simulate_key(&self, chord: &str) -> Result<(), ActionError>;

    /// Moves the pointer to absolute screen coordinates.
    fn mouse_jump(&self, x: i32, y: i32) -> Result<(), ActionError>;

    /// Moves the pointer relative to its current position.
    fn mouse_move(&self, dx: i32, dy: i32) -> Result<(), ActionError>;

    fn mouse_click(&self, button: MouseButton) -> Result<(), ActionError>;

    fn mouse_scroll(&self, direction: ScrollDirection) -> Result<(), ActionError>;

    /// Starts `argv[0]` with the remaining arguments and forgets about it.
    fn spawn_detached(&self, argv: &[String]) -> Result<(), ActionError>;

    /// Starts `argv[0]` and waits for it on a background task.
    fn run_to_completion(&self, argv: &[String]) -> Result<(), ActionError>;
}

/// Executes handler actions through an [`ActionExecutor`].
#[derive(Clone)]
pub struct HandlerDispatcher {
    executor: Arc<dyn ActionExecutor>,
}

impl HandlerDispatcher {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }

    /// Runs `handler` once.  `repeat_count` is passed to callbacks; the
    /// other actions ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the executor fails.
    pub fn execute(&self, handler: &Handler, repeat_count: u32) -> Result<(), DispatchError> {
        let action = action_name(&handler.action);
        debug!("executing {action} handler (repeat {repeat_count})");

        let result = match &handler.action {
            HandlerAction::Key(chord) => self.executor.simulate_key(chord),
            HandlerAction::Callback(callback) => {
                callback(repeat_count);
                Ok(())
            }
            HandlerAction::Spawn(argv) => self.executor.spawn_detached(argv),
            HandlerAction::Command(argv) => self.executor.run_to_completion(argv),
            HandlerAction::Mouse(mouse) => match *mouse {
                MouseAction::MoveTo { x, y } => self.executor.mouse_jump(x, y),
                MouseAction::Move { dx, dy } => self.executor.mouse_move(dx, dy),
                MouseAction::Click(button) => self.executor.mouse_click(button),
                MouseAction::Scroll(direction) => self.executor.mouse_scroll(direction),
            },
        };

        result.map_err(|source| DispatchError { action, source })
    }
}

fn action_name(action: &HandlerAction) -> &'static str {
    match action {
        HandlerAction::Key(_) => "key",
        HandlerAction::Callback(_) => "callback",
        HandlerAction::Spawn(_) => "spawn",
        HandlerAction::Command(_) => "command",
        HandlerAction::Mouse(_) => "mouse",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
