//! X11 action executor built on the `xdotool` command.
//!
//! | Action              | Command line                              |
//! |---------------------|-------------------------------------------|
//! | key chord           | `xdotool key <chord>`                     |
//! | jump to (x, y)      | `xdotool mousemove -- <x> <y>`            |
//! | move by (dx, dy)    | `xdotool mousemove_relative -- <dx> <dy>` |
//! | click left..down    | `xdotool click 1..5`                      |
//! | scroll up / down    | `xdotool click --repeat 5 4` / `… 5`      |
//!
//! Every process is started on the current Tokio runtime and never awaited by
//! the caller.  `xdotool` and `command` processes are supervised by a
//! background task that logs a non-zero exit; `spawn` processes are left to
//! the runtime's orphan reaper.

use std::process::Stdio;

use irrelay_core::keymap::{MouseButton, ScrollDirection};
use tokio::process::Command;
use tokio::runtime::Handle;
use tracing::{debug, error, warn};

use crate::application::dispatch_handler::{ActionError, ActionExecutor};

/// Wheel clicks per scroll action.
const SCROLL_STEPS: u32 = 5;

/// Runs `xdotool` for input actions and launches handler processes.
#[derive(Debug, Clone)]
pub struct XdotoolExecutor {
    program: String,
}

impl Default for XdotoolExecutor {
    fn default() -> Self {
        Self {
            program: "xdotool".to_string(),
        }
    }
}

impl XdotoolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `program` in place of `xdotool` (e.g. an absolute path).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn xdotool(&self, args: Vec<String>) -> Result<(), ActionError> {
        supervise(&self.program, &args)
    }
}

impl ActionExecutor for XdotoolExecutor {
    fn simulate_key(&self, chord: &str) -> Result<(), ActionError> {
        self.xdotool(key_args(chord))
    }

    fn mouse_jump(&self, x: i32, y: i32) -> Result<(), ActionError> {
        self.xdotool(jump_args(x, y))
    }

    fn mouse_move(&self, dx: i32, dy: i32) -> Result<(), ActionError> {
        self.xdotool(move_args(dx, dy))
    }

    fn mouse_click(&self, button: MouseButton) -> Result<(), ActionError> {
        self.xdotool(click_args(button))
    }

    fn mouse_scroll(&self, direction: ScrollDirection) -> Result<(), ActionError> {
        self.xdotool(scroll_args(direction))
    }

    fn spawn_detached(&self, argv: &[String]) -> Result<(), ActionError> {
        let (program, args) = argv.split_first().ok_or(ActionError::EmptyArgv)?;
        require_runtime(program)?;

        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| ActionError::Launch {
                program: program.clone(),
                source,
            })?;
        debug!("spawned {program}");
        Ok(())
    }

    fn run_to_completion(&self, argv: &[String]) -> Result<(), ActionError> {
        let (program, args) = argv.split_first().ok_or(ActionError::EmptyArgv)?;
        supervise(program, args)
    }
}

// ── Argument builders ─────────────────────────────────────────────────────────

pub fn key_args(chord: &str) -> Vec<String> {
    vec!["key".to_string(), chord.to_string()]
}

pub fn jump_args(x: i32, y: i32) -> Vec<String> {
    vec![
        "mousemove".to_string(),
        "--".to_string(),
        x.to_string(),
        y.to_string(),
    ]
}

pub fn move_args(dx: i32, dy: i32) -> Vec<String> {
    vec![
        "mousemove_relative".to_string(),
        "--".to_string(),
        dx.to_string(),
        dy.to_string(),
    ]
}

/// X11 button number: 1 left, 2 middle, 3 right, 4 wheel up, 5 wheel down.
fn button_number(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 1,
        MouseButton::Middle => 2,
        MouseButton::Right => 3,
        MouseButton::Up => 4,
        MouseButton::Down => 5,
    }
}

pub fn click_args(button: MouseButton) -> Vec<String> {
    vec!["click".to_string(), button_number(button).to_string()]
}

pub fn scroll_args(direction: ScrollDirection) -> Vec<String> {
    let button = match direction {
        ScrollDirection::Up => MouseButton::Up,
        ScrollDirection::Down => MouseButton::Down,
    };
    vec![
        "click".to_string(),
        "--repeat".to_string(),
        SCROLL_STEPS.to_string(),
        button_number(button).to_string(),
    ]
}

// ── Process supervision ───────────────────────────────────────────────────────

fn require_runtime(program: &str) -> Result<Handle, ActionError> {
    Handle::try_current().map_err(|_| ActionError::NoRuntime {
        program: program.to_string(),
    })
}

/// Starts `program` and logs its exit status from a background task.
fn supervise(program: &str, args: &[String]) -> Result<(), ActionError> {
    let handle = require_runtime(program)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .spawn()
        .map_err(|source| ActionError::Launch {
            program: program.to_string(),
            source,
        })?;

    let program = program.to_string();
    handle.spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => debug!("{program} finished"),
            Ok(status) => warn!("{program} exited with {status}"),
            Err(e) => error!("failed to wait for {program}: {e}"),
        }
    });
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
