//! Key resolution tables and action handlers.
//!
//! Two lookups turn a raw IR signal into an action:
//!
//! ```text
//! "40BD01FE" ──CodeMap──► "HOME" ──Keymaps[device]──► Handler { action: Key("space") }
//! ```
//!
//! The tables are supplied by configuration and are read-only for the rest of
//! the system.

pub mod entry;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use entry::{HandlerEntry, KeymapError, MouseEntry};

/// Maps a raw hex signal (as sent by the device) to a symbolic key name.
pub type CodeMap = HashMap<String, String>;

/// Maps a symbolic key name to its handler for one device.
pub type Keymap = HashMap<String, Handler>;

/// A caller-supplied action receiving the repeat count.
pub type Callback = Arc<dyn Fn(u32) + Send + Sync>;

/// Mouse button (or wheel step) to click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    /// Single wheel step up.
    Up,
    /// Single wheel step down.
    Down,
}

/// Direction of a multi-step scroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// A pointer action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseAction {
    /// Jump to absolute screen coordinates.
    MoveTo { x: i32, y: i32 },
    /// Move relative to the current position.
    Move { dx: i32, dy: i32 },
    Click(MouseButton),
    Scroll(ScrollDirection),
}

/// The single action a [`Handler`] performs.
#[derive(Clone)]
pub enum HandlerAction {
    /// Simulate a key chord such as `"ctrl+q"`.
    Key(String),
    /// Invoke a closure with the repeat count.
    Callback(Callback),
    /// Spawn a detached process (`argv[0]` is the program).
    Spawn(Vec<String>),
    /// Run a process to completion in the background.
    Command(Vec<String>),
    Mouse(MouseAction),
}

impl fmt::Debug for HandlerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerAction::Key(chord) => f.debug_tuple("Key").field(chord).finish(),
            HandlerAction::Callback(_) => f.write_str("Callback(..)"),
            HandlerAction::Spawn(argv) => f.debug_tuple("Spawn").field(argv).finish(),
            HandlerAction::Command(argv) => f.debug_tuple("Command").field(argv).finish(),
            HandlerAction::Mouse(action) => f.debug_tuple("Mouse").field(action).finish(),
        }
    }
}

/// What to do when a key resolves, plus an optional per-key repeat threshold.
#[derive(Debug, Clone)]
pub struct Handler {
    /// Per-key override of the global repeat delay.  When set, repeats at or
    /// above this count fire with the raw repeat count.
    pub delay: Option<u32>,
    pub action: HandlerAction,
}

impl Handler {
    pub fn new(action: HandlerAction) -> Self {
        Self {
            delay: None,
            action,
        }
    }

    /// Shorthand for a key-chord handler.
    pub fn key(chord: impl Into<String>) -> Self {
        Self::new(HandlerAction::Key(chord.into()))
    }

    /// Shorthand for a callback handler.
    pub fn callback(f: impl Fn(u32) + Send + Sync + 'static) -> Self {
        Self::new(HandlerAction::Callback(Arc::new(f)))
    }

    /// Shorthand for a mouse handler.
    pub fn mouse(action: MouseAction) -> Self {
        Self::new(HandlerAction::Mouse(action))
    }

    /// Sets the per-key repeat threshold.
    pub fn with_delay(mut self, delay: u32) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Per-device keymaps.
#[derive(Debug, Clone, Default)]
pub struct Keymaps {
    devices: HashMap<String, Keymap>,
}

impl Keymaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the handler for `key` on `device`.
    pub fn insert(&mut self, device: impl Into<String>, key: impl Into<String>, handler: Handler) {
        self.devices
            .entry(device.into())
            .or_default()
            .insert(key.into(), handler);
    }

    /// Returns the keymap for `device`.
    pub fn device(&self, device: &str) -> Option<&Keymap> {
        self.devices.get(device)
    }

    /// Returns the handler for `key` on `device`.
    pub fn handler(&self, device: &str, key: &str) -> Option<&Handler> {
        self.devices.get(device).and_then(|map| map.get(key))
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl FromIterator<(String, Keymap)> for Keymaps {
    fn from_iter<I: IntoIterator<Item = (String, Keymap)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}
