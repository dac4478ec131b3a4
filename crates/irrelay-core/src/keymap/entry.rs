//! Configuration form of a handler.
//!
//! A handler table in a config file may set several action fields at once.
//! [`HandlerEntry::into_handler`] resolves it to exactly one [`HandlerAction`]
//! using a fixed precedence: `key`, `spawn`, `command`, then `mouse` (callbacks
//! rank between `key` and `spawn` but cannot be written in a file).  Inside
//! `mouse` the order is `move_to`, `move`, `click`, `scroll`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::{Handler, HandlerAction, MouseAction, MouseButton, ScrollDirection};

/// Errors raised when converting a config entry into a [`Handler`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeymapError {
    #[error("handler for {key} sets no action")]
    EmptyHandler { key: String },

    #[error("handler for {key} has an empty argv")]
    EmptyArgv { key: String },
}

/// Mouse table of a handler entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_to: Option<[i32; 2]>,
    #[serde(default, rename = "move", skip_serializing_if = "Option::is_none")]
    pub move_by: Option<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click: Option<MouseButton>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<ScrollDirection>,
}

impl MouseEntry {
    fn set_count(&self) -> usize {
        [
            self.move_to.is_some(),
            self.move_by.is_some(),
            self.click.is_some(),
            self.scroll.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    fn into_action(self) -> Option<MouseAction> {
        if let Some([x, y]) = self.move_to {
            Some(MouseAction::MoveTo { x, y })
        } else if let Some([dx, dy]) = self.move_by {
            Some(MouseAction::Move { dx, dy })
        } else if let Some(button) = self.click {
            Some(MouseAction::Click(button))
        } else {
            self.scroll.map(MouseAction::Scroll)
        }
    }
}

/// One `[keymaps.<device>.<KEY>]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mouse: Option<MouseEntry>,
}

impl HandlerEntry {
    /// Resolves the entry into a [`Handler`] for `key_name`.
    ///
    /// # Errors
    ///
    /// Returns [`KeymapError::EmptyHandler`] when no action is set and
    /// [`KeymapError::EmptyArgv`] when the winning `spawn`/`command` is empty.
    pub fn into_handler(self, key_name: &str) -> Result<Handler, KeymapError> {
        let mouse_set = self.mouse.as_ref().map_or(0, MouseEntry::set_count);
        let set = [
            self.key.is_some(),
            self.spawn.is_some(),
            self.command.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
            + usize::from(mouse_set > 0);

        if set > 1 || mouse_set > 1 {
            warn!("handler for {key_name} sets several actions; only the first by precedence fires");
        }

        let action = if let Some(chord) = self.key {
            HandlerAction::Key(chord)
        } else if let Some(argv) = self.spawn {
            HandlerAction::Spawn(non_empty(argv, key_name)?)
        } else if let Some(argv) = self.command {
            HandlerAction::Command(non_empty(argv, key_name)?)
        } else if let Some(action) = self.mouse.and_then(MouseEntry::into_action) {
            HandlerAction::Mouse(action)
        } else {
            return Err(KeymapError::EmptyHandler {
                key: key_name.to_string(),
            });
        };

        Ok(Handler {
            delay: self.delay,
            action,
        })
    }
}

fn non_empty(argv: Vec<String>, key_name: &str) -> Result<Vec<String>, KeymapError> {
    if argv.is_empty() {
        Err(KeymapError::EmptyArgv {
            key: key_name.to_string(),
        })
    } else {
        Ok(argv)
    }
}
