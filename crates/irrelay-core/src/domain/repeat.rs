//! RepeatDebouncer: turns a stream of key and `repeat` frames into a throttled
//! sequence of handler invocations.
//!
//! # Why debounce? (for newcomers)
//!
//! While a remote button is held, the IR receiver emits the key code once and
//! then a `repeat` frame roughly every 110 ms.  Firing the handler on every
//! frame would flood key or mouse simulation, and a short tap would often
//! register twice.  The debouncer counts repeats since the last resolved key
//! and only starts firing once the count reaches a threshold:
//!
//! ```text
//! global delay = 3
//!
//! frame:     K      repeat  repeat  repeat  repeat
//! count:     0      1       2       3       4
//! action:    fire(0) -      -       fire(1) fire(2)
//! ```
//!
//! The argument passed to the handler grows by one per repeat after the
//! threshold, so handlers can accelerate (e.g. cursor speed) the longer a
//! button is held.
//!
//! A handler may carry its own `delay`.  When the repeat count reaches it, the
//! handler fires with the raw count, ahead of the global rule.

use tracing::trace;

use crate::keymap::{CodeMap, Handler, Keymaps};
use crate::protocol::messages::REPEAT;

/// Result of feeding one frame to the debouncer.
#[derive(Debug)]
pub enum RepeatOutcome<'a> {
    /// Invoke `handler` with `repeat_count`.
    Fire {
        key: &'a str,
        handler: &'a Handler,
        repeat_count: u32,
    },
    /// A repeat inside the debounce window.
    Suppressed { key: &'a str, repeat_count: u32 },
    /// The key (or the key being repeated) has no handler on this device.
    /// `key` is empty when a repeat arrives before any key.
    NoHandler { key: String, repeat_count: u32 },
    /// No keymap is configured for the device; state is unchanged.
    NoKeymap,
    /// The frame is neither a known code nor a repeat; state is unchanged.
    Unrecognized,
}

/// Per-session repeat state plus the tables needed to resolve frames.
///
/// One instance lives for the duration of one subscriber connection; call
/// [`RepeatDebouncer::reset`] when the connection is re-established.
#[derive(Debug)]
pub struct RepeatDebouncer {
    codemap: CodeMap,
    keymaps: Keymaps,
    global_delay: u32,
    previous_key: Option<String>,
    repeat_count: u32,
}

impl RepeatDebouncer {
    /// Creates a debouncer with an empty repeat state.
    pub fn new(codemap: CodeMap, keymaps: Keymaps, global_delay: u32) -> Self {
        Self {
            codemap,
            keymaps,
            global_delay,
            previous_key: None,
            repeat_count: 0,
        }
    }

    /// Feeds one `(device, raw_code)` frame and decides whether to fire.
    pub fn handle_frame(&mut self, device: &str, raw_code: &str) -> RepeatOutcome<'_> {
        if self.keymaps.device(device).is_none() {
            return RepeatOutcome::NoKeymap;
        }

        if let Some(key) = self.codemap.get(raw_code) {
            self.previous_key = Some(key.clone());
            self.repeat_count = 0;
            trace!("{device}: {raw_code} resolved to {key}");

            return match self.keymaps.handler(device, key) {
                Some(handler) => RepeatOutcome::Fire {
                    key,
                    handler,
                    repeat_count: 0,
                },
                None => RepeatOutcome::NoHandler {
                    key: key.clone(),
                    repeat_count: 0,
                },
            };
        }

        if raw_code != REPEAT {
            return RepeatOutcome::Unrecognized;
        }

        self.repeat_count = self.repeat_count.saturating_add(1);
        let count = self.repeat_count;

        let Some(key) = self.previous_key.as_deref() else {
            return RepeatOutcome::NoHandler {
                key: String::new(),
                repeat_count: count,
            };
        };

        let Some(handler) = self.keymaps.handler(device, key) else {
            return RepeatOutcome::NoHandler {
                key: key.to_string(),
                repeat_count: count,
            };
        };

        if handler.delay.is_some_and(|delay| count >= delay) {
            RepeatOutcome::Fire {
                key,
                handler,
                repeat_count: count,
            }
        } else if count >= self.global_delay {
            RepeatOutcome::Fire {
                key,
                handler,
                repeat_count: count - self.global_delay + 1,
            }
        } else {
            RepeatOutcome::Suppressed {
                key,
                repeat_count: count,
            }
        }
    }

    /// Clears the repeat state (previous key and count).
    pub fn reset(&mut self) {
        self.previous_key = None;
        self.repeat_count = 0;
    }

    /// The last key that resolved through the codemap.
    pub fn previous_key(&self) -> Option<&str> {
        self.previous_key.as_deref()
    }

    /// Repeats seen since the last resolved key.
    pub fn repeat_count(&self) -> u32 {
        self.repeat_count
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
