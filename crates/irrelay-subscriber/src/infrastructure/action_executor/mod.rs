//! [`ActionExecutor`](crate::application::dispatch_handler::ActionExecutor)
//! implementations.
//!
//! - `xdotool` drives X11 through the `xdotool` command and launches processes.
//! - `mock` records every call for tests.

pub mod mock;
pub mod xdotool;
