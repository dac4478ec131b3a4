//! Application layer: handler dispatch and the per-connection session.

pub mod dispatch_handler;
pub mod handle_signals;
