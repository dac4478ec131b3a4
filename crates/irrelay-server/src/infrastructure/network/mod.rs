//! Network infrastructure: the relay accept loop and per-connection tasks.

pub mod relay_server;

pub use relay_server::{RelayError, RelayServer};
