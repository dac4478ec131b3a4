//! Application layer: registry state and relay command handling.

pub mod registry;
pub mod relay_commands;
