//! Storage infrastructure: configuration file handling.

pub mod config;
