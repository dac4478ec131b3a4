//! Infrastructure layer: action executors, networking, and configuration.

pub mod action_executor;
pub mod network;
pub mod storage;
