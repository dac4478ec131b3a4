//! Infrastructure layer: TCP networking and configuration storage.

pub mod network;
pub mod storage;
