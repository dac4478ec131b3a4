//! irrelay-server library crate.
//!
//! The relay accepts TCP connections from IR *devices* and from *subscribers*,
//! keeps an in-memory registry of who is who, and moves lines between them:
//!
//! ```text
//! device ──"1 40BD01FE"──► [relay] ──"1 40BD01FE"──► every subscriber of "1"
//! client ──"send NEC 0 32 1 40BD01FE"──► [relay] ──[0,0,32,FE,01,BD,40]──► device "1"
//! ```
//!
//! # Layers
//!
//! - `application` – the [`Registry`](application::registry::Registry) and
//!   the per-command relay logic.  No sockets; fully testable with channels.
//! - `infrastructure` – the TCP accept loop, per-connection reader/writer
//!   tasks, and TOML configuration.

pub mod application;
pub mod infrastructure;
