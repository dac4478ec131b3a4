//! irrelay-subscriber library crate.
//!
//! A subscriber connects to the relay server, subscribes to one or more
//! devices, and turns the forwarded IR signals into desktop actions:
//!
//! ```text
//! relay ──"1 40BD01FE"──► SubscriberSession
//!                           ├─ RepeatDebouncer  (codemap + keymaps, repeat throttling)
//!                           └─ HandlerDispatcher ──► ActionExecutor (xdotool, processes)
//! ```
//!
//! # Layers
//!
//! - `application` – the session state machine and the handler dispatcher,
//!   written against the [`ActionExecutor`](application::dispatch_handler::ActionExecutor)
//!   trait so they run without a desktop in tests.
//! - `infrastructure` – the TCP connection with reconnect, the executors, and
//!   configuration loading.

pub mod application;
pub mod infrastructure;
