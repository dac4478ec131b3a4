//! # irrelay-core
//!
//! Shared library for the IR relay containing the line protocol codec, the
//! keymap/codemap model, and the repeat debouncer.
//!
//! This crate is used by both the relay server and the subscriber.
//! It has no dependencies on sockets, child processes, or OS input APIs.
//!
//! # Architecture overview
//!
//! Hardware *devices* (IR receivers/transmitters) connect to the relay server
//! and push every IR signal they decode as a text line such as `1 40BD01FE`
//! or `1 repeat`.  *Subscribers* connect to the same server, ask for the
//! signals of one or more devices, and turn each signal into a desktop action
//! (a key chord, a mouse movement, launching a program).
//!
//! - **`protocol`** – How lines travel over the network: the commands a peer
//!   can send, the responses the server writes, and the binary transmit frame
//!   that instructs a device to emit an IR code.
//!
//! - **`keymap`** – The `CodeMap` (raw hex code → key name) and the per-device
//!   `Keymap` (key name → `Handler`).
//!
//! - **`domain`** – Pure state machines.  The `RepeatDebouncer` converts the
//!   burst of `repeat` frames a held button produces into a throttled,
//!   numbered stream of handler invocations.

pub mod config_dir;
pub mod domain;
pub mod keymap;
pub mod protocol;

pub use domain::repeat::{RepeatDebouncer, RepeatOutcome};
pub use keymap::{
    CodeMap, Handler, HandlerAction, HandlerEntry, Keymap, KeymapError, Keymaps, MouseAction,
    MouseButton, ScrollDirection,
};
pub use protocol::codec::{
    decode_line, decode_server_line, encode_failure, encode_forward, encode_success,
    encode_transmit_frame,
};
pub use protocol::messages::{Command, FailureReason, IrProtocol, ProtocolError, ServerLine};

/// TCP port the relay server listens on when none is configured.
pub const DEFAULT_PORT: u16 = 10765;
