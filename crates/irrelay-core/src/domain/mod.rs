//! Pure domain state machines.  No I/O.

pub mod repeat;
