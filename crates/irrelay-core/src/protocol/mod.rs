//! Protocol module containing the wire command types and the line codec.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_line, decode_server_line, encode_failure, encode_forward, encode_success,
    encode_transmit_frame,
};
pub use messages::*;
