//! All IR relay protocol message types.
//!
//! The relay speaks newline-delimited ASCII lines in both directions, with a
//! single exception: the transmit frame the server writes to a device is raw
//! binary (see [`crate::protocol::codec::encode_transmit_frame`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// Keyword of the subscribe command.
pub const SUBSCRIBE: &str = "subscribe";
/// Keyword of the register command.
pub const REGISTER: &str = "register";
/// Keyword of the send (transmit request) command.
pub const SEND: &str = "send";
/// Payload a device emits while a remote button is held down.
pub const REPEAT: &str = "repeat";
/// Prefix of a successful subscription response.
pub const SUCCESS: &str = "success";
/// Prefix of a rejected subscription response.
pub const FAIL: &str = "fail";

/// Errors that can occur while decoding lines or encoding frames.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// A `send` code contains a two-character group that is not hexadecimal.
    #[error("malformed hex code: {code:?}")]
    MalformedHex { code: String },

    /// A `send` command carried an empty hex code.
    #[error("empty hex code")]
    EmptyHexCode,

    /// A numeric `send` field does not fit in a single header byte.
    #[error("{field} value {value} does not fit in one byte")]
    FieldOutOfRange { field: &'static str, value: String },

    /// The line has a device identifier but no payload to forward.
    #[error("line has no payload: {line:?}")]
    MissingPayload { line: String },

    /// A line received from the server matches no known response shape.
    #[error("unrecognized server line: {line:?}")]
    UnrecognizedLine { line: String },
}

// ── IR protocols ──────────────────────────────────────────────────────────────

/// IR protocol byte, the first header byte of a transmit frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum IrProtocol {
    Nec = 0x00,
    Rc5 = 0x01,
    Rcmm = 0x02,
}

impl IrProtocol {
    /// Parses the protocol token of a `send` command (`NEC`, `RC5`, `RCMM`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "NEC" => Some(IrProtocol::Nec),
            "RC5" => Some(IrProtocol::Rc5),
            "RCMM" => Some(IrProtocol::Rcmm),
            _ => None,
        }
    }

    /// Returns the token used on the wire.
    pub fn as_token(self) -> &'static str {
        match self {
            IrProtocol::Nec => "NEC",
            IrProtocol::Rc5 => "RC5",
            IrProtocol::Rcmm => "RCMM",
        }
    }
}

impl TryFrom<u8> for IrProtocol {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(IrProtocol::Nec),
            0x01 => Ok(IrProtocol::Rc5),
            0x02 => Ok(IrProtocol::Rcmm),
            _ => Err(()),
        }
    }
}

impl fmt::Display for IrProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

// ── Client → server commands ──────────────────────────────────────────────────

/// A decoded inbound line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `subscribe <id>`: relay future frames tagged `<id>` to this connection.
    Subscribe { device: String },
    /// `register <id>`: claim device identifier `<id>` for this connection.
    Register { device: String },
    /// `send <protocol> <repeatCount> <numBits> <id> <hexCode>`.
    Send {
        protocol: IrProtocol,
        repeat_count: u8,
        num_bits: u8,
        device: String,
        code: String,
    },
    /// `<id> <payload>`: a signal frame from a device, forwarded verbatim.
    Forward { device: String, line: String },
}

impl fmt::Display for Command {
    /// Renders the command as its wire line, without the trailing newline.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Subscribe { device } => write!(f, "{SUBSCRIBE} {device}"),
            Command::Register { device } => write!(f, "{REGISTER} {device}"),
            Command::Send {
                protocol,
                repeat_count,
                num_bits,
                device,
                code,
            } => write!(f, "{SEND} {protocol} {repeat_count} {num_bits} {device} {code}"),
            Command::Forward { line, .. } => f.write_str(line),
        }
    }
}

// ── Server → client lines ─────────────────────────────────────────────────────

/// Why a subscription was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    NotRegistered,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::NotRegistered => f.write_str("is not registered"),
        }
    }
}

/// A line received by a subscriber from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerLine {
    /// `success <id>`.
    Subscribed { device: String },
    /// `fail <reason>`; `reason` is everything after the keyword.
    Rejected { reason: String },
    /// `<id> <data>`: a forwarded signal frame.
    Signal { device: String, data: String },
}
