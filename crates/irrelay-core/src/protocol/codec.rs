//! Line codec for the IR relay protocol.
//!
//! Inbound wire format (one command per line):
//! ```text
//! subscribe <id>
//! register <id>
//! send <protocol> <repeatCount> <numBits> <id> <hexCode>
//! <id> <payload>
//! ```
//!
//! Transmit frame written to a device:
//! ```text
//! [protocol:1][repeat_count:1][num_bits:1][code bytes, least-significant first]
//! ```

use tracing::warn;

use crate::protocol::messages::{
    Command, FailureReason, IrProtocol, ProtocolError, ServerLine, FAIL, REGISTER, SEND,
    SUBSCRIBE, SUCCESS,
};

// ── Inbound decoding ──────────────────────────────────────────────────────────

/// Decodes one inbound line into a [`Command`].
///
/// Surrounding whitespace (including a trailing `\r\n`) is trimmed.  Returns
/// `Ok(None)` for an empty line.  Command shapes are tried in priority order:
/// `subscribe`, `register`, `send`, and finally the `<id> <payload>` fallback,
/// so a line that merely *looks* like a malformed command is forwarded as a
/// data frame.
///
/// An unrecognised `send` protocol token is encoded as [`IrProtocol::Nec`]
/// and logged.
///
/// # Errors
///
/// - [`ProtocolError::FieldOutOfRange`] if a numeric `send` field exceeds 255.
/// - [`ProtocolError::MissingPayload`] for a single-token line.
///
/// # Examples
///
/// ```rust
/// use irrelay_core::protocol::{decode_line, Command};
///
/// let cmd = decode_line(b"subscribe 1\n").unwrap();
/// assert_eq!(cmd, Some(Command::Subscribe { device: "1".to_string() }));
/// ```
pub fn decode_line(raw: &[u8]) -> Result<Option<Command>, ProtocolError> {
    let text = String::from_utf8_lossy(raw);
    let line = text.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.as_slice() {
        [SUBSCRIBE, device] => Ok(Some(Command::Subscribe {
            device: (*device).to_string(),
        })),
        [REGISTER, device] => Ok(Some(Command::Register {
            device: (*device).to_string(),
        })),
        [SEND, protocol, repeat, bits, device, code] if is_digits(repeat) && is_digits(bits) => {
            let protocol = IrProtocol::from_token(protocol).unwrap_or_else(|| {
                warn!("unknown IR protocol {protocol:?}; encoding as NEC");
                IrProtocol::Nec
            });
            Ok(Some(Command::Send {
                protocol,
                repeat_count: parse_byte("repeat count", repeat)?,
                num_bits: parse_byte("bit count", bits)?,
                device: (*device).to_string(),
                code: (*code).to_string(),
            }))
        }
        [device, _, ..] => Ok(Some(Command::Forward {
            device: (*device).to_string(),
            line: line.to_string(),
        })),
        _ => Err(ProtocolError::MissingPayload {
            line: line.to_string(),
        }),
    }
}

fn is_digits(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

fn parse_byte(field: &'static str, token: &str) -> Result<u8, ProtocolError> {
    token.parse::<u8>().map_err(|_| ProtocolError::FieldOutOfRange {
        field,
        value: token.to_string(),
    })
}

// ── Outbound encoding ─────────────────────────────────────────────────────────

/// Encodes the binary instruction that makes a device emit `code`.
///
/// An odd-length `code` is left-padded with `0`, split into two-character
/// groups, each parsed as a base-16 byte, and the byte sequence is reversed
/// (least-significant byte first) behind a three-byte header.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedHex`] if any group is not hexadecimal and
/// [`ProtocolError::EmptyHexCode`] if `code` is empty.
///
/// # Examples
///
/// ```rust
/// use irrelay_core::protocol::{encode_transmit_frame, IrProtocol};
///
/// let frame = encode_transmit_frame(IrProtocol::Rc5, 0, 16, "ABCD").unwrap();
/// assert_eq!(frame, vec![1, 0, 16, 0xCD, 0xAB]);
/// ```
pub fn encode_transmit_frame(
    protocol: IrProtocol,
    repeat_count: u8,
    num_bits: u8,
    code: &str,
) -> Result<Vec<u8>, ProtocolError> {
    if code.is_empty() {
        return Err(ProtocolError::EmptyHexCode);
    }
    if !code.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProtocolError::MalformedHex {
            code: code.to_string(),
        });
    }

    let padded = if code.len() % 2 == 1 {
        format!("0{code}")
    } else {
        code.to_string()
    };

    let mut bytes = padded
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            // Every byte was checked to be an ASCII hex digit above.
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| ProtocolError::MalformedHex {
                    code: code.to_string(),
                })
        })
        .collect::<Result<Vec<u8>, _>>()?;
    bytes.reverse();

    let mut frame = Vec::with_capacity(3 + bytes.len());
    frame.push(protocol as u8);
    frame.push(repeat_count);
    frame.push(num_bits);
    frame.extend_from_slice(&bytes);
    Ok(frame)
}

/// Encodes the response to an accepted subscription: `success <id>\n`.
pub fn encode_success(device: &str) -> Vec<u8> {
    format!("{SUCCESS} {device}\n").into_bytes()
}

/// Encodes the response to a rejected subscription, e.g.
/// `fail device <id> is not registered\n`.
pub fn encode_failure(device: &str, reason: FailureReason) -> Vec<u8> {
    format!("{FAIL} device {device} {reason}\n").into_bytes()
}

/// Frames a device signal line for delivery to a subscriber.
pub fn encode_forward(line: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(line.len() + 1);
    buf.extend_from_slice(line.as_bytes());
    buf.push(b'\n');
    buf
}

// ── Subscriber-side decoding ──────────────────────────────────────────────────

/// Decodes one line received from the server.
///
/// Returns `Ok(None)` for an empty line.  A signal frame keeps the first word
/// after the device id as its data; further words are dropped.
///
/// # Errors
///
/// Returns [`ProtocolError::UnrecognizedLine`] if the line has fewer than two
/// words and is not a `fail` response.
pub fn decode_server_line(raw: &str) -> Result<Option<ServerLine>, ProtocolError> {
    let line = raw.trim();
    if line.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = line.strip_prefix(FAIL) {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            return Ok(Some(ServerLine::Rejected {
                reason: rest.trim().to_string(),
            }));
        }
    }

    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [SUCCESS, device] => Ok(Some(ServerLine::Subscribed {
            device: (*device).to_string(),
        })),
        [device, data, ..] => Ok(Some(ServerLine::Signal {
            device: (*device).to_string(),
            data: (*data).to_string(),
        })),
        _ => Err(ProtocolError::UnrecognizedLine {
            line: line.to_string(),
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(line: &str) -> Command {
        decode_line(line.as_bytes())
            .expect("decode must succeed")
            .expect("line must not be empty")
    }

    // ── decode_line ───────────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_line_is_ignored() {
        assert_eq!(decode_line(b""), Ok(None));
        assert_eq!(decode_line(b"   \r\n"), Ok(None));
    }

    #[test]
    fn test_decode_subscribe() {
        assert_eq!(
            decode("subscribe living-room\n"),
            Command::Subscribe {
                device: "living-room".to_string()
            }
        );
    }

    #[test]
    fn test_decode_register_trims_crlf() {
        assert_eq!(
            decode("register 1\r\n"),
            Command::Register {
                device: "1".to_string()
            }
        );
    }

    #[test]
    fn test_decode_send() {
        assert_eq!(
            decode("send RC5 2 16 1 ABCD"),
            Command::Send {
                protocol: IrProtocol::Rc5,
                repeat_count: 2,
                num_bits: 16,
                device: "1".to_string(),
                code: "ABCD".to_string(),
            }
        );
    }

    #[test]
    fn test_decode_send_with_unknown_protocol_defaults_to_nec() {
        let cmd = decode("send SONY 0 12 1 A90");
        assert!(matches!(
            cmd,
            Command::Send {
                protocol: IrProtocol::Nec,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_send_with_oversized_field_is_rejected() {
        let result = decode_line(b"send NEC 300 32 1 FF");
        assert_eq!(
            result,
            Err(ProtocolError::FieldOutOfRange {
                field: "repeat count",
                value: "300".to_string()
            })
        );
    }

    #[test]
    fn test_decode_send_with_non_numeric_count_falls_back_to_forward() {
        let cmd = decode("send NEC x 32 1 FF");
        assert_eq!(
            cmd,
            Command::Forward {
                device: "send".to_string(),
                line: "send NEC x 32 1 FF".to_string()
            }
        );
    }

    #[test]
    fn test_decode_signal_frame_is_forwarded_verbatim() {
        assert_eq!(
            decode("1 40BD01FE\n"),
            Command::Forward {
                device: "1".to_string(),
                line: "1 40BD01FE".to_string()
            }
        );
    }

    #[test]
    fn test_decode_subscribe_with_extra_tokens_falls_back_to_forward() {
        assert!(matches!(
            decode("subscribe 1 2"),
            Command::Forward { ref device, .. } if device == "subscribe"
        ));
    }

    #[test]
    fn test_decode_single_token_line_is_missing_payload() {
        assert!(matches!(
            decode_line(b"subscribe"),
            Err(ProtocolError::MissingPayload { .. })
        ));
    }

    #[test]
    fn test_command_display_renders_wire_line() {
        let cmd = Command::Send {
            protocol: IrProtocol::Rcmm,
            repeat_count: 1,
            num_bits: 24,
            device: "tv".to_string(),
            code: "1F".to_string(),
        };
        assert_eq!(cmd.to_string(), "send RCMM 1 24 tv 1F");
        assert_eq!(decode(&cmd.to_string()), cmd);
    }

    // ── encode_transmit_frame ─────────────────────────────────────────────────

    #[test]
    fn test_transmit_frame_pads_odd_length_code() {
        let frame = encode_transmit_frame(IrProtocol::Nec, 2, 32, "1").unwrap();
        assert_eq!(frame, vec![0, 2, 32, 1]);
    }

    #[test]
    fn test_transmit_frame_reverses_code_bytes() {
        let frame = encode_transmit_frame(IrProtocol::Rc5, 0, 16, "ABCD").unwrap();
        assert_eq!(frame, vec![1, 0, 16, 0xCD, 0xAB]);
    }

    #[test]
    fn test_transmit_frame_accepts_lowercase_nec_code() {
        let frame = encode_transmit_frame(IrProtocol::Nec, 0, 32, "40bd01fe").unwrap();
        assert_eq!(frame, vec![0, 0, 32, 0xFE, 0x01, 0xBD, 0x40]);
    }

    #[test]
    fn test_transmit_frame_rejects_non_hex() {
        assert_eq!(
            encode_transmit_frame(IrProtocol::Rcmm, 0, 24, "12G4"),
            Err(ProtocolError::MalformedHex {
                code: "12G4".to_string()
            })
        );
    }

    #[test]
    fn test_transmit_frame_rejects_signed_group() {
        // `u8::from_str_radix` alone would accept "+F".
        assert!(matches!(
            encode_transmit_frame(IrProtocol::Nec, 0, 8, "+F"),
            Err(ProtocolError::MalformedHex { .. })
        ));
    }

    #[test]
    fn test_transmit_frame_rejects_empty_code() {
        assert_eq!(
            encode_transmit_frame(IrProtocol::Nec, 0, 32, ""),
            Err(ProtocolError::EmptyHexCode)
        );
    }

    // ── Responses ─────────────────────────────────────────────────────────────

    #[test]
    fn test_encode_success() {
        assert_eq!(encode_success("1"), b"success 1\n".to_vec());
    }

    #[test]
    fn test_encode_failure_not_registered() {
        assert_eq!(
            encode_failure("7", FailureReason::NotRegistered),
            b"fail device 7 is not registered\n".to_vec()
        );
    }

    // ── decode_server_line ────────────────────────────────────────────────────

    #[test]
    fn test_decode_server_line_success() {
        assert_eq!(
            decode_server_line("success 1\n"),
            Ok(Some(ServerLine::Subscribed {
                device: "1".to_string()
            }))
        );
    }

    #[test]
    fn test_decode_server_line_failure_keeps_reason() {
        assert_eq!(
            decode_server_line("fail device 9 is not registered"),
            Ok(Some(ServerLine::Rejected {
                reason: "device 9 is not registered".to_string()
            }))
        );
    }

    #[test]
    fn test_decode_server_line_signal_and_repeat() {
        assert_eq!(
            decode_server_line("1 repeat"),
            Ok(Some(ServerLine::Signal {
                device: "1".to_string(),
                data: "repeat".to_string()
            }))
        );
    }

    #[test]
    fn test_decode_server_line_device_named_failover_is_a_signal() {
        assert!(matches!(
            decode_server_line("failover 40BD01FE"),
            Ok(Some(ServerLine::Signal { .. }))
        ));
    }

    #[test]
    fn test_decode_server_line_rejects_garbage() {
        assert!(matches!(
            decode_server_line("garbage"),
            Err(ProtocolError::UnrecognizedLine { .. })
        ));
    }

    #[test]
    fn test_decode_server_line_multi_word_payload_keeps_first_word() {
        // Arrange: devices may emit payloads with trailing fields
        let raw = "1 40BD01FE 32 NEC\n";

        // Act
        let decoded = decode_server_line(raw);

        // Assert
        assert_eq!(
            decoded,
            Ok(Some(ServerLine::Signal {
                device: "1".to_string(),
                data: "40BD01FE".to_string()
            }))
        );
    }
}
