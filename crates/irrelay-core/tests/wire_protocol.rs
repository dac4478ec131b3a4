//! Integration tests for the irrelay-core public API.
//!
//! These tests exercise the codec and the repeat debouncer together the way
//! the server and subscriber use them: lines are decoded, transmit frames
//! encoded, and forwarded signal lines fed through the debouncer.

use irrelay_core::{
    decode_line,
    keymap::{CodeMap, Handler, Keymaps},
    protocol::{decode_server_line, encode_forward, FailureReason},
    encode_failure, encode_success, encode_transmit_frame, Command, IrProtocol, RepeatDebouncer,
    RepeatOutcome, ServerLine,
};

#[test]
fn test_send_line_decodes_into_the_expected_transmit_frame() {
    let cmd = decode_line(b"send NEC 2 32 1 1\n")
        .expect("decode")
        .expect("non-empty");

    let Command::Send {
        protocol,
        repeat_count,
        num_bits,
        code,
        ..
    } = cmd
    else {
        panic!("expected a send command");
    };

    let frame = encode_transmit_frame(protocol, repeat_count, num_bits, &code).expect("encode");
    assert_eq!(frame, vec![0, 2, 32, 1]);
}

#[test]
fn test_server_responses_decode_on_the_subscriber_side() {
    let ok = String::from_utf8(encode_success("1")).unwrap();
    let fail = String::from_utf8(encode_failure("2", FailureReason::NotRegistered)).unwrap();

    assert_eq!(
        decode_server_line(&ok),
        Ok(Some(ServerLine::Subscribed {
            device: "1".to_string()
        }))
    );
    assert_eq!(
        decode_server_line(&fail),
        Ok(Some(ServerLine::Rejected {
            reason: "device 2 is not registered".to_string()
        }))
    );
}

#[test]
fn test_forwarded_lines_drive_the_debouncer() {
    // Arrange
    let codemap: CodeMap = [("40BD01FE".to_string(), "HOME".to_string())]
        .into_iter()
        .collect();
    let mut keymaps = Keymaps::new();
    keymaps.insert("1", "HOME", Handler::key("space"));
    let mut debouncer = RepeatDebouncer::new(codemap, keymaps, 3);

    let device_lines = ["1 40BD01FE", "1 repeat", "1 repeat", "1 repeat", "1 repeat"];
    let mut fired = Vec::new();

    // Act: device line → relay decode → forward framing → subscriber decode
    for raw in device_lines {
        let Some(Command::Forward { line, .. }) = decode_line(raw.as_bytes()).unwrap() else {
            panic!("device lines must decode as forward frames");
        };
        let wire = String::from_utf8(encode_forward(&line)).unwrap();
        let Some(ServerLine::Signal { device, data }) = decode_server_line(&wire).unwrap() else {
            panic!("forwarded lines must decode as signals");
        };
        if let RepeatOutcome::Fire { repeat_count, .. } = debouncer.handle_frame(&device, &data) {
            fired.push(repeat_count);
        }
    }

    // Assert
    assert_eq!(fired, vec![0, 1, 2]);
}

#[test]
fn test_protocol_bytes_match_the_device_firmware() {
    assert_eq!(IrProtocol::Nec as u8, 0);
    assert_eq!(IrProtocol::Rc5 as u8, 1);
    assert_eq!(IrProtocol::Rcmm as u8, 2);
    assert_eq!(IrProtocol::try_from(2u8), Ok(IrProtocol::Rcmm));
    assert!(IrProtocol::try_from(3u8).is_err());
}
