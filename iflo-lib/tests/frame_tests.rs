//! Frame codec tests: encoding, preamble search, checksum behavior

mod common;

use common::*;

#[test]
fn test_round_trip() {
    for payload_len in [0usize, 1, 4, 15, 128, 255] {
        let payload: Vec<u8> = (0..payload_len).map(|i| (i * 7 + 3) as u8).collect();
        let frame = Frame::new(ADDR_PUMP_1, ADDR_REMOTE_CONTROLLER, 0x01, Bytes::from(payload.clone()));

        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), MIN_FRAME_LEN + payload_len);
        assert!(verify_checksum(&bytes), "encoder produced a bad checksum");

        let decoded = Frame::try_from(bytes.as_ref()).expect("round trip parse failed");
        assert_eq!(decoded.destination, ADDR_PUMP_1);
        assert_eq!(decoded.source, ADDR_REMOTE_CONTROLLER);
        assert_eq!(decoded.command, 0x01);
        assert_eq!(decoded.payload.as_ref(), payload.as_slice());
    }
}

#[test]
fn test_known_wire_vectors() {
    let status = request(PumpCommand::QueryStatus).to_bytes();
    assert_eq!(hex::encode(&status), STATUS_REQUEST);

    let start = request(PumpCommand::SetRun(RunState::Running)).to_bytes();
    assert_eq!(hex::encode(&start), RUN_START_REQUEST);

    let remote = request(PumpCommand::SetControl(ControlMode::Remote)).to_bytes();
    assert_eq!(hex::encode(&remote), CTRL_REMOTE_REQUEST);
}

#[test]
fn test_checksum_sensitivity() {
    // flipping any single bit in the checksummed region must be detected
    let bytes = hex_to_bytes(RUN_START_REQUEST);
    assert!(verify_checksum(&bytes));

    for index in IDX_LEAD..bytes.len() - 2 {
        for bit in 0..8 {
            let mut corrupted = bytes.to_vec();
            corrupted[index] ^= 1 << bit;
            assert!(
                !verify_checksum(&corrupted),
                "flip of byte {index} bit {bit} went undetected"
            );
        }
    }
}

#[test]
fn test_verify_checksum_short_input() {
    assert!(!verify_checksum(&[]));
    assert!(!verify_checksum(&[0xFF, 0x00, 0xFF, 0xA5]));
    let bytes = hex_to_bytes(STATUS_REQUEST);
    assert!(!verify_checksum(&bytes[..MIN_FRAME_LEN - 1]));
}

#[test]
fn test_resync_after_noise() {
    // garbage prepended by line noise; the scanner must find the preamble
    let noise = [0x12u8, 0x00, 0xFF, 0xA4, 0x99, 0xFF, 0xFF];
    let frame = hex_to_bytes(STATUS_REQUEST);
    let mut buf = noise.to_vec();
    buf.extend_from_slice(&frame);

    assert_eq!(find_frame(&buf), Some(noise.len()));

    let (decoded, consumed) = extract_frame(&buf).expect("resync parse failed");
    assert_eq!(decoded.command_code(), CommandCode::QueryStatus);
    assert_eq!(consumed, buf.len());
}

#[test]
fn test_find_frame_short_buffer() {
    // a buffer shorter than the minimum frame length can't hold a frame,
    // preamble or not
    let bytes = hex_to_bytes(STATUS_REQUEST);
    assert_eq!(find_frame(&bytes[..MIN_FRAME_LEN - 1]), None);
    assert_eq!(find_frame(&[0x01, 0x02, 0x03]), None);
}

#[test]
fn test_no_preamble() {
    let buf = [0x55u8; 32];
    assert_eq!(find_frame(&buf), None);
    assert!(matches!(extract_frame(&buf), Err(PumpError::NoPreamble(32))));
}

#[test]
fn test_truncated_frame() {
    let bytes = hex_to_bytes(STATUS_REQUEST);
    let truncated = &bytes[..bytes.len() - 1];
    assert!(matches!(
        extract_frame(truncated),
        Err(PumpError::Truncated { .. })
    ));
}

#[test]
fn test_first_of_two_frames_wins() {
    let first = hex_to_bytes(RUN_START_REQUEST);
    let second = hex_to_bytes(STATUS_REQUEST);
    let mut buf = first.to_vec();
    buf.extend_from_slice(&second);

    let (frame, consumed) = extract_frame(&buf).unwrap();
    assert_eq!(frame.command_code(), CommandCode::SetRun);
    assert_eq!(consumed, first.len());

    // the caller re-scans the tail for the second frame
    let (frame, _) = extract_frame(&buf[consumed..]).unwrap();
    assert_eq!(frame.command_code(), CommandCode::QueryStatus);
}

#[test]
fn test_trailing_garbage_ignored() {
    let mut buf = hex_to_bytes(STATUS_REQUEST).to_vec();
    let frame_len = buf.len();
    buf.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);

    let (frame, consumed) = extract_frame(&buf).unwrap();
    assert_eq!(frame.command_code(), CommandCode::QueryStatus);
    assert_eq!(consumed, frame_len);
}

#[test]
fn test_frame_length_from_header() {
    let bytes = hex_to_bytes(RUN_START_REQUEST);
    assert_eq!(frame_length(&bytes), MIN_FRAME_LEN + 1);
}

#[test]
fn test_encode_buffer_too_small() {
    let frame = request(PumpCommand::QueryStatus);
    let mut buf = [0u8; MIN_FRAME_LEN - 1];
    match frame.encode_into(&mut buf) {
        Err(PumpError::BufferTooSmall { needed, available }) => {
            assert_eq!(needed, MIN_FRAME_LEN);
            assert_eq!(available, MIN_FRAME_LEN - 1);
        }
        other => panic!("expected BufferTooSmall, got {other:?}"),
    }
}

#[test]
fn test_checksum_wraps_modulo_16_bit() {
    // 255 bytes of 0xFF push the sum well past u16::MAX
    let payload = Bytes::from(vec![0xFFu8; 255]);
    let frame = Frame::new(ADDR_PUMP_1, ADDR_REMOTE_CONTROLLER, 0x01, payload);
    let bytes = frame.to_bytes();
    assert!(verify_checksum(&bytes));
    Frame::try_from(bytes.as_ref()).expect("wrapped checksum should still parse");
}
