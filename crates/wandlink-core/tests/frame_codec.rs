//! Integration tests for the wandlink-core frame codec and command path.
//!
//! These tests go through the public API only and check the properties the
//! hub relies on: malformed input is rejected without panicking, byte fields
//! survive a decode/encode cycle, and the tap flag is strict.

use wandlink_core::{
    decode_frame, encode_command, encode_frame, split_frames, CommandSchema, DecodedFrame,
    DeviceId, FrameError, SensorFrame,
};

/// Builds a frame string from its parts.
fn frame(id: &str, fields: [u8; 7], tap: u8) -> String {
    let mut raw = id.to_string();
    for b in fields {
        raw.push_str(&format!("{b:02x}"));
    }
    raw.push_str(&format!("{tap:02x}"));
    raw
}

// ── Rejection ─────────────────────────────────────────────────────────────────

#[test]
fn test_every_prefix_shorter_than_twenty_is_rejected() {
    let full = frame("0001", [1, 2, 3, 4, 5, 6, 7], 0xff);
    for len in 0..20 {
        let result = decode_frame(&full[..len]);
        assert!(
            matches!(result, Err(FrameError::TooShort { .. })),
            "prefix of length {len} must be rejected"
        );
    }
}

#[test]
fn test_non_hex_character_at_any_position_is_rejected() {
    let full = frame("0001", [1, 2, 3, 4, 5, 6, 7], 0xff);
    for position in 0..20 {
        let mut bytes = full.clone().into_bytes();
        bytes[position] = b'x';
        let raw = String::from_utf8(bytes).unwrap();
        assert_eq!(
            decode_frame(&raw),
            Err(FrameError::InvalidCharset { position }),
            "corruption at {position} must be rejected"
        );
    }
}

#[test]
fn test_non_hex_after_the_frame_window_is_ignored() {
    let raw = format!("{}!!", frame("0001", [0; 7], 0));
    assert!(decode_frame(&raw).is_ok());
}

// ── Field values ──────────────────────────────────────────────────────────────

#[test]
fn test_byte_fields_survive_decode_and_reencode() {
    // Sweep each byte value through every field position.
    for value in 0..=255u8 {
        for position in 0..7 {
            let mut fields = [0u8; 7];
            fields[position] = value;
            let raw = frame("0a0b", fields, 0);

            let decoded = decode_frame(&raw).unwrap();
            let s = decoded.sensors;
            assert_eq!(
                [s.ax, s.ay, s.az, s.d_nw, s.d_ne, s.d_se, s.d_sw],
                fields
            );
            assert_eq!(encode_frame(&decoded), raw);
        }
    }
}

#[test]
fn test_tap_is_true_only_for_ff() {
    for tap in 0..=255u8 {
        let decoded = decode_frame(&frame("0001", [0; 7], tap)).unwrap();
        assert_eq!(decoded.sensors.tap, tap == 0xff, "tap byte {tap:#04x}");
    }
}

#[test]
fn test_uppercase_tap_counts_as_tapped() {
    let raw = format!("0001{}FF", "00".repeat(7));
    assert!(decode_frame(&raw).unwrap().sensors.tap);
}

// ── Multi-frame messages ──────────────────────────────────────────────────────

#[test]
fn test_two_newline_joined_frames_decode_independently() {
    let message = format!(
        "0001{}ff\n0002{}00\n",
        "10".repeat(7),
        "20".repeat(7)
    );

    let decoded: Vec<DecodedFrame> = split_frames(&message)
        .filter_map(|segment| decode_frame(segment).ok())
        .collect();

    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].id, DeviceId::new("0001"));
    assert!(decoded[0].sensors.tap);
    assert_eq!(decoded[1].id, DeviceId::new("0002"));
    assert!(!decoded[1].sensors.tap);
}

#[test]
fn test_malformed_sibling_does_not_hide_valid_frames() {
    let message = format!(
        "{}\r\nnot-a-frame\r\n{}",
        frame("0001", [1; 7], 0),
        frame("0003", [3; 7], 0)
    );

    let results: Vec<_> = split_frames(&message).map(decode_frame).collect();

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert_eq!(results[2].as_ref().unwrap().sensors.ax, 3);
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[test]
fn test_validated_command_encodes_to_wire_text() {
    let schema = CommandSchema::builtin();
    let id = DeviceId::new("00AB");

    assert!(schema.is_valid("led", &["ff0000"]));
    assert_eq!(encode_command(&id, "led", &["ff0000"]), "cmd:00ab:led:ff0000");
}

#[test]
fn test_default_sensor_frame_is_all_zero_and_untapped() {
    let s = SensorFrame::default();
    assert_eq!([s.ax, s.ay, s.az, s.d_nw, s.d_ne, s.d_se, s.d_sw], [0; 7]);
    assert!(!s.tap);
}
