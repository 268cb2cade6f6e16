//! Text codec for controller telemetry frames.
//!
//! Wire format (20 ASCII hex characters, case-insensitive):
//! ```text
//! [id:4][ax:2][ay:2][az:2][dNW:2][dNE:2][dSE:2][dSW:2][tap:2]
//! ```
//! Every field after the id is one byte written as two hex digits.  The tap
//! byte is a flag: `ff` means tapped, every other value means not tapped.
//!
//! A single transport message may carry several frames separated by `\n` or
//! `\r\n`.  Use [`split_frames`] to break a message apart and decode each
//! segment on its own, so one corrupt frame never takes its siblings down.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length in characters of one encoded frame.
pub const FRAME_LEN: usize = 20;

/// Length in characters of the device id prefix.
pub const ID_LEN: usize = 4;

/// Tap byte value meaning "tapped".
pub const TAP_ON: u8 = 0xFF;

/// Errors that can occur while decoding a telemetry frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than [`FRAME_LEN`] characters remained after trimming.
    #[error("frame too short: need {needed} characters, got {available}")]
    TooShort { needed: usize, available: usize },

    /// One of the first [`FRAME_LEN`] characters is not a hex digit.
    #[error("frame contains a non-hex character at position {position}")]
    InvalidCharset { position: usize },
}

// ── Device identity ───────────────────────────────────────────────────────────

/// Identity key of one controller: four lowercase hex characters.
///
/// Ids taken from frames are always normalized.  Ids supplied by callers (for
/// example a lookup typed into a UI as `"00AB"` or `"00abff"`) are lower-cased
/// and truncated to four characters by [`DeviceId::new`], so both forms find
/// the same device.
///
/// # Examples
///
/// ```rust
/// use wandlink_core::DeviceId;
///
/// assert_eq!(DeviceId::new("00AB").as_str(), "00ab");
/// assert_eq!(DeviceId::new("00abff"), DeviceId::new("00ab"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Normalizes a caller-supplied id.
    pub fn new(raw: &str) -> Self {
        Self(
            raw.trim()
                .chars()
                .take(ID_LEN)
                .map(|c| c.to_ascii_lowercase())
                .collect(),
        )
    }

    /// Returns the normalized id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

// ── Decoded values ────────────────────────────────────────────────────────────

/// One decoded sensor reading.
///
/// All fields are raw bytes exactly as the firmware reported them; scaling to
/// physical units is a consumer concern.  The default value (all zeros, not
/// tapped) is what a device record reports before its first frame.
///
/// Serialized field names are the canonical set `ax, ay, az, dNW, dNE, dSE,
/// dSW, tap`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Accelerometer X axis.
    pub ax: u8,
    /// Accelerometer Y axis.
    pub ay: u8,
    /// Accelerometer Z axis.
    pub az: u8,
    /// North-west proximity sensor.
    #[serde(rename = "dNW")]
    pub d_nw: u8,
    /// North-east proximity sensor.
    #[serde(rename = "dNE")]
    pub d_ne: u8,
    /// South-east proximity sensor.
    #[serde(rename = "dSE")]
    pub d_se: u8,
    /// South-west proximity sensor.
    #[serde(rename = "dSW")]
    pub d_sw: u8,
    /// `true` iff the tap byte was exactly `0xFF`.
    pub tap: bool,
}

/// A decoded frame: the id it came from plus its sensor values.
///
/// This is a plain value with no registry identity; the registry decides what
/// to do with it (update an existing record or create a new one).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub id: DeviceId,
    pub sensors: SensorFrame,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes one telemetry frame.
///
/// Surrounding whitespace is ignored.  Only the first [`FRAME_LEN`]
/// characters are considered; anything after them is discarded.
///
/// # Errors
///
/// - [`FrameError::TooShort`] if fewer than 20 characters remain after trimming.
/// - [`FrameError::InvalidCharset`] if any of the first 20 is not a hex digit.
///
/// # Examples
///
/// ```rust
/// use wandlink_core::decode_frame;
///
/// let frame = decode_frame("00AB01020304050607ff").unwrap();
/// assert_eq!(frame.id.as_str(), "00ab");
/// assert_eq!(frame.sensors.ax, 0x01);
/// assert!(frame.sensors.tap);
/// ```
pub fn decode_frame(raw: &str) -> Result<DecodedFrame, FrameError> {
    let trimmed = raw.trim();

    // Length is measured in characters, not bytes.
    let available = trimmed.chars().take(FRAME_LEN).count();
    if available < FRAME_LEN {
        return Err(FrameError::TooShort {
            needed: FRAME_LEN,
            available,
        });
    }
    let bytes = trimmed.as_bytes();

    // Work on bytes so a multi-byte character inside the window is reported
    // as a charset error instead of splitting a UTF-8 sequence.
    let head = &bytes[..FRAME_LEN];
    if let Some(position) = head.iter().position(|b| !b.is_ascii_hexdigit()) {
        return Err(FrameError::InvalidCharset { position });
    }

    let id = DeviceId(
        head[..ID_LEN]
            .iter()
            .map(|b| char::from(b.to_ascii_lowercase()))
            .collect(),
    );

    let mut fields = [0u8; 8];
    for (i, field) in fields.iter_mut().enumerate() {
        let offset = ID_LEN + i * 2;
        *field = hex_byte(head[offset], head[offset + 1])
            .ok_or(FrameError::InvalidCharset { position: offset })?;
    }

    let [ax, ay, az, d_nw, d_ne, d_se, d_sw, tap] = fields;
    Ok(DecodedFrame {
        id,
        sensors: SensorFrame {
            ax,
            ay,
            az,
            d_nw,
            d_ne,
            d_se,
            d_sw,
            tap: tap == TAP_ON,
        },
    })
}

/// Encodes a frame back to its lowercase wire form.
///
/// A tapped frame is written with tap byte `ff`, an untapped one with `00`.
/// The hub never sends frames; this exists for simulators, tests and benches.
pub fn encode_frame(frame: &DecodedFrame) -> String {
    let s = &frame.sensors;
    format!(
        "{}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        frame.id,
        s.ax,
        s.ay,
        s.az,
        s.d_nw,
        s.d_ne,
        s.d_se,
        s.d_sw,
        if s.tap { TAP_ON } else { 0x00 }
    )
}

/// Splits one transport message into candidate frame segments.
///
/// Splits on `\n` (so `\r\n` works too, the `\r` is trimmed away), trims each
/// piece, and skips empty segments.
///
/// # Examples
///
/// ```rust
/// use wandlink_core::split_frames;
///
/// let parts: Vec<&str> = split_frames("a\r\n\nb\n").collect();
/// assert_eq!(parts, vec!["a", "b"]);
/// ```
pub fn split_frames(raw: &str) -> impl Iterator<Item = &str> + '_ {
    raw.split('\n').map(str::trim).filter(|s| !s.is_empty())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn hex_nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

fn hex_byte(hi: u8, lo: u8) -> Option<u8> {
    Some((hex_nibble(hi)? << 4) | hex_nibble(lo)?)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
