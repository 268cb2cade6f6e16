//! # wandlink-core
//!
//! Shared library for Wandlink containing the telemetry frame codec, the
//! outbound command encoder, command schema validation, and LED colour
//! resolution.
//!
//! This crate is used by the hub service and by any tool that needs to speak
//! the controller wire format (simulators, benchmarks).  It has zero
//! dependencies on sockets, async runtimes, or the device registry.
//!
//! # Architecture overview (for beginners)
//!
//! Wandlink controllers are small handheld devices carrying an accelerometer,
//! four proximity sensors (one per corner: NW, NE, SE, SW), a tap detector, an
//! RGB LED and a vibration motor.  A gateway relays their telemetry to the hub
//! over a single WebSocket and relays the hub's commands back.
//!
//! This crate (`wandlink-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – How text travels over the socket.  Inbound telemetry is a
//!   fixed-width 20-character hex frame; outbound commands are colon-separated
//!   `cmd:<id>:<command>:<params...>` strings.
//!
//! - **`schema`** – Which commands exist, how many parameters each takes, and
//!   which parameter values are in range.
//!
//! - **`color`** – Translation of LED colour parameters (named colours or
//!   6-digit hex) into RGB triples.

pub mod color;
pub mod protocol;
pub mod schema;

// Re-export the most-used items at the crate root so callers can write
// `wandlink_core::decode_frame` instead of `wandlink_core::protocol::frame::decode_frame`.
pub use color::{resolve_color, Rgb};
pub use protocol::command::{encode_command, HANDSHAKE};
pub use protocol::frame::{
    decode_frame, encode_frame, split_frames, DecodedFrame, DeviceId, FrameError, SensorFrame,
    FRAME_LEN,
};
pub use schema::{CommandError, CommandSchema, CommandSpec, ParamRule, SchemaError};
