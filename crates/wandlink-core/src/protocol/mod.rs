//! Protocol module containing the inbound frame codec and the outbound command encoder.

pub mod command;
pub mod frame;

pub use command::{encode_command, COMMAND_PREFIX, HANDSHAKE};
pub use frame::{
    decode_frame, encode_frame, split_frames, DecodedFrame, DeviceId, FrameError, SensorFrame,
};
