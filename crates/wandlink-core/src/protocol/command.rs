//! Outbound command encoding.
//!
//! Commands travel to the gateway as plain ASCII text:
//! ```text
//! cmd:<deviceId>:<command>:<param1>:<param2>:...
//! ```
//! There is no escaping.  A `:` inside a parameter would be read as a field
//! separator by the gateway, so callers must not pass one.

use crate::protocol::frame::DeviceId;

/// Literal sent right after the transport opens to ask the gateway to start streaming.
pub const HANDSHAKE: &str = "s";

/// Leading field of every outbound command.
pub const COMMAND_PREFIX: &str = "cmd";

/// Encodes one outbound command.
///
/// The parameter list is joined with `:` and appended after a `:` that
/// follows the command name, so a command with no parameters ends in `:`.
///
/// # Examples
///
/// ```rust
/// use wandlink_core::{encode_command, DeviceId};
///
/// let id = DeviceId::new("00ab");
/// assert_eq!(encode_command(&id, "led", &["ff0000"]), "cmd:00ab:led:ff0000");
/// assert_eq!(encode_command(&id, "vibrate", &["200"]), "cmd:00ab:vibrate:200");
/// ```
pub fn encode_command<S: AsRef<str>>(device_id: &DeviceId, command: &str, params: &[S]) -> String {
    let joined = params
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(":");
    format!("{COMMAND_PREFIX}:{device_id}:{command}:{joined}")
}
