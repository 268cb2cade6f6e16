//! Domain layer for wandlink-hub.
//!
//! Pure types with no dependencies on sockets, timers or the async runtime:
//!
//! - [`device`] – one record per physical controller.
//! - [`link`] – the port through which a record transmits commands.
//! - [`connection`] – the registry's connection state machine.
//! - [`config`] – hub settings loaded from TOML.

pub mod config;
pub mod connection;
pub mod device;
pub mod link;

pub use config::HubConfig;
pub use connection::ConnectionState;
pub use device::{DeviceRecord, DeviceSnapshot, SendError};
pub use link::{CommandLink, LinkError};
