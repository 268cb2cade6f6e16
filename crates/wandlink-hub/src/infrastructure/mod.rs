//! Infrastructure layer for wandlink-hub.
//!
//! Contains the I/O-facing adapters: the WebSocket connector, the
//! channel-backed command link, in-memory test doubles, and the task helpers
//! the registry uses for its background work.

pub mod link;
pub mod scheduler;
pub mod ws_client;

pub use link::ChannelLink;
pub use scheduler::{RepeatingTask, TaskHandle};
pub use ws_client::WsConnector;
