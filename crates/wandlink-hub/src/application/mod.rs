//! Application layer for wandlink-hub.
//!
//! Orchestrates the domain types: the [`registry::DeviceRegistry`] owns the
//! connection lifecycle, dispatches decoded frames to device records, prunes
//! silent devices and fans commands out.  It talks to the transport only
//! through the [`session::Connector`] port.
//!
//! # What does NOT belong here?
//!
//! - WebSocket framing (handled by tokio-tungstenite in `infrastructure`)
//! - Frame parsing rules (those live in `wandlink-core`)

pub mod registry;
pub mod session;

pub use registry::{
    DeviceHandle, DeviceRegistry, RegistryConfig, RegistryEvent, RemovalReason, PRUNE_INTERVAL,
};
pub use session::{Connector, InboundEvent, LinkSession};
