//! wandlink-hub library crate.
//!
//! The hub keeps a live registry of Wandlink handheld controllers.  It holds
//! one WebSocket connection to the controller gateway, decodes the telemetry
//! frames streamed over it, and sends validated actuator commands (LED,
//! brightness, vibration) back down the same connection.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Controller gateway (hex frames / cmd: strings over WebSocket)
//!         ↕
//! [wandlink-hub]
//!   ├── domain/           DeviceRecord, CommandLink port, HubConfig
//!   ├── application/      DeviceRegistry (session manager), Connector port
//!   └── infrastructure/
//!         ├── link/       Channel-backed CommandLink + test mocks
//!         ├── ws_client/  WebSocket Connector (tokio-tungstenite)
//!         └── scheduler/  Cancellable repeating task (prune timer)
//!         ↕
//! Scenes / visualizers  (consume the DeviceRegistry handle)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no async code and no I/O.
//! - `application` depends on `domain`, `wandlink-core`, and the scheduler.
//! - `infrastructure` implements the ports declared by the other layers.

/// Domain layer: device records, the outbound link port, configuration.
pub mod domain;

/// Application layer: the device registry and the connector port.
pub mod application;

/// Infrastructure layer: WebSocket connector, channel link, scheduler, mocks.
pub mod infrastructure;

pub use application::registry::{
    DeviceHandle, DeviceRegistry, RegistryConfig, RegistryEvent, RemovalReason,
};
pub use domain::connection::ConnectionState;
pub use domain::device::{DeviceRecord, DeviceSnapshot, SendError};
