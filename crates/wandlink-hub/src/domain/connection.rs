//! Connection state machine of the registry.
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──open──► Open
//!      ▲                          │                 │
//!      └──────── dial failed ─────┘                 │
//!      └────────── closed / error / disconnect() ───┘
//! ```
//!
//! There is no automatic reconnect: leaving `Open` always lands in
//! `Disconnected`, and a fresh `connect()` is needed to go back.

use std::fmt;

use serde::Serialize;

/// Current state of the registry's transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No transport.  Commands fail with `TransportNotOpen`.
    #[default]
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Transport open; the streaming handshake has been sent.
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
        };
        f.write_str(name)
    }
}
