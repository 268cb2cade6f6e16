//! The outbound link port.
//!
//! A [`CommandLink`] is the sending half of one live transport session.  Every
//! device record created during that session holds a clone of the same
//! `Arc<dyn CommandLink>`, so "the shared outbound connection" is literally
//! one object.
//!
//! Sending is synchronous and must not block: an implementation either hands
//! the text to its transport immediately or fails.  A transport that cannot
//! keep up rejects the message instead of queueing it.

use thiserror::Error;

/// Error type for transport-level failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LinkError {
    /// The link was closed locally or by the remote side.
    #[error("link is not open")]
    NotOpen,

    /// The transport's writer went away while sending.
    #[error("transport closed while sending")]
    Closed,

    /// The transport is not draining fast enough; the message was dropped.
    #[error("link is saturated")]
    Saturated,

    /// The transport could not be established.
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },
}

/// Sending half of a transport session.
///
/// Infrastructure implementations wrap a WebSocket writer task; unit tests use
/// the `mockall`-generated `MockCommandLink` or the hand-written
/// `infrastructure::link::mock::MockLink`.
#[cfg_attr(test, mockall::automock)]
pub trait CommandLink: Send + Sync {
    /// `true` while the session can accept outbound text.
    fn is_open(&self) -> bool;

    /// Transmits one text message.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotOpen`] if the link is closed and
    /// [`LinkError::Closed`] if the transport disappeared mid-send.
    /// Returns [`LinkError::Saturated`] if the transport is backed up.
    fn send_text(&self, text: &str) -> Result<(), LinkError>;

    /// Closes the link.  Idempotent.
    fn close(&self);
}
