//! In-memory transport for testing.
//!
//! [`MockConnector`] stands in for the WebSocket connector.  Every successful
//! `open` creates a [`MockRemote`], the test's view of the gateway side of the
//! session: push inbound text into the registry, close the session from the
//! remote end, and inspect what the registry sent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::session::{Connector, InboundEvent, LinkSession};
use crate::domain::link::{CommandLink, LinkError};

// ── MockLink ──────────────────────────────────────────────────────────────────

/// A link that records every message sent through it.
#[derive(Debug)]
pub struct MockLink {
    open: AtomicBool,
    sent: Mutex<Vec<String>>,
}

impl MockLink {
    /// Creates an open link.
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn set_open(&self, open: bool) {
        self.open.store(open, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().expect("lock poisoned").clone()
    }
}

impl Default for MockLink {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandLink for MockLink {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn send_text(&self, text: &str) -> Result<(), LinkError> {
        if !self.is_open() {
            return Err(LinkError::NotOpen);
        }
        self.sent.lock().expect("lock poisoned").push(text.to_string());
        Ok(())
    }

    fn close(&self) {
        self.set_open(false);
    }
}

// ── MockRemote ────────────────────────────────────────────────────────────────

/// The gateway side of one mock session.
#[derive(Debug, Clone)]
pub struct MockRemote {
    url: String,
    link: Arc<MockLink>,
    inbound: mpsc::UnboundedSender<InboundEvent>,
}

impl MockRemote {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn link(&self) -> Arc<MockLink> {
        Arc::clone(&self.link)
    }

    /// Messages the registry sent down this session.
    pub fn sent(&self) -> Vec<String> {
        self.link.sent()
    }

    /// Delivers one inbound text message.  Returns `false` if the registry
    /// side of the session is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound.send(InboundEvent::Message(text.into())).is_ok()
    }

    /// Closes the session from the gateway end.
    pub fn close(&self) {
        self.link.set_open(false);
        let _ = self.inbound.send(InboundEvent::Closed);
    }

    /// Fails the session with a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        self.link.set_open(false);
        let _ = self.inbound.send(InboundEvent::Error(reason.into()));
    }
}

// ── MockConnector ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct ConnectorState {
    fail_with: Option<String>,
    hang: bool,
    attempts: usize,
    remotes: Vec<MockRemote>,
}

/// A connector that opens in-memory sessions.
///
/// Clones share state, so a test can keep one clone and hand another to the
/// registry.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent `open` calls fail with `reason`.
    pub fn fail_with(&self, reason: impl Into<String>) {
        self.state.lock().expect("lock poisoned").fail_with = Some(reason.into());
    }

    /// Makes subsequent `open` calls never complete.
    pub fn hang(&self) {
        self.state.lock().expect("lock poisoned").hang = true;
    }

    /// Number of `open` calls so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.state.lock().expect("lock poisoned").attempts
    }

    /// The most recently opened session.
    pub fn last_remote(&self) -> Option<MockRemote> {
        self.state.lock().expect("lock poisoned").remotes.last().cloned()
    }

    pub fn remotes(&self) -> Vec<MockRemote> {
        self.state.lock().expect("lock poisoned").remotes.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<LinkSession, LinkError> {
        let (hang, failure) = {
            let mut state = self.state.lock().expect("lock poisoned");
            state.attempts += 1;
            (state.hang, state.fail_with.clone())
        };

        if hang {
            std::future::pending::<()>().await;
        }
        if let Some(reason) = failure {
            return Err(LinkError::ConnectFailed {
                url: url.to_string(),
                reason,
            });
        }

        let link = Arc::new(MockLink::new());
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().expect("lock poisoned").remotes.push(MockRemote {
            url: url.to_string(),
            link: Arc::clone(&link),
            inbound: tx,
        });
        Ok(LinkSession::new(link, rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_link_records_sends_while_open() {
        // Arrange
        let link = MockLink::new();

        // Act
        link.send_text("s").unwrap();
        link.close();
        let after_close = link.send_text("cmd:0001:led:red");

        // Assert
        assert_eq!(link.sent(), vec!["s"]);
        assert_eq!(after_close, Err(LinkError::NotOpen));
    }

    #[tokio::test]
    async fn test_mock_connector_opens_sessions_and_exposes_remote() {
        // Arrange
        let connector = MockConnector::new();

        // Act
        let mut session = connector.open("ws://gateway/").await.unwrap();
        let remote = connector.last_remote().unwrap();
        remote.push("0001000000000000000000");

        // Assert
        assert_eq!(remote.url(), "ws://gateway/");
        assert!(session.link.is_open());
        assert_eq!(
            session.inbound.recv().await,
            Some(InboundEvent::Message("0001000000000000000000".to_string()))
        );
    }

    #[tokio::test]
    async fn test_mock_connector_failure_mode() {
        let connector = MockConnector::new();
        connector.fail_with("refused");

        let result = connector.open("ws://gateway/").await;

        assert!(matches!(result, Err(LinkError::ConnectFailed { .. })));
        assert_eq!(connector.attempts(), 1);
        assert!(connector.last_remote().is_none());
    }

    #[tokio::test]
    async fn test_remote_close_marks_link_closed() {
        let connector = MockConnector::new();
        let mut session = connector.open("ws://gateway/").await.unwrap();

        connector.last_remote().unwrap().close();

        assert!(!session.link.is_open());
        assert_eq!(session.inbound.recv().await, Some(InboundEvent::Closed));
    }
}
