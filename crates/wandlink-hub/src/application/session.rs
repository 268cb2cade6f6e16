//! The connector port: how the registry obtains a live transport session.
//!
//! A [`Connector`] dials a URL and hands back a [`LinkSession`]: the outbound
//! [`CommandLink`] plus a stream of [`InboundEvent`]s.  The registry's session
//! driver reads that stream one event at a time, which is what keeps inbound
//! processing strictly ordered.
//!
//! Production code uses `infrastructure::ws_client::WsConnector`; tests use
//! `infrastructure::link::mock::MockConnector`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::link::{CommandLink, LinkError};
use crate::infrastructure::scheduler::TaskHandle;

/// Something that happened on the inbound side of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// One text message from the gateway.  May hold several frames.
    Message(String),
    /// The remote side closed the session.
    Closed,
    /// The transport failed.  Treated the same as `Closed`.
    Error(String),
}

/// A live transport session.
///
/// Dropping the session aborts the transport tasks it owns.
pub struct LinkSession {
    pub link: Arc<dyn CommandLink>,
    pub inbound: mpsc::UnboundedReceiver<InboundEvent>,
    tasks: Vec<TaskHandle>,
}

impl LinkSession {
    pub fn new(
        link: Arc<dyn CommandLink>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
    ) -> Self {
        Self {
            link,
            inbound,
            tasks: Vec::new(),
        }
    }

    /// Ties a background task (reader, writer) to the session's lifetime.
    pub fn with_task(mut self, task: TaskHandle) -> Self {
        self.tasks.push(task);
        self
    }
}

/// Dials the controller gateway.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a session to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::ConnectFailed`] if the session cannot be opened.
    async fn open(&self, url: &str) -> Result<LinkSession, LinkError>;
}
