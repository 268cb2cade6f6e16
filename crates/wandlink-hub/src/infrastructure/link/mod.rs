//! Concrete [`CommandLink`] implementations.
//!
//! [`ChannelLink`] is the production link: it forwards outbound text into a
//! bounded channel drained by a transport writer task (see `ws_client`).
//! Sending never blocks.  A full channel rejects the message with
//! [`LinkError::Saturated`]; once the writer is gone the link reports closed.
//!
//! # Testability
//!
//! The [`mock`] module provides an in-memory link and connector so registry
//! tests can run without a gateway.

use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

use crate::domain::link::{CommandLink, LinkError};

pub mod mock;

/// Messages the writer task may fall behind by before sends are rejected.
pub const OUTBOUND_CAPACITY: usize = 128;

/// A link backed by a channel to a writer task.
#[derive(Debug)]
pub struct ChannelLink {
    tx: Mutex<Option<Sender<String>>>,
}

impl ChannelLink {
    pub fn new(tx: Sender<String>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

impl CommandLink for ChannelLink {
    fn is_open(&self) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        tx.as_ref().is_some_and(|tx| !tx.is_closed())
    }

    fn send_text(&self, text: &str) -> Result<(), LinkError> {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            None => Err(LinkError::NotOpen),
            Some(tx) => tx.try_send(text.to_string()).map_err(|e| match e {
                TrySendError::Full(_) => LinkError::Saturated,
                TrySendError::Closed(_) => LinkError::Closed,
            }),
        }
    }

    fn close(&self) {
        // Dropping the sender ends the writer's receive loop.
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
