//! WebSocket connector for the controller gateway.
//!
//! Opens one client WebSocket and splits it into two tasks:
//!
//! - **Writer**: drains the [`ChannelLink`] channel and sends each string as a
//!   text frame.  Ends when the link is closed.
//! - **Reader**: forwards text frames to the registry as
//!   [`InboundEvent::Message`].  Binary frames are accepted if they are valid
//!   UTF-8, since some gateways relay serial data as binary.  Ends with
//!   [`InboundEvent::Closed`] or [`InboundEvent::Error`].
//!
//! Both tasks are owned by the returned [`LinkSession`] and die with it.
//! WebSocket ping/pong is answered by tokio-tungstenite itself.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, info, warn};

use crate::application::session::{Connector, InboundEvent, LinkSession};
use crate::domain::link::{CommandLink, LinkError};
use crate::infrastructure::link::{ChannelLink, OUTBOUND_CAPACITY};
use crate::infrastructure::scheduler::TaskHandle;

/// Connects to the gateway over WebSocket.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<LinkSession, LinkError> {
        let (ws_stream, _response) = connect_async(url).await.map_err(|e| LinkError::ConnectFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        info!("WebSocket session established: {url}");

        let (mut ws_tx, mut ws_rx) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::unbounded_channel::<InboundEvent>();
        let link = Arc::new(ChannelLink::new(out_tx));

        // ── Writer: link → WebSocket ──────────────────────────────────────────
        let writer = TaskHandle::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = ws_tx.send(WsMessage::Text(text)).await {
                    warn!("WebSocket send failed: {e}");
                    return;
                }
            }
            // The link was closed locally.
            let _ = ws_tx.close().await;
            debug!("WebSocket writer finished");
        });

        // ── Reader: WebSocket → registry ──────────────────────────────────────
        let reader_link = Arc::clone(&link);
        let reader = TaskHandle::spawn(async move {
            while let Some(frame) = ws_rx.next().await {
                let event = match frame {
                    Ok(WsMessage::Text(text)) => InboundEvent::Message(text),
                    Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => InboundEvent::Message(text),
                        Err(_) => {
                            debug!("dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Ok(WsMessage::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        reader_link.close();
                        let _ = in_tx.send(InboundEvent::Error(e.to_string()));
                        return;
                    }
                };
                if in_tx.send(event).is_err() {
                    // Registry side is gone.
                    return;
                }
            }
            reader_link.close();
            let _ = in_tx.send(InboundEvent::Closed);
        });

        Ok(LinkSession::new(link, in_rx).with_task(writer).with_task(reader))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
