//! WebSocket client transport for the editor.
//!
//! Owns the socket lifecycle and nothing else: frames in become decoded
//! [`Message`] events out, and messages submitted through [`send`] are
//! serialised by a dedicated writer task. Document state, cursor logic and
//! everything user-facing live with the caller.
//!
//! [`send`]: CollabClient::send

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use crate::protocol::{Message, ProtocolError};

/// How long the WebSocket handshake may take before we give up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(120);

/// Channel capacity for both directions.
const QUEUE: usize = 256;

/// Events delivered to the session loop.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A decoded frame from the server.
    Message(Message),
    /// The connection is gone; the session continues in read-only local
    /// mode and no further events will arrive.
    Disconnected,
}

/// Handle to an established server connection.
pub struct CollabClient {
    outgoing_tx: mpsc::Sender<Message>,
    event_rx: Option<mpsc::Receiver<ClientEvent>>,
}

impl CollabClient {
    /// Dial `ws://{server_addr}/` and spawn the reader and writer tasks.
    pub async fn connect(server_addr: &str) -> Result<Self, ProtocolError> {
        let url = format!("ws://{server_addr}/");
        let (ws, _) = tokio::time::timeout(HANDSHAKE_TIMEOUT, tokio_tungstenite::connect_async(&url))
            .await
            .map_err(|_| ProtocolError::HandshakeTimeout)??;
        let (mut sink, mut frames) = ws.split();

        let (outgoing_tx, mut outgoing_rx) = mpsc::channel::<Message>(QUEUE);
        let (event_tx, event_rx) = mpsc::channel::<ClientEvent>(QUEUE);

        // Writer: drain the outgoing queue into the socket.
        tokio::spawn(async move {
            while let Some(msg) = outgoing_rx.recv().await {
                let frame = match msg.encode() {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::error!("failed to encode outgoing frame: {e}");
                        continue;
                    }
                };
                if sink.send(WsMessage::Text(frame)).await.is_err() {
                    break;
                }
            }
            // Queue closed: the handle was dropped, leave the session.
            let _ = sink.close().await;
        });

        // Reader: decode frames into events until the socket dies.
        tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                match frame {
                    Ok(WsMessage::Text(text)) => match Message::decode(&text) {
                        Ok(msg) => {
                            if event_tx.send(ClientEvent::Message(msg)).await.is_err() {
                                return; // session dropped its receiver
                            }
                        }
                        Err(e) => {
                            tracing::error!("undecodable frame from server: {e}");
                            break;
                        }
                    },
                    Ok(WsMessage::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
            let _ = event_tx.send(ClientEvent::Disconnected).await;
        });

        Ok(Self {
            outgoing_tx,
            event_rx: Some(event_rx),
        })
    }

    /// Take the event receiver. Can only be taken once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<ClientEvent>> {
        self.event_rx.take()
    }

    /// A clonable handle onto the outgoing queue. The connection stays up
    /// as long as at least one sender is alive.
    pub fn sender(&self) -> mpsc::Sender<Message> {
        self.outgoing_tx.clone()
    }

    /// Queue a message for the writer task.
    pub async fn send(&self, msg: Message) -> Result<(), ProtocolError> {
        self.outgoing_tx
            .send(msg)
            .await
            .map_err(|_| ProtocolError::TransportClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused() {
        // Nothing listening on a fresh ephemeral port.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = CollabClient::connect(&format!("127.0.0.1:{port}")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_take_events_is_single_use() {
        // Connect against a real server socket so the handshake completes.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let _ws = tokio_tungstenite::accept_async(stream).await;
                // Hold the socket open briefly.
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        });

        let mut client = CollabClient::connect(&format!("127.0.0.1:{port}")).await.unwrap();
        assert!(client.take_events().is_some());
        assert!(client.take_events().is_none());
    }
}
