//! WebSocket relay server.
//!
//! Architecture:
//! ```text
//! Peer A ──┐                        ┌── Peer A write half
//! Peer B ──┼── read tasks ── router ┼── Peer B write half
//! Peer C ──┘        │               └── Peer C write half
//!                   │
//!             Registry owner task
//!             (peer map, snapshots)
//! ```
//!
//! One task per peer reads frames and hands them to the router; the
//! registry owner task serialises every map mutation; each peer's write
//! half sits behind its own lock. The server holds no document state —
//! snapshots travel peer-to-peer via `docReq`/`docSync`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::WebSocketStream;
use uuid::Uuid;

use crate::protocol::{Message, ProtocolError};
use crate::registry::{Peer, Registry, Transport};
use crate::router;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to. A bare `:port` binds every interface.
    pub addr: String,
    /// WebSocket handshake deadline for new connections.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ":8080".to_string(),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to listen on {addr}: {source}")]
    ListenFailed {
        addr: String,
        source: std::io::Error,
    },
    #[error("accept failed: {0}")]
    Accept(#[from] std::io::Error),
}

/// Lifetime counters, logged as peers come and go.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections: AtomicU64,
    pub frames: AtomicU64,
}

/// The relay server.
pub struct CollabServer {
    config: ServerConfig,
    next_site_id: Arc<AtomicU64>,
    stats: Arc<ServerStats>,
}

impl CollabServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            next_site_id: Arc::new(AtomicU64::new(0)),
            stats: Arc::new(ServerStats::default()),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    pub fn addr(&self) -> &str {
        &self.config.addr
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Bind and serve until the listener fails.
    pub async fn run(&self) -> Result<(), ServerError> {
        let bind_addr = normalize_addr(&self.config.addr);
        let listener =
            TcpListener::bind(&bind_addr)
                .await
                .map_err(|source| ServerError::ListenFailed {
                    addr: bind_addr.clone(),
                    source,
                })?;
        tracing::info!("listening on {bind_addr}");

        let registry = Registry::new();

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            tracing::debug!("tcp connection from {peer_addr}");

            let registry = registry.clone();
            let next_site_id = self.next_site_id.clone();
            let stats = self.stats.clone();
            let handshake_timeout = self.config.handshake_timeout;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(
                    stream,
                    peer_addr,
                    registry,
                    next_site_id,
                    stats,
                    handshake_timeout,
                )
                .await
                {
                    tracing::error!("connection error from {peer_addr}: {e}");
                }
            });
        }
    }
}

/// Accept `:8080` the way the CLI advertises it.
fn normalize_addr(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

/// Write half of an accepted WebSocket connection.
struct WsTransport {
    sink: SplitSink<WebSocketStream<TcpStream>, WsMessage>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_text(&mut self, frame: String) -> Result<(), ProtocolError> {
        Ok(self.sink.send(WsMessage::Text(frame)).await?)
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        Ok(self.sink.close().await?)
    }
}

/// Serve one peer from handshake to removal.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Registry,
    next_site_id: Arc<AtomicU64>,
    stats: Arc<ServerStats>,
    handshake_timeout: Duration,
) -> Result<(), ProtocolError> {
    let ws = tokio::time::timeout(handshake_timeout, tokio_tungstenite::accept_async(stream))
        .await
        .map_err(|_| ProtocolError::HandshakeTimeout)??;
    let (sink, mut frames) = ws.split();

    let peer_id = Uuid::new_v4();
    let site_id = next_site_id.fetch_add(1, Ordering::SeqCst);
    let peer = Arc::new(Peer::new(peer_id, site_id, WsTransport { sink }));
    stats.connections.fetch_add(1, Ordering::Relaxed);
    tracing::info!("peer {peer_id} connected from {peer_addr}, site {site_id}");

    // Onboarding: identity first, then solicit a snapshot from any single
    // already-present peer on the newcomer's behalf, then the roster.
    registry.add(peer).await;
    registry
        .broadcast_one(&Message::site_id(site_id, peer_id), peer_id)
        .await;
    registry
        .broadcast_one_except(&Message::doc_req(peer_id), peer_id)
        .await;
    registry.broadcast_presence().await;

    // Steady state: one frame at a time, in arrival order.
    while let Some(frame) = frames.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                stats.frames.fetch_add(1, Ordering::Relaxed);
                match Message::decode(&text) {
                    Ok(msg) => router::route(&registry, peer_id, msg).await,
                    Err(e) => {
                        // A malformed frame poisons only this peer.
                        tracing::warn!("undecodable frame from {peer_id}: {e}");
                        break;
                    }
                }
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {} // binary/ping/pong: transport noise, not protocol
            Err(e) => {
                tracing::warn!("read error from {peer_id}: {e}");
                break;
            }
        }
    }

    tracing::info!(
        "peer {peer_id} disconnected ({} connections, {} frames so far)",
        stats.connections.load(Ordering::Relaxed),
        stats.frames.load(Ordering::Relaxed),
    );
    registry.remove(peer_id).await;
    Ok(())
}
