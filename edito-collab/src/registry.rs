//! Single-owner registry of connected peers.
//!
//! One dedicated task owns the peer map. Everything else — the accept
//! path, per-peer read loops, the router — talks to it through a
//! multiplexed request queue and never sees the map itself, so there are
//! no lock scopes to get wrong. Reply channels are single-use and closed
//! by the owner on completion.
//!
//! Transport writes never happen on the owner task: each peer's write half
//! sits behind its own async mutex, and broadcasts lock one peer at a
//! time.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use uuid::Uuid;

use crate::protocol::{Message, ProtocolError};

/// Depth of the owner's multiplexed request queue.
const REQUEST_QUEUE: usize = 1024;

/// Write half of a peer's connection.
///
/// The registry core speaks frames, not sockets; the server plugs in a
/// WebSocket sink, tests plug in channels.
#[async_trait]
pub trait Transport: Send {
    async fn send_text(&mut self, frame: String) -> Result<(), ProtocolError>;
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

/// A connected peer as the registry sees it.
///
/// Identity is minted by the server at accept time and never changes; the
/// display name arrives later with the peer's `join` and is the only
/// mutable attribute.
pub struct Peer {
    id: Uuid,
    site_id: u64,
    name: RwLock<String>,
    transport: Mutex<Box<dyn Transport>>,
}

impl Peer {
    pub fn new(id: Uuid, site_id: u64, transport: impl Transport + 'static) -> Self {
        Self {
            id,
            site_id,
            name: RwLock::new(String::new()),
            transport: Mutex::new(Box::new(transport)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn site_id(&self) -> u64 {
        self.site_id
    }

    pub async fn name(&self) -> String {
        self.name.read().await.clone()
    }

    async fn set_name(&self, name: String) {
        *self.name.write().await = name;
    }

    /// Serialise and send one frame, holding the peer-local write lock for
    /// the duration of the write.
    pub async fn send(&self, msg: &Message) -> Result<(), ProtocolError> {
        let frame = msg.encode()?;
        self.transport.lock().await.send_text(frame).await
    }

    async fn close(&self) {
        let _ = self.transport.lock().await.close().await;
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("site_id", &self.site_id)
            .finish()
    }
}

/// One request on the owner's multiplexed queue.
///
/// A single FIFO queue keeps requests from one caller ordered: a peer
/// added and then read back by the same task is always found.
enum Request {
    Add(Arc<Peer>),
    ReadOne {
        id: Uuid,
        resp: oneshot::Sender<Option<Arc<Peer>>>,
    },
    ReadAll {
        resp: oneshot::Sender<mpsc::Receiver<Arc<Peer>>>,
    },
    Rename {
        id: Uuid,
        name: String,
    },
    Remove {
        id: Uuid,
        done: oneshot::Sender<()>,
    },
}

/// Handle to the registry owner task. Cheap to clone.
#[derive(Clone)]
pub struct Registry {
    requests_tx: mpsc::Sender<Request>,
}

impl Registry {
    /// Spawn the owner task and return a handle to it.
    pub fn new() -> Self {
        let (requests_tx, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        tokio::spawn(owner_task(requests_rx));
        Self { requests_tx }
    }

    pub async fn add(&self, peer: Arc<Peer>) {
        let _ = self.requests_tx.send(Request::Add(peer)).await;
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Peer>> {
        let (resp, rx) = oneshot::channel();
        self.requests_tx
            .send(Request::ReadOne { id, resp })
            .await
            .ok()?;
        rx.await.ok().flatten()
    }

    /// Stream a consistent snapshot of every current peer.
    ///
    /// The owner copies all handles into the reply channel before serving
    /// any other request, so concurrent adds and removes never tear the
    /// snapshot.
    pub async fn read_all(&self) -> mpsc::Receiver<Arc<Peer>> {
        let (resp, rx) = oneshot::channel();
        if self
            .requests_tx
            .send(Request::ReadAll { resp })
            .await
            .is_err()
        {
            // Owner gone: hand back an empty, closed stream.
            let (_, empty) = mpsc::channel(1);
            return empty;
        }
        match rx.await {
            Ok(stream) => stream,
            Err(_) => {
                let (_, empty) = mpsc::channel(1);
                empty
            }
        }
    }

    pub async fn rename(&self, id: Uuid, name: impl Into<String>) {
        let _ = self
            .requests_tx
            .send(Request::Rename {
                id,
                name: name.into(),
            })
            .await;
    }

    /// Close the peer's transport, drop its record, and announce the new
    /// presence list once the owner confirms the removal.
    pub async fn remove(&self, id: Uuid) {
        let (done, done_rx) = oneshot::channel();
        if self
            .requests_tx
            .send(Request::Remove { id, done })
            .await
            .is_ok()
        {
            let _ = done_rx.await;
        }
        // Boxed to break the broadcast → evict → broadcast cycle.
        Box::pin(self.broadcast_presence()).await;
    }

    /// Send to every peer. A failed destination is evicted and the
    /// broadcast carries on.
    pub async fn broadcast_all(&self, msg: &Message) {
        self.broadcast_filtered(msg, None).await;
    }

    /// Send to every peer except `except_id`.
    pub async fn broadcast_all_except(&self, msg: &Message, except_id: Uuid) {
        self.broadcast_filtered(msg, Some(except_id)).await;
    }

    async fn broadcast_filtered(&self, msg: &Message, except_id: Option<Uuid>) {
        let mut peers = self.read_all().await;
        while let Some(peer) = peers.recv().await {
            if Some(peer.id()) == except_id {
                continue;
            }
            if let Err(e) = peer.send(msg).await {
                tracing::error!("send to {} failed, evicting: {e}", peer.id());
                self.remove(peer.id()).await;
            }
        }
    }

    /// Unicast to one peer by identity.
    pub async fn broadcast_one(&self, msg: &Message, id: Uuid) {
        let Some(peer) = self.get(id).await else {
            tracing::warn!("unicast target {id} not in registry, dropping frame");
            return;
        };
        if let Err(e) = peer.send(msg).await {
            tracing::error!("send to {} failed, evicting: {e}", peer.id());
            self.remove(peer.id()).await;
        }
    }

    /// Deliver to the first peer whose identity differs from `except_id`,
    /// evicting failed candidates and moving on to the next. Used to
    /// solicit a document snapshot from any single already-present peer.
    pub async fn broadcast_one_except(&self, msg: &Message, except_id: Uuid) {
        let mut peers = self.read_all().await;
        while let Some(peer) = peers.recv().await {
            if peer.id() == except_id {
                continue;
            }
            match peer.send(msg).await {
                Ok(()) => return,
                Err(e) => {
                    tracing::error!("send to {} failed, evicting: {e}", peer.id());
                    self.remove(peer.id()).await;
                }
            }
        }
    }

    /// Broadcast the comma-delimited roster of current display names.
    pub async fn broadcast_presence(&self) {
        let mut peers = self.read_all().await;
        let mut names = Vec::new();
        while let Some(peer) = peers.recv().await {
            names.push(peer.name().await);
        }
        let roster = names.join(",");
        tracing::info!("presence: [{roster}]");
        self.broadcast_all(&Message::users(roster)).await;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

async fn owner_task(mut requests_rx: mpsc::Receiver<Request>) {
    let mut peers: HashMap<Uuid, Arc<Peer>> = HashMap::new();

    while let Some(request) = requests_rx.recv().await {
        match request {
            Request::Add(peer) => {
                tracing::debug!("registry add: {} (site {})", peer.id(), peer.site_id());
                peers.insert(peer.id(), peer);
            }
            Request::ReadOne { id, resp } => {
                let _ = resp.send(peers.get(&id).cloned());
            }
            Request::ReadAll { resp } => {
                // Fill a channel sized to the current cardinality before
                // serving anything else, so the snapshot is immune to
                // interleaving adds and removes.
                let (tx, rx) = mpsc::channel(peers.len().max(1));
                for peer in peers.values() {
                    let _ = tx.try_send(peer.clone());
                }
                let _ = resp.send(rx);
            }
            Request::Rename { id, name } => {
                if let Some(peer) = peers.get(&id) {
                    peer.set_name(name).await;
                }
            }
            Request::Remove { id, done } => {
                if let Some(peer) = peers.remove(&id) {
                    tracing::info!("closing connection with {}", peer.name().await);
                    peer.close().await;
                } else {
                    tracing::warn!("remove: peer {id} not found");
                }
                let _ = done.send(());
            }
        }
    }
}
