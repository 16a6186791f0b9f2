//! JSON wire protocol shared by the relay server and the editor client.
//!
//! Every frame is a text WebSocket message carrying one `Message` object.
//! Field names are pinned to the wire format; unknown fields are ignored
//! and missing fields take their zero values, so older and newer peers can
//! coexist on one session.

use edito_crdt::Document;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors crossing the transport boundary.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transport closed")]
    TransportClosed,
    #[error("transport i/o: {0}")]
    TransportIo(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// The six recognised traffic classes, plus a catch-all.
///
/// An unrecognised `type` string decodes to `Unknown` rather than failing
/// the frame; the router answers it with a presence-list rebroadcast and
/// otherwise drops it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MessageType {
    /// Full document snapshot, unicast to the peer that needs it.
    #[serde(rename = "docSync")]
    DocSync,
    /// Snapshot solicitation, delivered to exactly one other peer.
    #[serde(rename = "docReq")]
    DocReq,
    /// Server-assigned site identifier for the newly joined peer.
    #[serde(rename = "SiteID")]
    SiteId,
    /// A peer announcing its display name.
    #[serde(rename = "join")]
    Join,
    /// Comma-delimited roster of connected display names.
    #[serde(rename = "users")]
    Users,
    /// An insert or delete edit.
    #[serde(rename = "operation")]
    Operation,
    #[default]
    #[serde(other, rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    #[serde(rename = "insert")]
    Insert,
    #[serde(rename = "delete")]
    Delete,
}

/// One edit as it travels between peers.
///
/// `position` is 1-indexed into the visible sequence. Receivers integrate
/// the edit through their own engine; the position doubles as the cursor
/// adjustment hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireOperation {
    #[serde(rename = "type")]
    pub kind: OperationKind,
    #[serde(default)]
    pub position: usize,
    #[serde(default)]
    pub value: String,
}

impl WireOperation {
    pub fn insert(position: usize, value: impl Into<String>) -> Self {
        Self {
            kind: OperationKind::Insert,
            position,
            value: value.into(),
        }
    }

    pub fn delete(position: usize) -> Self {
        Self {
            kind: OperationKind::Delete,
            position,
            value: String::new(),
        }
    }
}

/// Top-level protocol message. One per frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: MessageType,
    /// Peer identity: the sender for `join`/`operation` (stamped by the
    /// server), the addressee for `docReq`/`docSync`/`SiteID`.
    #[serde(rename = "ID", default)]
    pub id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<WireOperation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
}

impl Message {
    /// A join announcement carrying the chosen display name.
    pub fn join(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            text: "has joined.".to_string(),
            kind: MessageType::Join,
            ..Self::default()
        }
    }

    /// Server → newcomer: the site-id to mint identities with.
    pub fn site_id(site_id: u64, id: Uuid) -> Self {
        Self {
            text: site_id.to_string(),
            kind: MessageType::SiteId,
            id,
            ..Self::default()
        }
    }

    /// Snapshot solicitation on behalf of the peer named by `id`.
    pub fn doc_req(id: Uuid) -> Self {
        Self {
            kind: MessageType::DocReq,
            id,
            ..Self::default()
        }
    }

    /// Full snapshot addressed to the peer named by `id`.
    pub fn doc_sync(document: Document, id: Uuid) -> Self {
        Self {
            kind: MessageType::DocSync,
            id,
            document: Some(document),
            ..Self::default()
        }
    }

    /// Presence list: comma-delimited display names.
    pub fn users(roster: impl Into<String>) -> Self {
        Self {
            text: roster.into(),
            kind: MessageType::Users,
            ..Self::default()
        }
    }

    /// An insert or delete edit.
    pub fn operation(operation: WireOperation) -> Self {
        Self {
            kind: MessageType::Operation,
            operation: Some(operation),
            ..Self::default()
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON text frame.
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }
}
