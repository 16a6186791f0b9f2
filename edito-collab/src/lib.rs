//! # edito-collab — relay server and client transport for edito
//!
//! Connects any number of [`edito_crdt`] replicas through a central relay
//! that holds no document state of its own.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     WebSocket     ┌──────────────┐
//! │ CollabClient │ ◄───────────────► │ CollabServer │
//! │  (per peer)  │    JSON frames    │   (relay)    │
//! └──────┬───────┘                   └──────┬───────┘
//!        │                                  │
//!        ▼                                  ▼
//! ┌──────────────┐                   ┌──────────────┐
//! │   WOOT Doc   │                   │   Registry   │
//! │   (local)    │                   │ (owner task) │
//! └──────────────┘                   └──────┬───────┘
//!                                           │
//!                                   ┌───────┴───────┐
//!                                   │    Router     │
//!                                   │   (fan-out)   │
//!                                   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire format (one [`protocol::Message`] per frame)
//! - [`registry`] — single-owner peer registry with broadcast primitives
//! - [`router`] — traffic classification and fan-out policy
//! - [`server`] — WebSocket relay server
//! - [`client`] — WebSocket client transport
//!
//! New documents never touch the server: when a peer joins, the server
//! solicits a snapshot from one existing peer (`docReq`) and relays the
//! reply (`docSync`) to the newcomer. Everything after that is operation
//! fan-out.

pub mod client;
pub mod protocol;
pub mod registry;
pub mod router;
pub mod server;

pub use client::{ClientEvent, CollabClient};
pub use protocol::{Message, MessageType, OperationKind, ProtocolError, WireOperation};
pub use registry::{Peer, Registry, Transport};
pub use server::{CollabServer, ServerConfig, ServerError, ServerStats};
