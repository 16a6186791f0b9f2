//! Classification and fan-out for inbound frames.
//!
//! Every frame read from a peer lands here exactly once, in arrival
//! order. Each traffic class has its own fan-out policy:
//!
//! | kind        | fan-out                                   |
//! |-------------|-------------------------------------------|
//! | `join`      | rename, broadcast except sender, presence |
//! | `operation` | broadcast except sender                   |
//! | `docSync`   | unicast to the peer named by `ID`         |
//! | anything else | presence rebroadcast, then dropped      |
//!
//! `docReq` and `SiteID` frames are minted by the server during peer
//! onboarding and never accepted from peers.

use uuid::Uuid;

use crate::protocol::{Message, MessageType};
use crate::registry::Registry;

/// Dispatch one inbound frame from `sender`.
pub async fn route(registry: &Registry, sender: Uuid, mut msg: Message) {
    match msg.kind {
        MessageType::DocSync => {
            // Addressed by the ID stamped on the docReq that solicited it.
            tracing::debug!("docSync from {sender} for {}", msg.id);
            registry.broadcast_one(&msg, msg.id).await;
        }
        MessageType::Join => {
            msg.id = sender;
            tracing::info!("{} {} (ID: {sender})", msg.username, msg.text);
            registry.rename(sender, msg.username.clone()).await;
            registry.broadcast_all_except(&msg, sender).await;
            registry.broadcast_presence().await;
        }
        MessageType::Operation => {
            msg.id = sender;
            tracing::debug!("operation {:?} from {sender}", msg.operation);
            registry.broadcast_all_except(&msg, sender).await;
        }
        MessageType::DocReq | MessageType::SiteId | MessageType::Users | MessageType::Unknown => {
            tracing::warn!("unexpected {:?} frame from {sender}, dropping", msg.kind);
            registry.broadcast_presence().await;
        }
    }
}
