//! Types for per-peer update streams.

use serde::{Deserialize, Serialize};

use crate::courier::types::Message;

/// What kind of server update produced a [`PeerUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateTrigger {
    NewMessage,
    MessageEdited,
}

/// A single message-level update delivered to subscribers of a peer.
///
/// `message` is the server's representation, converted to the stored form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerUpdate {
    pub trigger: UpdateTrigger,
    pub message: Message,
}
