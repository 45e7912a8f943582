use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use super::database::DatabaseError;
use super::types::{Message, MessageId, Peer, PeerId};

/// Receives the previously stored message and returns its replacement.
pub type MessageMutator = Box<dyn FnOnce(&Message) -> Message + Send>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// A single write inside an atomic [`MessageStore::apply_writes`] batch.
pub enum StoreWrite {
    UpsertPeers(Vec<Peer>),
    /// Replaces the stored message with the mutator's output. Skipped if no
    /// message is stored under the id.
    UpdateMessage(MessageId, MessageMutator),
}

impl std::fmt::Debug for StoreWrite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreWrite::UpsertPeers(peers) => f.debug_tuple("UpsertPeers").field(peers).finish(),
            StoreWrite::UpdateMessage(id, _) => f
                .debug_tuple("UpdateMessage")
                .field(id)
                .field(&"<mutator>")
                .finish(),
        }
    }
}

/// A message together with the peers an edit of it needs, read in one
/// transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSnapshot {
    pub message: Message,
    /// The chat the message lives in, if stored.
    pub peer: Option<Peer>,
    /// Stored peers among the requested associated ids.
    pub associated_peers: HashMap<PeerId, Peer>,
}

/// Transactional access to persisted messages and peers.
///
/// Implementations serialize their own transactions; every
/// [`apply_writes`](MessageStore::apply_writes) call is all-or-nothing.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StoreError>;

    async fn get_peer(&self, id: &PeerId) -> Result<Option<Peer>, StoreError>;

    /// Looks up several peers at once, omitting ids that are not stored.
    async fn get_peers(&self, ids: &[PeerId]) -> Result<HashMap<PeerId, Peer>, StoreError> {
        let mut peers = HashMap::with_capacity(ids.len());
        for id in ids {
            if let Some(peer) = self.get_peer(id).await? {
                peers.insert(*id, peer);
            }
        }
        Ok(peers)
    }

    /// Reads message `id`, its peer and `associated_peer_ids` from a single
    /// consistent view of the store. `None` if the message is not stored.
    async fn load_edit_snapshot(
        &self,
        id: &MessageId,
        associated_peer_ids: &[PeerId],
    ) -> Result<Option<EditSnapshot>, StoreError>;

    async fn save_message(&self, message: &Message) -> Result<(), StoreError>;

    /// Applies all writes in one transaction and reports how many messages
    /// were actually updated.
    async fn apply_writes(&self, writes: Vec<StoreWrite>) -> Result<usize, StoreError>;

    async fn update_message(
        &self,
        id: &MessageId,
        mutator: MessageMutator,
    ) -> Result<bool, StoreError> {
        let updated = self
            .apply_writes(vec![StoreWrite::UpdateMessage(*id, mutator)])
            .await?;
        Ok(updated > 0)
    }

    async fn upsert_peers(&self, peers: Vec<Peer>) -> Result<(), StoreError> {
        self.apply_writes(vec![StoreWrite::UpsertPeers(peers)])
            .await?;
        Ok(())
    }
}
