//! Per-peer broadcast channels fed by server update batches.
//!
//! Channels are created lazily on first subscription and removed on the
//! first emit after every receiver has been dropped.

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::types::{PeerUpdate, UpdateTrigger};
use crate::courier::state_manager::StateManager;
use crate::courier::transport::UpdateBatch;
use crate::courier::types::PeerId;

const BUFFER_SIZE: usize = 100;

pub struct UpdateStreamManager {
    streams: DashMap<PeerId, broadcast::Sender<PeerUpdate>>,
}

impl UpdateStreamManager {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
        }
    }

    pub fn subscribe(&self, peer_id: &PeerId) -> broadcast::Receiver<PeerUpdate> {
        self.streams
            .entry(*peer_id)
            .or_insert_with(|| broadcast::channel(BUFFER_SIZE).0)
            .subscribe()
    }

    pub fn emit(&self, peer_id: &PeerId, update: PeerUpdate) {
        let closed = match self.streams.get(peer_id) {
            Some(sender) => sender.send(update).is_err() && sender.receiver_count() == 0,
            None => false,
        };
        if closed {
            self.streams.remove(peer_id);
        }
    }
}

impl Default for UpdateStreamManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager for UpdateStreamManager {
    fn add_updates(&self, batch: UpdateBatch) {
        for update in batch.updates() {
            let Some(message) = update.message().and_then(|m| m.to_store_message()) else {
                continue;
            };
            let trigger = if update.is_edit() {
                UpdateTrigger::MessageEdited
            } else {
                UpdateTrigger::NewMessage
            };
            let peer_id = message.id.peer_id;
            tracing::debug!(
                target: "courier::update_stream",
                "Emitting {:?} for message {}",
                trigger,
                message.id
            );
            self.emit(&peer_id, PeerUpdate { trigger, message });
        }
    }
}
