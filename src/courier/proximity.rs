use super::Courier;
use super::transport::ProximityNotificationRequest;
use super::types::MessageId;

impl Courier {
    /// Asks to be notified when the sender of a live location message comes
    /// within `distance` meters. Failures are logged and dropped.
    pub async fn set_proximity_alert(&self, message_id: &MessageId, distance: i32) {
        self.request_proximity_notification(
            message_id,
            ProximityNotificationRequest::FLAG_ENABLE,
            Some(distance),
        )
        .await;
    }

    /// Cancels a proximity alert set with [`Courier::set_proximity_alert`].
    pub async fn clear_proximity_alert(&self, message_id: &MessageId) {
        self.request_proximity_notification(
            message_id,
            ProximityNotificationRequest::FLAG_DISABLE,
            None,
        )
        .await;
    }

    async fn request_proximity_notification(
        &self,
        message_id: &MessageId,
        flags: i32,
        max_distance: Option<i32>,
    ) {
        let input_peer = match self.store.get_peer(&message_id.peer_id).await {
            Ok(peer) => peer.and_then(|peer| peer.input_peer()),
            Err(err) => {
                tracing::error!(
                    target: "courier::proximity",
                    "Failed to load peer {}: {}",
                    message_id.peer_id,
                    err
                );
                return;
            }
        };
        let Some(peer) = input_peer else {
            tracing::debug!(
                target: "courier::proximity",
                "Peer {} cannot be addressed",
                message_id.peer_id
            );
            return;
        };

        let request = ProximityNotificationRequest {
            flags,
            peer,
            msg_id: message_id.id,
            max_distance,
        };
        if let Err(err) = self.transport.request_proximity_notification(request).await {
            tracing::warn!(
                target: "courier::proximity",
                "Proximity notification request for {} failed: {}",
                message_id,
                err
            );
        }
    }
}
