use super::Courier;
use super::transport::{EditMessageRequest, InputGeoPoint, InputMedia, InputPeer};
use super::types::{LocalTags, MapMedia, Message, MessageId, Peer};

/// A position reported by the device sharing its location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters.
    pub accuracy_radius: Option<i32>,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_radius: None,
        }
    }

    pub fn with_accuracy_radius(mut self, accuracy_radius: i32) -> Self {
        self.accuracy_radius = Some(accuracy_radius);
        self
    }
}

impl Courier {
    /// Moves a live location message to `coordinate`, or stops sharing when
    /// `coordinate` is `None`.
    ///
    /// Messages without a map attachment and peers that cannot be addressed
    /// are ignored. Server errors are logged and otherwise dropped. Stopping
    /// always clears [`LocalTags::OUTGOING_LIVE_LOCATION`] on the stored
    /// message, even if the server rejected the request.
    pub async fn update_live_location(
        &self,
        message_id: &MessageId,
        coordinate: Option<Coordinate>,
        heading: Option<i32>,
    ) {
        let Some((input_peer, map)) = self.load_live_location(message_id).await else {
            return;
        };

        let request = EditMessageRequest {
            flags: EditMessageRequest::FLAG_MEDIA,
            peer: input_peer,
            id: message_id.id,
            message: None,
            media: Some(live_location_media(&map, coordinate, heading)),
            entities: None,
            schedule_date: None,
        };

        match self.transport.edit_message(request).await {
            Ok(batch) => self.state_manager.add_updates(batch),
            Err(err) => {
                tracing::warn!(
                    target: "courier::live_location",
                    "Live location update for {} failed: {}",
                    message_id,
                    err
                );
            }
        }

        if coordinate.is_none() {
            let cleared = self
                .store
                .update_message(
                    message_id,
                    Box::new(|current: &Message| {
                        let mut local_tags = current.local_tags;
                        local_tags.remove(LocalTags::OUTGOING_LIVE_LOCATION);
                        current.clone().with_updated_local_tags(local_tags)
                    }),
                )
                .await;
            if let Err(err) = cleared {
                tracing::error!(
                    target: "courier::live_location",
                    "Failed to clear live location tag of {}: {}",
                    message_id,
                    err
                );
            }
        }
    }

    async fn load_live_location(&self, message_id: &MessageId) -> Option<(InputPeer, MapMedia)> {
        let snapshot = match self.store.load_edit_snapshot(message_id, &[]).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::debug!(
                    target: "courier::live_location",
                    "{} is not stored",
                    message_id
                );
                return None;
            }
            Err(err) => {
                tracing::error!(
                    target: "courier::live_location",
                    "Failed to load {}: {}",
                    message_id,
                    err
                );
                return None;
            }
        };

        let input_peer = snapshot.peer.as_ref().and_then(Peer::input_peer)?;
        let map = snapshot.message.map_media().cloned();
        if map.is_none() {
            tracing::debug!(
                target: "courier::live_location",
                "{} has no map attachment",
                message_id
            );
        }
        Some((input_peer, map?))
    }
}

fn live_location_media(
    map: &MapMedia,
    coordinate: Option<Coordinate>,
    heading: Option<i32>,
) -> InputMedia {
    match (coordinate, map.live_period) {
        (Some(coordinate), Some(period)) => {
            let mut geo_flags = 0;
            if coordinate.accuracy_radius.is_some() {
                geo_flags |= InputGeoPoint::FLAG_ACCURACY_RADIUS;
            }
            InputMedia::GeoLive {
                flags: InputMedia::GEO_LIVE_PERIOD,
                geo_point: InputGeoPoint {
                    flags: geo_flags,
                    lat: coordinate.latitude,
                    long: coordinate.longitude,
                    accuracy_radius: coordinate.accuracy_radius,
                },
                heading: heading.unwrap_or(0),
                period: Some(period),
            }
        }
        _ => InputMedia::GeoLive {
            flags: InputMedia::GEO_LIVE_STOPPED,
            geo_point: InputGeoPoint {
                flags: 0,
                lat: map.latitude,
                long: map.longitude,
                accuracy_radius: None,
            },
            heading: 0,
            period: None,
        },
    }
}
