//! Editing already sent messages.
//!
//! An edit is a sequence of attempts. Each attempt uploads replacement media
//! (if any), reads the current message and peer, sends the edit request, and
//! applies the returned updates locally before handing them to the
//! [`StateManager`](super::state_manager::StateManager). When the server
//! rejects a stale media file reference the whole attempt is repeated with a
//! forced reupload, a bounded number of times.

use std::collections::HashMap;

use futures::{Stream, StreamExt};

use super::{Courier, MAX_STALE_REFERENCE_RETRIES};
use super::entities::wire_entities;
use super::error::{EditAttemptError, EditMessageError};
use super::store::{MessageMutator, StoreWrite};
use super::transport::{EditMessageRequest, InputMedia, InputPeer, RpcErrorKind, UpdateBatch};
use super::types::{LocalTags, Message, MessageFlags, MessageId, Peer, PeerId, TextEntity, associated_peer_ids};
use super::upload::{EditMedia, UploadEvent, UploadedContent};

/// Everything needed to edit one message.
#[derive(Debug, Clone, PartialEq)]
pub struct EditMessageParams {
    pub message_id: MessageId,
    pub text: String,
    pub media: EditMedia,
    pub entities: Option<Vec<TextEntity>>,
    pub disable_url_preview: bool,
    /// New send time for a scheduled message, unix seconds.
    pub schedule_time: Option<i32>,
}

impl EditMessageParams {
    pub fn new(message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            message_id,
            text: text.into(),
            media: EditMedia::Keep,
            entities: None,
            disable_url_preview: false,
            schedule_time: None,
        }
    }

    pub fn with_media(mut self, media: EditMedia) -> Self {
        self.media = media;
        self
    }

    pub fn with_entities(mut self, entities: Vec<TextEntity>) -> Self {
        self.entities = Some(entities);
        self
    }

    pub fn with_url_preview_disabled(mut self) -> Self {
        self.disable_url_preview = true;
        self
    }

    pub fn with_schedule_time(mut self, schedule_time: i32) -> Self {
        self.schedule_time = Some(schedule_time);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditMessageResult {
    /// Upload progress in `[0, 1)`.
    Progress(f32),
    /// The edit finished. `true` if the server applied it and the local copy
    /// was updated; `false` if there was nothing to edit.
    Done(bool),
}

/// State read from the store before building a request.
struct EditTarget {
    message: Message,
    input_peer: InputPeer,
    associated_peers: HashMap<PeerId, Peer>,
}

impl Courier {
    /// Edits a message, reporting media upload progress until the edit completes.
    ///
    /// The stream yields any number of [`EditMessageResult::Progress`] items
    /// followed by exactly one [`EditMessageResult::Done`], or ends with an
    /// [`EditMessageError`]. Dropping the stream abandons the edit.
    ///
    /// A missing message or peer, an unaddressable peer, and an empty text
    /// that would leave the message without content all finish with
    /// `Done(false)` without contacting the server.
    pub fn edit_message(
        &self,
        params: EditMessageParams,
    ) -> impl Stream<Item = Result<EditMessageResult, EditMessageError>> + Send + 'static {
        let courier = self.clone();

        async_stream::stream! {
            let mut force_reupload = false;
            let mut retries_left = courier
                .edit_config
                .stale_reference_retries
                .min(MAX_STALE_REFERENCE_RETRIES);

            loop {
                let mut failure = None;
                {
                    let attempt = courier.edit_attempt(&params, force_reupload);
                    futures::pin_mut!(attempt);
                    while let Some(item) = attempt.next().await {
                        match item {
                            Ok(result) => yield Ok(result),
                            Err(err) => {
                                failure = Some(err);
                                break;
                            }
                        }
                    }
                }

                match failure {
                    None => break,
                    Some(EditAttemptError::InvalidReference) if retries_left > 0 => {
                        retries_left -= 1;
                        force_reupload = true;
                        tracing::info!(
                            target: "courier::edit_message",
                            "Stale media reference editing {}, retrying with forced reupload",
                            params.message_id
                        );
                    }
                    Some(err) => {
                        let err = EditMessageError::from(err);
                        tracing::warn!(
                            target: "courier::edit_message",
                            "Editing {} failed: {}",
                            params.message_id,
                            err
                        );
                        yield Err(err);
                        break;
                    }
                }
            }
        }
    }

    fn edit_attempt<'a>(
        &'a self,
        params: &'a EditMessageParams,
        force_reupload: bool,
    ) -> impl Stream<Item = Result<EditMessageResult, EditAttemptError>> + Send + 'a {
        async_stream::try_stream! {
            let mut uploaded_media = None;

            match &params.media {
                EditMedia::Keep => {
                    yield EditMessageResult::Progress(0.0);
                }
                EditMedia::Replace(reference) => {
                    let floor = self.edit_config.upload_progress_floor;
                    if let Some(mut upload) =
                        self.uploader
                            .upload(reference, params.message_id.peer_id, force_reupload)
                    {
                        yield EditMessageResult::Progress(floor);

                        while let Some(event) = upload.next().await {
                            match event {
                                Ok(UploadEvent::Progress(progress)) => {
                                    yield EditMessageResult::Progress(progress.max(floor));
                                }
                                Ok(UploadEvent::Content(UploadedContent::Media(media))) => {
                                    uploaded_media = Some(media);
                                    break;
                                }
                                Ok(UploadEvent::Content(UploadedContent::Text(_))) => break,
                                Err(err) => {
                                    tracing::warn!(
                                        target: "courier::edit_message",
                                        "Media upload for {} failed, editing text only: {}",
                                        params.message_id,
                                        err
                                    );
                                    break;
                                }
                            }
                        }
                    } else {
                        tracing::debug!(
                            target: "courier::edit_message",
                            "No uploadable content for replacement media of {}",
                            params.message_id
                        );
                    }
                }
            }

            let applied = self.submit_edit(params, uploaded_media).await?;
            yield EditMessageResult::Done(applied);
        }
    }

    async fn load_edit_target(
        &self,
        params: &EditMessageParams,
        has_new_media: bool,
    ) -> Result<Option<EditTarget>, EditAttemptError> {
        let message_id = &params.message_id;

        let associated_ids = params
            .entities
            .as_deref()
            .map(associated_peer_ids)
            .unwrap_or_default();
        let Some(snapshot) = self
            .store
            .load_edit_snapshot(message_id, &associated_ids)
            .await?
        else {
            tracing::debug!(target: "courier::edit_message", "Message {} not found", message_id);
            return Ok(None);
        };
        let message = snapshot.message;

        if params.text.is_empty() && !allows_empty_text(&message, params.schedule_time, has_new_media)
        {
            tracing::debug!(
                target: "courier::edit_message",
                "Refusing to clear the text of {} without media to keep",
                message_id
            );
            return Ok(None);
        }

        let Some(peer) = snapshot.peer else {
            tracing::debug!(
                target: "courier::edit_message",
                "Peer {} not found",
                message_id.peer_id
            );
            return Ok(None);
        };
        let Some(input_peer) = peer.input_peer() else {
            tracing::debug!(
                target: "courier::edit_message",
                "Peer {} cannot be addressed",
                message_id.peer_id
            );
            return Ok(None);
        };

        Ok(Some(EditTarget {
            message,
            input_peer,
            associated_peers: snapshot.associated_peers,
        }))
    }

    async fn submit_edit(
        &self,
        params: &EditMessageParams,
        uploaded_media: Option<InputMedia>,
    ) -> Result<bool, EditAttemptError> {
        let Some(target) = self
            .load_edit_target(params, uploaded_media.is_some())
            .await?
        else {
            return Ok(false);
        };

        let request = build_edit_request(params, &target, uploaded_media);

        let batch = match self.transport.edit_message(request).await {
            Ok(batch) => batch,
            Err(err) => {
                tracing::debug!(
                    target: "courier::edit_message",
                    "Edit request for {} failed: {}",
                    params.message_id,
                    err
                );
                return match err.kind() {
                    RpcErrorKind::MessageNotModified => Ok(false),
                    RpcErrorKind::FileReferenceExpired => Err(EditAttemptError::InvalidReference),
                    RpcErrorKind::TooLong => Err(EditMessageError::TextTooLong.into()),
                    RpcErrorKind::SendForbidden => Err(EditMessageError::Restricted.into()),
                    RpcErrorKind::Other => Err(EditMessageError::Generic.into()),
                };
            }
        };

        self.apply_edit_result(params, batch).await?;
        Ok(true)
    }

    /// Stores the peers and messages carried by `batch`, then forwards it.
    async fn apply_edit_result(
        &self,
        params: &EditMessageParams,
        batch: UpdateBatch,
    ) -> Result<(), EditAttemptError> {
        if let EditMedia::Replace(from) = &params.media {
            let to_media = batch
                .messages()
                .first()
                .and_then(|message| message.to_store_message())
                .and_then(|message| message.media.into_iter().next());
            if let Some(to_media) = to_media {
                self.uploader
                    .apply_resource_changes(&from.media, &to_media)
                    .await;
            }
        }

        // Only full update batches are applied locally; short forms are left
        // to the state manager.
        let api_messages = match &batch {
            UpdateBatch::Updates { .. } => batch.messages(),
            _ => Vec::new(),
        };
        let messages: Vec<Message> = api_messages
            .into_iter()
            .filter_map(|message| message.to_store_message())
            .collect();

        if !messages.is_empty() {
            let mut writes = vec![StoreWrite::UpsertPeers(batch.peers())];
            writes.extend(messages.into_iter().map(|message| {
                StoreWrite::UpdateMessage(message.id, preserving_local_state(message))
            }));
            let updated = self.store.apply_writes(writes).await?;
            tracing::debug!(
                target: "courier::edit_message",
                "Applied edit of {} to {} stored message(s)",
                params.message_id,
                updated
            );
        }

        self.state_manager.add_updates(batch);
        Ok(())
    }
}

/// An empty text is only acceptable when the message keeps some content.
fn allows_empty_text(message: &Message, schedule_time: Option<i32>, has_new_media: bool) -> bool {
    schedule_time.is_some()
        || has_new_media
        || (!message.media.is_empty() && message.media.iter().all(|media| media.is_image_or_file()))
}

fn build_edit_request(
    params: &EditMessageParams,
    target: &EditTarget,
    media: Option<InputMedia>,
) -> EditMessageRequest {
    let mut flags = EditMessageRequest::FLAG_MESSAGE;

    let entities = params.entities.as_ref().map(|entities| {
        flags |= EditMessageRequest::FLAG_ENTITIES;
        wire_entities(entities, &target.associated_peers)
    });

    if params.disable_url_preview {
        flags |= EditMessageRequest::FLAG_NO_WEBPAGE;
    }

    if media.is_some() {
        flags |= EditMessageRequest::FLAG_MEDIA;
    }

    let mut schedule_date = None;
    if params.message_id.namespace.is_scheduled() {
        schedule_date = Some(params.schedule_time.unwrap_or(target.message.timestamp));
        flags |= EditMessageRequest::FLAG_SCHEDULE_DATE;
    }

    EditMessageRequest {
        flags,
        peer: target.input_peer,
        id: params.message_id.id,
        message: Some(params.text.clone()),
        media,
        entities,
        schedule_date,
    }
}

/// Replaces the stored message with `updated`, keeping the local live-location
/// tag and the previous incoming/outgoing direction.
fn preserving_local_state(updated: Message) -> MessageMutator {
    Box::new(move |previous: &Message| {
        let mut flags = updated.flags;
        let mut local_tags = updated.local_tags;
        if previous.local_tags.contains(LocalTags::OUTGOING_LIVE_LOCATION) {
            local_tags.insert(LocalTags::OUTGOING_LIVE_LOCATION);
        }
        if previous.flags.contains(MessageFlags::INCOMING) {
            flags.insert(MessageFlags::INCOMING);
        } else {
            flags.remove(MessageFlags::INCOMING);
        }
        updated
            .with_updated_local_tags(local_tags)
            .with_updated_flags(flags)
    })
}
