use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use super::transport::InputMedia;
use super::types::{Media, MessageId, PeerId};

/// Where a piece of media can be (re)obtained from when it has to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOrigin {
    /// A file on this device that has never been uploaded.
    Local { path: PathBuf },
    /// Media already on the server, optionally with the message it was seen in
    /// so an expired file reference can be revalidated.
    Remote {
        message_id: Option<MessageId>,
        file_reference: Option<Vec<u8>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnyMediaReference {
    pub media: Media,
    pub origin: MediaOrigin,
}

impl AnyMediaReference {
    pub fn new(media: Media, origin: MediaOrigin) -> Self {
        Self { media, origin }
    }
}

/// Media part of an edit.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EditMedia {
    #[default]
    Keep,
    Replace(AnyMediaReference),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadedContent {
    Media(InputMedia),
    /// The media was folded into the message text; nothing to attach.
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// Fraction in `[0, 1)`.
    Progress(f32),
    Content(UploadedContent),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Upload failed: {0}")]
    Generic(String),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),
}

pub type UploadStream = BoxStream<'static, Result<UploadEvent, UploadError>>;

/// Turns media references into uploadable content.
#[async_trait]
pub trait MediaUploader: Send + Sync {
    /// Starts preparing `media` for a request addressed to `peer_id`.
    ///
    /// Returns `None` when the media cannot be uploaded at all. With
    /// `force_reupload` set, cached server references must not be reused.
    fn upload(
        &self,
        media: &AnyMediaReference,
        peer_id: PeerId,
        force_reupload: bool,
    ) -> Option<UploadStream>;

    /// Moves locally cached resources of `from` under the identifiers of
    /// `to`, the media the server assigned after the edit.
    async fn apply_resource_changes(&self, from: &Media, to: &Media);
}
