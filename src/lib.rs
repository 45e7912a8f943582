use std::path::Path;
use std::sync::{Mutex, OnceLock};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::EnvFilter, fmt::Layer, prelude::*, registry::Registry};

mod courier;

pub use crate::courier::database::{Database, DatabaseError};
pub use crate::courier::edit_message::{EditMessageParams, EditMessageResult};
pub use crate::courier::error::{CourierError, EditMessageError, Result};
pub use crate::courier::live_location::Coordinate;
pub use crate::courier::state_manager::StateManager;
pub use crate::courier::store::{
    EditSnapshot, MessageMutator, MessageStore, StoreError, StoreWrite,
};
pub use crate::courier::transport::{
    ApiChat, ApiMessage, ApiUser, EditMessageRequest, InputFile, InputGeoPoint, InputMedia,
    InputPeer, InputUser, ProximityNotificationRequest, RpcError, RpcErrorKind, ServerMessage,
    Transport, Update, UpdateBatch, WireEntity, WireEntityKind,
};
pub use crate::courier::types::{
    ChannelPeer, EntityKind, ForwardInfo, GroupPeer, LocalTags, MapMedia, Media,
    MediaResourceId, Message, MessageFlags, MessageId, MessageNamespace, Peer, PeerId, PeerKind,
    SecretChatPeer, TextEntity, UserPeer, associated_peer_ids,
};
pub use crate::courier::update_stream::{PeerUpdate, UpdateStreamManager, UpdateTrigger};
pub use crate::courier::upload::{
    AnyMediaReference, EditMedia, MediaOrigin, MediaUploader, UploadError, UploadEvent,
    UploadStream, UploadedContent,
};
pub use crate::courier::{
    Courier, CourierConfig, DEFAULT_UPLOAD_PROGRESS_FLOOR, EditConfig, MAX_STALE_REFERENCE_RETRIES,
};

static TRACING_GUARDS: OnceLock<Mutex<Vec<WorkerGuard>>> = OnceLock::new();
static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber: stdout plus a daily rolling file in
/// `logs_dir`. Only the first call has any effect.
pub(crate) fn init_tracing(logs_dir: &Path) {
    TRACING_INIT.get_or_init(|| {
        let mut guards = Vec::with_capacity(2);

        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix("courier")
            .filename_suffix("log")
            .build(logs_dir);
        let file_layer = match file_appender {
            Ok(appender) => {
                let (non_blocking_file, file_guard) = tracing_appender::non_blocking(appender);
                guards.push(file_guard);
                Some(
                    Layer::new()
                        .with_writer(non_blocking_file)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(err) => {
                eprintln!("Failed to create log file appender in {:?}: {}", logs_dir, err);
                None
            }
        };

        let (non_blocking_stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
        guards.push(stdout_guard);

        let stdout_layer = Layer::new()
            .with_writer(non_blocking_stdout)
            .with_ansi(true)
            .with_target(true);

        TRACING_GUARDS.set(Mutex::new(guards)).ok();

        // Another subscriber may already be installed by the embedding application.
        Registry::default()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(stdout_layer)
            .with(file_layer)
            .try_init()
            .ok();
    });
}
