//! Scripted collaborators for exercising [`Courier`] without a backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use super::database::Database;
use super::state_manager::StateManager;
use super::store::{EditSnapshot, MessageStore, StoreError, StoreWrite};
use super::transport::{
    ApiChat, ApiMessage, ApiUser, EditMessageRequest, InputFile, InputMedia,
    ProximityNotificationRequest, RpcError, ServerMessage, Transport, Update, UpdateBatch,
};
use super::types::{GroupPeer, Media, Message, MessageId, MessageNamespace, Peer, PeerId};
use super::upload::{AnyMediaReference, MediaUploader, UploadError, UploadEvent, UploadStream};
use super::{Courier, EditConfig};

pub(crate) struct MockTransport {
    edit_responses: Mutex<VecDeque<Result<UpdateBatch, RpcError>>>,
    proximity_responses: Mutex<VecDeque<Result<bool, RpcError>>>,
    pub edit_requests: Mutex<Vec<EditMessageRequest>>,
    pub proximity_requests: Mutex<Vec<ProximityNotificationRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            edit_responses: Mutex::new(VecDeque::new()),
            proximity_responses: Mutex::new(VecDeque::new()),
            edit_requests: Mutex::new(Vec::new()),
            proximity_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_edit_response(&self, response: Result<UpdateBatch, RpcError>) {
        self.edit_responses.lock().unwrap().push_back(response);
    }

    pub fn push_proximity_response(&self, response: Result<bool, RpcError>) {
        self.proximity_responses.lock().unwrap().push_back(response);
    }

    pub fn edit_requests(&self) -> Vec<EditMessageRequest> {
        self.edit_requests.lock().unwrap().clone()
    }

    pub fn proximity_requests(&self) -> Vec<ProximityNotificationRequest> {
        self.proximity_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn edit_message(&self, request: EditMessageRequest) -> Result<UpdateBatch, RpcError> {
        self.edit_requests.lock().unwrap().push(request);
        self.edit_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RpcError::new(500, "NO_SCRIPTED_RESPONSE")))
    }

    async fn request_proximity_notification(
        &self,
        request: ProximityNotificationRequest,
    ) -> Result<bool, RpcError> {
        self.proximity_requests.lock().unwrap().push(request);
        self.proximity_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(true))
    }
}

/// Plays back one scripted event list per `upload` call. When the scripts run
/// out, `upload` reports that the media cannot be uploaded.
pub(crate) struct MockUploader {
    scripts: Mutex<VecDeque<Vec<Result<UploadEvent, UploadError>>>>,
    pub force_reupload_calls: Mutex<Vec<bool>>,
    pub resource_changes: Mutex<Vec<(Media, Media)>>,
}

impl MockUploader {
    pub fn new(scripts: Vec<Vec<Result<UploadEvent, UploadError>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            force_reupload_calls: Mutex::new(Vec::new()),
            resource_changes: Mutex::new(Vec::new()),
        }
    }

    pub fn force_reupload_calls(&self) -> Vec<bool> {
        self.force_reupload_calls.lock().unwrap().clone()
    }

    pub fn resource_changes(&self) -> Vec<(Media, Media)> {
        self.resource_changes.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaUploader for MockUploader {
    fn upload(
        &self,
        _media: &AnyMediaReference,
        _peer_id: PeerId,
        force_reupload: bool,
    ) -> Option<UploadStream> {
        self.force_reupload_calls
            .lock()
            .unwrap()
            .push(force_reupload);
        let script = self.scripts.lock().unwrap().pop_front()?;
        Some(Box::pin(futures::stream::iter(script)))
    }

    async fn apply_resource_changes(&self, from: &Media, to: &Media) {
        self.resource_changes
            .lock()
            .unwrap()
            .push((from.clone(), to.clone()));
    }
}

#[derive(Default)]
pub(crate) struct RecordingStateManager {
    pub batches: Mutex<Vec<UpdateBatch>>,
}

impl RecordingStateManager {
    pub fn batches(&self) -> Vec<UpdateBatch> {
        self.batches.lock().unwrap().clone()
    }
}

impl StateManager for RecordingStateManager {
    fn add_updates(&self, batch: UpdateBatch) {
        self.batches.lock().unwrap().push(batch);
    }
}

/// Delegates to a [`Database`] but fails every write batch.
pub(crate) struct FailingWritesStore {
    inner: Arc<Database>,
}

impl FailingWritesStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl MessageStore for FailingWritesStore {
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StoreError> {
        self.inner.get_message(id).await
    }

    async fn get_peer(&self, id: &PeerId) -> Result<Option<Peer>, StoreError> {
        self.inner.get_peer(id).await
    }

    async fn load_edit_snapshot(
        &self,
        id: &MessageId,
        associated_peer_ids: &[PeerId],
    ) -> Result<Option<EditSnapshot>, StoreError> {
        self.inner.load_edit_snapshot(id, associated_peer_ids).await
    }

    async fn save_message(&self, message: &Message) -> Result<(), StoreError> {
        self.inner.save_message(message).await
    }

    async fn apply_writes(&self, _writes: Vec<StoreWrite>) -> Result<usize, StoreError> {
        Err(anyhow::anyhow!("disk full").into())
    }
}

/// Delegates to a [`Database`], but every single-row read first deletes all
/// stored messages, as a concurrent writer racing the reader would.
pub(crate) struct InterleavedDeleteStore {
    inner: Arc<Database>,
}

impl InterleavedDeleteStore {
    pub fn new(inner: Arc<Database>) -> Self {
        Self { inner }
    }

    async fn delete_messages(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM messages")
            .execute(&self.inner.pool)
            .await
            .map_err(|e| StoreError::Other(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for InterleavedDeleteStore {
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StoreError> {
        self.delete_messages().await?;
        self.inner.get_message(id).await
    }

    async fn get_peer(&self, id: &PeerId) -> Result<Option<Peer>, StoreError> {
        self.delete_messages().await?;
        self.inner.get_peer(id).await
    }

    async fn load_edit_snapshot(
        &self,
        id: &MessageId,
        associated_peer_ids: &[PeerId],
    ) -> Result<Option<EditSnapshot>, StoreError> {
        self.inner.load_edit_snapshot(id, associated_peer_ids).await
    }

    async fn save_message(&self, message: &Message) -> Result<(), StoreError> {
        self.inner.save_message(message).await
    }

    async fn apply_writes(&self, writes: Vec<StoreWrite>) -> Result<usize, StoreError> {
        self.inner.apply_writes(writes).await
    }
}

pub(crate) struct TestHarness {
    pub courier: Courier,
    pub database: Arc<Database>,
    pub transport: Arc<MockTransport>,
    pub uploader: Arc<MockUploader>,
    pub state_manager: Arc<RecordingStateManager>,
    _temp_dir: TempDir,
}

pub(crate) async fn create_test_harness(
    upload_scripts: Vec<Vec<Result<UploadEvent, UploadError>>>,
) -> TestHarness {
    create_test_harness_with_store(upload_scripts, |database| database as Arc<dyn MessageStore>).await
}

/// Like [`create_test_harness`], but the courier talks to the store built by
/// `wrap`. `TestHarness::database` still points at the underlying database.
pub(crate) async fn create_test_harness_with_store(
    upload_scripts: Vec<Vec<Result<UploadEvent, UploadError>>>,
    wrap: impl FnOnce(Arc<Database>) -> Arc<dyn MessageStore>,
) -> TestHarness {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let database = Arc::new(
        Database::new(temp_dir.path().join("courier.sqlite"))
            .await
            .expect("Failed to create test database"),
    );
    let transport = Arc::new(MockTransport::new());
    let uploader = Arc::new(MockUploader::new(upload_scripts));
    let state_manager = Arc::new(RecordingStateManager::default());

    let store = wrap(database.clone());

    let courier = Courier::new(
        EditConfig::default(),
        transport.clone(),
        store,
        uploader.clone(),
        state_manager.clone(),
    );

    TestHarness {
        courier,
        database,
        transport,
        uploader,
        state_manager,
        _temp_dir: temp_dir,
    }
}

pub(crate) fn test_group() -> Peer {
    Peer::Group(GroupPeer {
        id: 7,
        title: "Ops".to_string(),
    })
}

pub(crate) fn test_message_id() -> MessageId {
    MessageId::new(PeerId::group(7), MessageNamespace::Cloud, 42)
}

/// Stores the test group and `message`.
pub(crate) async fn seed_message(harness: &TestHarness, message: &Message) {
    harness
        .database
        .upsert_peers(vec![test_group()])
        .await
        .expect("Failed to store peer");
    harness
        .database
        .save_message(message)
        .await
        .expect("Failed to store message");
}

pub(crate) fn uploaded_photo() -> InputMedia {
    InputMedia::UploadedPhoto {
        file: InputFile {
            id: 555,
            parts: 3,
            name: "photo.jpg".to_string(),
        },
    }
}

/// An update batch that edits `id`, as the server returns for a successful edit.
pub(crate) fn edit_batch(id: MessageId, text: &str, out: bool, media: Option<Media>) -> UpdateBatch {
    UpdateBatch::Updates {
        updates: vec![Update::EditMessage {
            message: ApiMessage::Message(ServerMessage {
                id: id.id,
                peer_id: id.peer_id,
                from_id: Some(PeerId::user(1)),
                date: 1_700_000_500,
                message: text.to_string(),
                out,
                from_scheduled: id.namespace == MessageNamespace::ScheduledCloud,
                media,
                entities: vec![],
                fwd_from: None,
                grouped_id: None,
            }),
            pts: 10,
        }],
        users: vec![ApiUser {
            id: 1,
            access_hash: Some(77),
            first_name: Some("Ada".to_string()),
            last_name: None,
            username: None,
        }],
        chats: vec![ApiChat::Chat {
            id: id.peer_id.id,
            title: "Ops (renamed)".to_string(),
        }],
        date: 1_700_000_500,
        seq: 0,
    }
}
