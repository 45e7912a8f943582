//! Request/response contract with the messaging backend.
//!
//! The crate does not ship a network client; embedders implement
//! [`Transport`] over whatever session layer they run. Errors come back as
//! [`RpcError`] and are classified once, in [`RpcErrorKind::from_description`],
//! so the rest of the crate matches on structured kinds rather than strings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{
    ChannelPeer, ForwardInfo, GroupPeer, Media, Message, MessageFlags, MessageId,
    MessageNamespace, Peer, PeerId, TextEntity, UserPeer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPeer {
    User { user_id: i64, access_hash: i64 },
    Chat { chat_id: i64 },
    Channel { channel_id: i64, access_hash: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InputUser {
    pub user_id: i64,
    pub access_hash: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    pub id: i64,
    pub parts: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputGeoPoint {
    pub flags: i32,
    pub lat: f64,
    pub long: f64,
    pub accuracy_radius: Option<i32>,
}

impl InputGeoPoint {
    pub const FLAG_ACCURACY_RADIUS: i32 = 1 << 0;
}

/// Media payload attached to an outgoing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputMedia {
    UploadedPhoto {
        file: InputFile,
    },
    UploadedDocument {
        file: InputFile,
        mime_type: String,
        file_name: Option<String>,
    },
    /// An already uploaded photo, re-sent by reference.
    Photo {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
    },
    /// An already uploaded document, re-sent by reference.
    Document {
        id: i64,
        access_hash: i64,
        file_reference: Vec<u8>,
    },
    GeoLive {
        flags: i32,
        geo_point: InputGeoPoint,
        heading: i32,
        period: Option<i32>,
    },
}

impl InputMedia {
    /// `GeoLive` flag: sharing has stopped.
    pub const GEO_LIVE_STOPPED: i32 = 1 << 0;
    /// `GeoLive` flag: a broadcast period is present.
    pub const GEO_LIVE_PERIOD: i32 = 1 << 1;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WireEntityKind {
    Bold,
    Italic,
    Underline,
    Strike,
    Spoiler,
    Code,
    Pre(String),
    Url,
    TextUrl(String),
    Email,
    Phone,
    Mention,
    Hashtag,
    BotCommand,
    InputMentionName(InputUser),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireEntity {
    pub offset: i32,
    pub length: i32,
    pub kind: WireEntityKind,
}

/// `messages.editMessage` parameters for one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditMessageRequest {
    pub flags: i32,
    pub peer: InputPeer,
    pub id: i32,
    pub message: Option<String>,
    pub media: Option<InputMedia>,
    pub entities: Option<Vec<WireEntity>>,
    pub schedule_date: Option<i32>,
}

impl EditMessageRequest {
    pub const FLAG_NO_WEBPAGE: i32 = 1 << 1;
    pub const FLAG_ENTITIES: i32 = 1 << 3;
    pub const FLAG_MESSAGE: i32 = 1 << 11;
    pub const FLAG_MEDIA: i32 = 1 << 14;
    pub const FLAG_SCHEDULE_DATE: i32 = 1 << 15;

    pub fn has_flag(&self, flag: i32) -> bool {
        self.flags & flag == flag
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProximityNotificationRequest {
    pub flags: i32,
    pub peer: InputPeer,
    pub msg_id: i32,
    pub max_distance: Option<i32>,
}

impl ProximityNotificationRequest {
    pub const FLAG_ENABLE: i32 = 1 << 0;
    pub const FLAG_DISABLE: i32 = 1 << 1;
}

/// A message as the server describes it inside an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub id: i32,
    pub peer_id: PeerId,
    pub from_id: Option<PeerId>,
    pub date: i32,
    pub message: String,
    /// Sent by the current account.
    pub out: bool,
    pub from_scheduled: bool,
    pub media: Option<Media>,
    pub entities: Vec<TextEntity>,
    pub fwd_from: Option<ForwardInfo>,
    pub grouped_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiMessage {
    Message(ServerMessage),
    Empty { id: i32 },
}

impl ApiMessage {
    /// Converts to the stored representation, if the message carries any content.
    pub fn to_store_message(&self) -> Option<Message> {
        let ApiMessage::Message(message) = self else {
            return None;
        };

        let namespace = if message.from_scheduled {
            MessageNamespace::ScheduledCloud
        } else {
            MessageNamespace::Cloud
        };

        let mut flags = MessageFlags::empty();
        if !message.out {
            flags.insert(MessageFlags::INCOMING);
        }
        if message.from_scheduled {
            flags.insert(MessageFlags::WAS_SCHEDULED);
        }

        let mut stored = Message::new(
            MessageId::new(message.peer_id, namespace, message.id),
            message.date,
            message.message.clone(),
        )
        .with_updated_flags(flags)
        .with_media(message.media.iter().cloned().collect());
        stored.author_id = message.from_id;
        stored.entities = message.entities.clone();
        stored.forward_info = message.fwd_from.clone();
        stored.grouping_key = message.grouped_id;
        Some(stored)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    NewMessage { message: ApiMessage, pts: i32 },
    EditMessage { message: ApiMessage, pts: i32 },
    NewChannelMessage { message: ApiMessage, pts: i32 },
    EditChannelMessage { message: ApiMessage, pts: i32 },
    DeleteMessages { ids: Vec<i32>, pts: i32 },
}

impl Update {
    pub fn message(&self) -> Option<&ApiMessage> {
        match self {
            Update::NewMessage { message, .. }
            | Update::EditMessage { message, .. }
            | Update::NewChannelMessage { message, .. }
            | Update::EditChannelMessage { message, .. } => Some(message),
            Update::DeleteMessages { .. } => None,
        }
    }

    pub fn is_edit(&self) -> bool {
        matches!(
            self,
            Update::EditMessage { .. } | Update::EditChannelMessage { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiUser {
    pub id: i64,
    pub access_hash: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl From<&ApiUser> for Peer {
    fn from(user: &ApiUser) -> Self {
        Peer::User(UserPeer {
            id: user.id,
            access_hash: user.access_hash,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiChat {
    Chat {
        id: i64,
        title: String,
    },
    ChatForbidden {
        id: i64,
        title: String,
    },
    Channel {
        id: i64,
        access_hash: Option<i64>,
        title: String,
        username: Option<String>,
    },
    ChannelForbidden {
        id: i64,
        access_hash: i64,
        title: String,
    },
    Empty {
        id: i64,
    },
}

impl ApiChat {
    pub fn to_peer(&self) -> Option<Peer> {
        match self {
            ApiChat::Chat { id, title } | ApiChat::ChatForbidden { id, title } => {
                Some(Peer::Group(GroupPeer {
                    id: *id,
                    title: title.clone(),
                }))
            }
            ApiChat::Channel {
                id,
                access_hash,
                title,
                username,
            } => Some(Peer::Channel(ChannelPeer {
                id: *id,
                access_hash: *access_hash,
                title: title.clone(),
                username: username.clone(),
            })),
            ApiChat::ChannelForbidden {
                id,
                access_hash,
                title,
            } => Some(Peer::Channel(ChannelPeer {
                id: *id,
                access_hash: Some(*access_hash),
                title: title.clone(),
                username: None,
            })),
            ApiChat::Empty { .. } => None,
        }
    }
}

/// Updates returned by the server for a state-changing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpdateBatch {
    /// The client fell too far behind and must resync through other means.
    TooLong,
    Short {
        update: Update,
        date: i32,
    },
    Updates {
        updates: Vec<Update>,
        users: Vec<ApiUser>,
        chats: Vec<ApiChat>,
        date: i32,
        seq: i32,
    },
}

impl UpdateBatch {
    pub fn updates(&self) -> Vec<&Update> {
        match self {
            UpdateBatch::TooLong => Vec::new(),
            UpdateBatch::Short { update, .. } => vec![update],
            UpdateBatch::Updates { updates, .. } => updates.iter().collect(),
        }
    }

    pub fn messages(&self) -> Vec<&ApiMessage> {
        self.updates()
            .into_iter()
            .filter_map(Update::message)
            .collect()
    }

    /// Users, groups and channels carried alongside the updates.
    pub fn peers(&self) -> Vec<Peer> {
        let UpdateBatch::Updates { users, chats, .. } = self else {
            return Vec::new();
        };
        chats
            .iter()
            .filter_map(ApiChat::to_peer)
            .chain(users.iter().map(Peer::from))
            .collect()
    }
}

/// Classification of a backend error description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RpcErrorKind {
    /// A media file reference the request relied on has expired.
    FileReferenceExpired,
    /// Some field of the request exceeds a server limit.
    TooLong,
    /// The destination does not allow this kind of content.
    SendForbidden,
    /// The edit would not change anything.
    MessageNotModified,
    Other,
}

impl RpcErrorKind {
    pub fn from_description(description: &str) -> Self {
        if description.starts_with("FILEREF_INVALID") || description.starts_with("FILE_REFERENCE_")
        {
            RpcErrorKind::FileReferenceExpired
        } else if description == "MESSAGE_NOT_MODIFIED" {
            RpcErrorKind::MessageNotModified
        } else if description.ends_with("_TOO_LONG") {
            RpcErrorKind::TooLong
        } else if description.starts_with("CHAT_SEND_") && description.ends_with("_FORBIDDEN") {
            RpcErrorKind::SendForbidden
        } else {
            RpcErrorKind::Other
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("RPC error {code}: {description}")]
pub struct RpcError {
    pub code: i32,
    pub description: String,
}

impl RpcError {
    pub fn new(code: i32, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> RpcErrorKind {
        RpcErrorKind::from_description(&self.description)
    }
}

/// Asynchronous request/response access to the messaging backend.
///
/// Timeouts and reconnection belong to the implementation; dropping a
/// returned future abandons the request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn edit_message(&self, request: EditMessageRequest) -> Result<UpdateBatch, RpcError>;

    async fn request_proximity_notification(
        &self,
        request: ProximityNotificationRequest,
    ) -> Result<bool, RpcError>;
}
