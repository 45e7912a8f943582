//! Core domain types: peers, messages, media attachments and text entities.
//!
//! These are the records the [`MessageStore`](super::store::MessageStore)
//! persists and the edit pipeline reads and rewrites.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::transport::{InputPeer, InputUser};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerKind {
    User,
    Group,
    Channel,
    SecretChat,
}

impl PeerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerKind::User => "user",
            PeerKind::Group => "group",
            PeerKind::Channel => "channel",
            PeerKind::SecretChat => "secret_chat",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(PeerKind::User),
            "group" => Some(PeerKind::Group),
            "channel" => Some(PeerKind::Channel),
            "secret_chat" => Some(PeerKind::SecretChat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId {
    pub kind: PeerKind,
    pub id: i64,
}

impl PeerId {
    pub const fn new(kind: PeerKind, id: i64) -> Self {
        Self { kind, id }
    }

    pub const fn user(id: i64) -> Self {
        Self::new(PeerKind::User, id)
    }

    pub const fn group(id: i64) -> Self {
        Self::new(PeerKind::Group, id)
    }

    pub const fn channel(id: i64) -> Self {
        Self::new(PeerKind::Channel, id)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

/// Distinguishes ordinary messages from scheduled ones, and server-assigned
/// ids from locally generated ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageNamespace {
    Cloud,
    Local,
    ScheduledCloud,
    ScheduledLocal,
}

impl MessageNamespace {
    pub fn is_scheduled(&self) -> bool {
        matches!(
            self,
            MessageNamespace::ScheduledCloud | MessageNamespace::ScheduledLocal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageNamespace::Cloud => "cloud",
            MessageNamespace::Local => "local",
            MessageNamespace::ScheduledCloud => "scheduled_cloud",
            MessageNamespace::ScheduledLocal => "scheduled_local",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cloud" => Some(MessageNamespace::Cloud),
            "local" => Some(MessageNamespace::Local),
            "scheduled_cloud" => Some(MessageNamespace::ScheduledCloud),
            "scheduled_local" => Some(MessageNamespace::ScheduledLocal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId {
    pub peer_id: PeerId,
    pub namespace: MessageNamespace,
    pub id: i32,
}

impl MessageId {
    pub const fn new(peer_id: PeerId, namespace: MessageNamespace, id: i32) -> Self {
        Self {
            peer_id,
            namespace,
            id,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.peer_id, self.namespace.as_str(), self.id)
    }
}

bitflags::bitflags! {
    /// Server-visible message flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MessageFlags: u32 {
        const INCOMING = 1 << 0;
        const FAILED = 1 << 2;
        const WAS_SCHEDULED = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Tags that only exist on this device and are never sent to the server.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LocalTags: u32 {
        const OUTGOING_LIVE_LOCATION = 1 << 0;
    }
}

// Stored as raw bits; unknown bits written by newer versions are kept.
impl Serialize for MessageFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MessageFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_bits_retain)
    }
}

impl Serialize for LocalTags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for LocalTags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u32::deserialize(deserializer).map(Self::from_bits_retain)
    }
}

/// Identifies a locally cached media resource (thumbnail, file contents).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaResourceId(pub String);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapMedia {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy_radius: Option<i32>,
    /// Seconds the location is broadcast for; `None` for a static venue or point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_period: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Media {
    Image {
        resource: MediaResourceId,
        width: i32,
        height: i32,
    },
    File {
        resource: MediaResourceId,
        mime_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        size: Option<i64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    Map(MapMedia),
    WebPage {
        url: String,
    },
    Unsupported,
}

impl Media {
    pub fn is_image_or_file(&self) -> bool {
        matches!(self, Media::Image { .. } | Media::File { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPeer {
    pub id: i64,
    pub access_hash: Option<i64>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPeer {
    pub id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPeer {
    pub id: i64,
    pub access_hash: Option<i64>,
    pub title: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretChatPeer {
    pub id: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Peer {
    User(UserPeer),
    Group(GroupPeer),
    Channel(ChannelPeer),
    SecretChat(SecretChatPeer),
}

impl Peer {
    pub fn id(&self) -> PeerId {
        match self {
            Peer::User(user) => PeerId::user(user.id),
            Peer::Group(group) => PeerId::group(group.id),
            Peer::Channel(channel) => PeerId::channel(channel.id),
            Peer::SecretChat(chat) => PeerId::new(PeerKind::SecretChat, chat.id),
        }
    }

    /// The addressable form of this peer for requests, if the server can route to it.
    ///
    /// Secret chats never travel through cloud requests, and users or channels
    /// we have no access hash for cannot be addressed.
    pub fn input_peer(&self) -> Option<InputPeer> {
        match self {
            Peer::User(user) => user.access_hash.map(|access_hash| InputPeer::User {
                user_id: user.id,
                access_hash,
            }),
            Peer::Group(group) => Some(InputPeer::Chat { chat_id: group.id }),
            Peer::Channel(channel) => channel.access_hash.map(|access_hash| InputPeer::Channel {
                channel_id: channel.id,
                access_hash,
            }),
            Peer::SecretChat(_) => None,
        }
    }

    pub fn input_user(&self) -> Option<InputUser> {
        match self {
            Peer::User(user) => user.access_hash.map(|access_hash| InputUser {
                user_id: user.id,
                access_hash,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EntityKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre(Option<String>),
    Url,
    TextUrl(String),
    Email,
    PhoneNumber,
    Mention,
    Hashtag,
    BotCommand,
    /// A mention of a specific peer rendered with custom text.
    TextMention(PeerId),
}

/// A formatting annotation over `[offset, offset + length)` of the message
/// text, measured in UTF-16 code units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntity {
    pub offset: i32,
    pub length: i32,
    pub kind: EntityKind,
}

impl TextEntity {
    pub fn new(offset: i32, length: i32, kind: EntityKind) -> Self {
        Self {
            offset,
            length,
            kind,
        }
    }
}

/// Peers referenced by `TextMention` entities, deduplicated in first-seen order.
pub fn associated_peer_ids(entities: &[TextEntity]) -> Vec<PeerId> {
    let mut seen = HashSet::new();
    entities
        .iter()
        .filter_map(|entity| match &entity.kind {
            EntityKind::TextMention(peer_id) => Some(*peer_id),
            _ => None,
        })
        .filter(|peer_id| seen.insert(*peer_id))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardInfo {
    pub author_id: Option<PeerId>,
    pub source_id: Option<PeerId>,
    pub source_message_id: Option<MessageId>,
    pub date: i32,
    pub author_signature: Option<String>,
    pub psa_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub globally_unique_id: Option<i64>,
    pub grouping_key: Option<i64>,
    pub thread_id: Option<i64>,
    /// Unix seconds. For scheduled messages this is the scheduled send time.
    pub timestamp: i32,
    pub flags: MessageFlags,
    pub local_tags: LocalTags,
    pub author_id: Option<PeerId>,
    pub text: String,
    pub entities: Vec<TextEntity>,
    pub media: Vec<Media>,
    pub forward_info: Option<ForwardInfo>,
}

impl Message {
    pub fn new(id: MessageId, timestamp: i32, text: impl Into<String>) -> Self {
        Self {
            id,
            globally_unique_id: None,
            grouping_key: None,
            thread_id: None,
            timestamp,
            flags: MessageFlags::empty(),
            local_tags: LocalTags::empty(),
            author_id: None,
            text: text.into(),
            entities: Vec::new(),
            media: Vec::new(),
            forward_info: None,
        }
    }

    pub fn with_updated_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_updated_local_tags(mut self, local_tags: LocalTags) -> Self {
        self.local_tags = local_tags;
        self
    }

    pub fn with_media(mut self, media: Vec<Media>) -> Self {
        self.media = media;
        self
    }

    pub fn is_incoming(&self) -> bool {
        self.flags.contains(MessageFlags::INCOMING)
    }

    pub fn map_media(&self) -> Option<&MapMedia> {
        self.media.iter().find_map(|media| match media {
            Media::Map(map) => Some(map),
            _ => None,
        })
    }
}
