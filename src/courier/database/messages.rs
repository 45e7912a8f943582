use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::DatabaseError;
use super::utils::{column_decode_error, parse_json, parse_timestamp};
use crate::courier::types::{
    ForwardInfo, LocalTags, Media, Message, MessageFlags, MessageId, MessageNamespace, PeerId,
    PeerKind, TextEntity,
};

/// Internal database row representation for the messages table
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MessageRow {
    pub message: Message,
    pub updated_at: DateTime<Utc>,
}

impl<'r, R> sqlx::FromRow<'r, R> for MessageRow
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    Option<String>: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    Option<i64>: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> std::result::Result<Self, sqlx::Error> {
        let peer_kind_str: String = row.try_get("peer_kind")?;
        let peer_kind = PeerKind::parse(&peer_kind_str)
            .ok_or_else(|| column_decode_error("peer_kind", "Unknown peer kind"))?;
        let peer_id: i64 = row.try_get("peer_id")?;

        let namespace_str: String = row.try_get("namespace")?;
        let namespace = MessageNamespace::parse(&namespace_str)
            .ok_or_else(|| column_decode_error("namespace", "Unknown message namespace"))?;

        let id: i64 = row.try_get("id")?;
        let timestamp: i64 = row.try_get("timestamp")?;
        let flags: i64 = row.try_get("flags")?;
        let local_tags: i64 = row.try_get("local_tags")?;

        let author_id: Option<PeerId> = row
            .try_get::<Option<String>, _>("author")?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "author".to_string(),
                source: Box::new(e),
            })?;
        let forward_info: Option<ForwardInfo> = row
            .try_get::<Option<String>, _>("forward_info")?
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "forward_info".to_string(),
                source: Box::new(e),
            })?;

        let entities: Vec<TextEntity> = parse_json(row, "entities")?;
        let media: Vec<Media> = parse_json(row, "media")?;

        let message = Message {
            id: MessageId::new(PeerId::new(peer_kind, peer_id), namespace, id as i32),
            globally_unique_id: row.try_get("globally_unique_id")?,
            grouping_key: row.try_get("grouping_key")?,
            thread_id: row.try_get("thread_id")?,
            timestamp: timestamp as i32,
            flags: MessageFlags::from_bits_retain(flags as u32),
            local_tags: LocalTags::from_bits_retain(local_tags as u32),
            author_id,
            text: row.try_get("text")?,
            entities,
            media,
            forward_info,
        };

        Ok(Self {
            message,
            updated_at: parse_timestamp(row, "updated_at")?,
        })
    }
}

pub(crate) async fn find_message(
    conn: &mut SqliteConnection,
    id: &MessageId,
) -> Result<Option<Message>, DatabaseError> {
    Ok(find_message_row(conn, id).await?.map(|row| row.message))
}

pub(crate) async fn find_message_row(
    conn: &mut SqliteConnection,
    id: &MessageId,
) -> Result<Option<MessageRow>, DatabaseError> {
    let row = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages
         WHERE peer_kind = ? AND peer_id = ? AND namespace = ? AND id = ?",
    )
    .bind(id.peer_id.kind.as_str())
    .bind(id.peer_id.id)
    .bind(id.namespace.as_str())
    .bind(id.id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row)
}

pub(crate) async fn write_message(
    conn: &mut SqliteConnection,
    message: &Message,
) -> Result<(), DatabaseError> {
    let author = message
        .author_id
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let forward_info = message
        .forward_info
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let entities = serde_json::to_string(&message.entities)?;
    let media = serde_json::to_string(&message.media)?;

    sqlx::query(
        "INSERT OR REPLACE INTO messages (
            peer_kind, peer_id, namespace, id, globally_unique_id, grouping_key, thread_id,
            timestamp, flags, local_tags, author, text, entities, media, forward_info, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(message.id.peer_id.kind.as_str())
    .bind(message.id.peer_id.id)
    .bind(message.id.namespace.as_str())
    .bind(message.id.id)
    .bind(message.globally_unique_id)
    .bind(message.grouping_key)
    .bind(message.thread_id)
    .bind(message.timestamp)
    .bind(message.flags.bits() as i64)
    .bind(message.local_tags.bits() as i64)
    .bind(author)
    .bind(&message.text)
    .bind(entities)
    .bind(media)
    .bind(forward_info)
    .bind(Utc::now().timestamp_millis())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub(crate) async fn delete_message(
    conn: &mut SqliteConnection,
    id: &MessageId,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "DELETE FROM messages
         WHERE peer_kind = ? AND peer_id = ? AND namespace = ? AND id = ?",
    )
    .bind(id.peer_id.kind.as_str())
    .bind(id.peer_id.id)
    .bind(id.namespace.as_str())
    .bind(id.id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
