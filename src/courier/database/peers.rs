use chrono::Utc;
use sqlx::SqliteConnection;

use super::DatabaseError;
use super::utils::{column_decode_error, parse_json};
use crate::courier::types::{Peer, PeerId, PeerKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PeerRow {
    pub peer: Peer,
}

impl<'r, R> sqlx::FromRow<'r, R> for PeerRow
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> std::result::Result<Self, sqlx::Error> {
        let kind_str: String = row.try_get("kind")?;
        let kind = PeerKind::parse(&kind_str)
            .ok_or_else(|| column_decode_error("kind", "Unknown peer kind"))?;
        let id = PeerId::new(kind, row.try_get("id")?);

        let peer: Peer = parse_json(row, "payload")?;
        if peer.id() != id {
            return Err(column_decode_error(
                "payload",
                "Peer payload does not match its key",
            ));
        }

        Ok(Self { peer })
    }
}

pub(crate) async fn find_peer(
    conn: &mut SqliteConnection,
    id: &PeerId,
) -> Result<Option<Peer>, DatabaseError> {
    let row = sqlx::query_as::<_, PeerRow>("SELECT * FROM peers WHERE kind = ? AND id = ?")
        .bind(id.kind.as_str())
        .bind(id.id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(row.map(|row| row.peer))
}

/// Inserts the peer or replaces the stored copy, keeping the original `created_at`.
pub(crate) async fn write_peer(conn: &mut SqliteConnection, peer: &Peer) -> Result<(), DatabaseError> {
    let id = peer.id();
    let payload = serde_json::to_string(peer)?;
    let now = Utc::now().timestamp_millis();

    sqlx::query(
        "INSERT INTO peers (kind, id, payload, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)
         ON CONFLICT(kind, id) DO UPDATE SET
            payload = excluded.payload,
            updated_at = excluded.updated_at",
    )
    .bind(id.kind.as_str())
    .bind(id.id)
    .bind(payload)
    .bind(now)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
