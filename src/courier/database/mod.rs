use std::{
    collections::HashMap,
    path::PathBuf,
    sync::LazyLock,
    time::Duration,
};

use async_trait::async_trait;
use sqlx::{
    Sqlite, SqlitePool,
    migrate::{MigrateDatabase, Migrator},
    sqlite::SqlitePoolOptions,
};
use thiserror::Error;

use super::store::{EditSnapshot, MessageStore, StoreError, StoreWrite};
use super::types::{Message, MessageId, Peer, PeerId};

pub mod messages;
pub mod peers;
pub mod utils;

pub static MIGRATOR: LazyLock<Migrator> = LazyLock::new(|| sqlx::migrate!("./db_migrations"));

const DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DB_MAX_CONNECTIONS: u32 = 10;
const DB_BUSY_TIMEOUT_MS: u32 = 5000;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// SQLite-backed [`MessageStore`].
#[derive(Clone, Debug)]
pub struct Database {
    pub pool: SqlitePool,
    pub path: PathBuf,
}

impl Database {
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}", db_path.display());

        tracing::debug!(target: "courier::database", "Checking if DB exists...{:?}", db_url);
        match Sqlite::database_exists(&db_url).await {
            Ok(true) => {
                tracing::debug!(target: "courier::database", "DB exists");
            }
            Ok(false) => {
                tracing::debug!(target: "courier::database", "DB does not exist, creating...");
                Sqlite::create_database(&db_url).await.map_err(|e| {
                    tracing::error!(target: "courier::database", "Error creating DB: {:?}", e);
                    DatabaseError::Sqlx(e)
                })?;
            }
            Err(e) => {
                tracing::warn!(
                    target: "courier::database",
                    "Could not check if database exists: {:?}, attempting to create",
                    e
                );
                Sqlite::create_database(&db_url).await?;
            }
        }

        let pool = Self::create_connection_pool(&db_url).await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self {
            pool,
            path: db_path,
        })
    }

    async fn create_connection_pool(db_url: &str) -> Result<SqlitePool, DatabaseError> {
        let pool = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
            .max_connections(DB_MAX_CONNECTIONS)
            .after_connect(|conn, _| {
                Box::pin(async move {
                    let conn = &mut *conn;
                    sqlx::query("PRAGMA journal_mode=WAL")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query(&format!("PRAGMA busy_timeout={DB_BUSY_TIMEOUT_MS}"))
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("{db_url}?mode=rwc"))
            .await?;
        Ok(pool)
    }

    /// Drops every table and rebuilds the schema from migrations.
    pub async fn delete_all_data(&self) -> Result<(), DatabaseError> {
        let mut txn = self.pool.begin().await?;

        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&mut *txn)
            .await?;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master
             WHERE type='table'
             AND name NOT LIKE 'sqlite_%'",
        )
        .fetch_all(&mut *txn)
        .await?;

        for (table_name,) in tables {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table_name))
                .execute(&mut *txn)
                .await?;
        }

        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&mut *txn)
            .await?;

        txn.commit().await?;

        MIGRATOR.run(&self.pool).await?;

        Ok(())
    }
}

#[async_trait]
impl MessageStore for Database {
    async fn get_message(&self, id: &MessageId) -> Result<Option<Message>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(messages::find_message(&mut *conn, id).await?)
    }

    async fn get_peer(&self, id: &PeerId) -> Result<Option<Peer>, StoreError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        Ok(peers::find_peer(&mut *conn, id).await?)
    }

    async fn load_edit_snapshot(
        &self,
        id: &MessageId,
        associated_peer_ids: &[PeerId],
    ) -> Result<Option<EditSnapshot>, StoreError> {
        let mut txn = self.pool.begin().await.map_err(DatabaseError::from)?;

        let Some(message) = messages::find_message(&mut *txn, id).await? else {
            txn.commit().await.map_err(DatabaseError::from)?;
            return Ok(None);
        };

        let mut associated_peers = HashMap::with_capacity(associated_peer_ids.len());
        for peer_id in associated_peer_ids {
            if let Some(peer) = peers::find_peer(&mut *txn, peer_id).await? {
                associated_peers.insert(*peer_id, peer);
            }
        }
        let peer = peers::find_peer(&mut *txn, &id.peer_id).await?;

        txn.commit().await.map_err(DatabaseError::from)?;

        Ok(Some(EditSnapshot {
            message,
            peer,
            associated_peers,
        }))
    }

    async fn save_message(&self, message: &Message) -> Result<(), StoreError> {
        let mut conn = self.pool.acquire().await.map_err(DatabaseError::from)?;
        messages::write_message(&mut *conn, message).await?;
        Ok(())
    }

    async fn apply_writes(&self, writes: Vec<StoreWrite>) -> Result<usize, StoreError> {
        let mut txn = self.pool.begin().await.map_err(DatabaseError::from)?;
        let mut updated_messages = 0;

        for write in writes {
            match write {
                StoreWrite::UpsertPeers(batch) => {
                    for peer in &batch {
                        peers::write_peer(&mut *txn, peer).await?;
                    }
                }
                StoreWrite::UpdateMessage(id, mutator) => {
                    let Some(row) = messages::find_message_row(&mut *txn, &id).await? else {
                        tracing::debug!(
                            target: "courier::database",
                            "Skipping update of missing message {}",
                            id
                        );
                        continue;
                    };
                    tracing::debug!(
                        target: "courier::database",
                        "Updating message {} (last written {})",
                        id,
                        row.updated_at
                    );
                    let previous = row.message;
                    let updated = mutator(&previous);
                    if updated.id != previous.id {
                        messages::delete_message(&mut *txn, &previous.id).await?;
                    }
                    messages::write_message(&mut *txn, &updated).await?;
                    updated_messages += 1;
                }
            }
        }

        txn.commit().await.map_err(DatabaseError::from)?;
        Ok(updated_messages)
    }
}
