//! SQLite-backed chat store
//!
//! Every append runs in a single `BEGIN IMMEDIATE` transaction that creates
//! the channel if needed, inserts the message and bumps the channel counter,
//! so the counter never drifts from the number of stored rows. SQLite has
//! one writer at a time; concurrent writers queue on `busy_timeout`.

use super::migrations::migrate;
use super::traits::ChatStore;
use crate::chat::{
    AppendOutcome, Channel, ChannelKey, ChatError, ChatResult, GameId, Message, MessageId,
    Nation, Nations, NewMessage, Timestamp,
};
use crate::config::StoreConfig;
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MESSAGE_COLUMNS: &str =
    "id, game_id, channel_members, sender, body, created_at, idempotency_key";

/// Raw `messages` row, converted outside the query closure
struct MessageRow {
    id: i64,
    game_id: i64,
    channel_members: String,
    sender: String,
    body: String,
    created_at: i64,
    idempotency_key: Option<String>,
}

impl MessageRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(MessageRow {
            id: row.get(0)?,
            game_id: row.get(1)?,
            channel_members: row.get(2)?,
            sender: row.get(3)?,
            body: row.get(4)?,
            created_at: row.get(5)?,
            idempotency_key: row.get(6)?,
        })
    }

    fn into_message(self) -> ChatResult<Message> {
        Ok(Message {
            id: MessageId(self.id),
            game_id: GameId::new(self.game_id),
            channel_members: parse_members(&self.channel_members)?,
            sender: Nation::new(self.sender),
            body: self.body,
            created_at: Timestamp::from_micros(self.created_at).ok_or_else(|| {
                ChatError::Storage(format!("corrupt created_at {} on message {}", self.created_at, self.id))
            })?,
            idempotency_key: self.idempotency_key,
        })
    }
}

/// Raw `channels` row
struct ChannelRow {
    game_id: i64,
    members: String,
    n_messages: i64,
}

impl ChannelRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(ChannelRow {
            game_id: row.get(0)?,
            members: row.get(1)?,
            n_messages: row.get(2)?,
        })
    }

    fn into_channel(self) -> ChatResult<Channel> {
        let mut channel = Channel::new(GameId::new(self.game_id), parse_members(&self.members)?);
        channel.n_messages = counter(self.n_messages)?;
        Ok(channel)
    }
}

fn parse_members(raw: &str) -> ChatResult<Nations> {
    raw.parse()
        .map_err(|e| ChatError::Storage(format!("corrupt channel members '{}': {}", raw, e)))
}

fn counter(raw: i64) -> ChatResult<u64> {
    u64::try_from(raw).map_err(|_| ChatError::Storage(format!("negative message counter {}", raw)))
}

/// SQLite chat store with a pooled connection per blocking task
///
/// Appends take SQLite's single database-wide writer lock, so a write to one
/// channel blocks writes to every other channel until it commits. Reads run
/// concurrently under WAL.
pub struct SqliteChatStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
    path: PathBuf,
}

impl SqliteChatStore {
    /// Open (creating if needed) the database at `config.db_path` and bring
    /// its schema up to date.
    pub fn open(config: &StoreConfig) -> ChatResult<Self> {
        let path = config.db_path.clone();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ChatError::Storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        // Journal mode is persistent; switch it once, before any pooled
        // connection exists.
        let conn = Connection::open(&path)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        drop(conn);

        let busy_timeout = config.busy_timeout;
        let manager = SqliteConnectionManager::file(&path).with_init(move |c| {
            c.busy_timeout(busy_timeout)?;
            c.pragma_update(None, "foreign_keys", true)
        });
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .build(manager)
            .map_err(|e| ChatError::Storage(format!("Failed to create connection pool: {}", e)))?;

        migrate(&pool)?;

        tracing::info!(
            path = %path.display(),
            pool_size = config.pool_size,
            journal_mode = %mode,
            "Opened chat store"
        );

        Ok(Self {
            pool: Arc::new(pool),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn with_conn<T, F>(&self, f: F) -> ChatResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> ChatResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl ChatStore for SqliteChatStore {
    async fn get_channel(&self, key: &ChannelKey) -> ChatResult<Option<Channel>> {
        let key = key.clone();
        let row = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT game_id, members, n_messages FROM channels WHERE channel_key = ?1",
                        params![key.as_str()],
                        ChannelRow::from_row,
                    )
                    .optional()?)
            })
            .await?;

        row.map(ChannelRow::into_channel).transpose()
    }

    async fn append_message(
        &self,
        key: &ChannelKey,
        message: NewMessage,
    ) -> ChatResult<AppendOutcome> {
        let key = key.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if let Some(token) = &message.idempotency_key {
                let existing = tx
                    .query_row(
                        &format!(
                            "SELECT {} FROM messages
                             WHERE channel_key = ?1 AND sender = ?2 AND idempotency_key = ?3",
                            MESSAGE_COLUMNS
                        ),
                        params![key.as_str(), message.sender.as_str(), token],
                        MessageRow::from_row,
                    )
                    .optional()?;

                if let Some(row) = existing {
                    let n_messages: i64 = tx.query_row(
                        "SELECT n_messages FROM channels WHERE channel_key = ?1",
                        params![key.as_str()],
                        |row| row.get(0),
                    )?;
                    return Ok(AppendOutcome {
                        message: row.into_message()?,
                        n_messages: counter(n_messages)?,
                        replayed: true,
                    });
                }
            }

            let game_id = message.game_id.as_i64();
            let created = tx.execute(
                "INSERT OR IGNORE INTO channels (channel_key, game_id, members, n_messages)
                 VALUES (?1, ?2, ?3, 0)",
                params![key.as_str(), game_id, message.channel_members.to_string()],
            )?;
            if created > 0 {
                let mut insert_member = tx.prepare(
                    "INSERT INTO channel_members (channel_key, game_id, nation) VALUES (?1, ?2, ?3)",
                )?;
                for nation in &message.channel_members {
                    insert_member.execute(params![key.as_str(), game_id, nation.as_str()])?;
                }
            }

            tx.execute(
                "INSERT INTO messages
                    (channel_key, game_id, channel_members, sender, body, created_at, idempotency_key)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    key.as_str(),
                    game_id,
                    message.channel_members.to_string(),
                    message.sender.as_str(),
                    message.body,
                    message.created_at.as_micros(),
                    message.idempotency_key,
                ],
            )?;
            let id = tx.last_insert_rowid();

            tx.execute(
                "UPDATE channels SET n_messages = n_messages + 1 WHERE channel_key = ?1",
                params![key.as_str()],
            )?;
            let n_messages: i64 = tx.query_row(
                "SELECT n_messages FROM channels WHERE channel_key = ?1",
                params![key.as_str()],
                |row| row.get(0),
            )?;

            tx.commit()?;

            Ok(AppendOutcome {
                message: message.into_message(MessageId(id)),
                n_messages: counter(n_messages)?,
                replayed: false,
            })
        })
        .await
    }

    async fn list_messages(
        &self,
        key: &ChannelKey,
        since: Option<Timestamp>,
    ) -> ChatResult<Vec<Message>> {
        let key = key.clone();
        let since = since.map_or(i64::MIN, |ts| ts.as_micros());
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM messages
                     WHERE channel_key = ?1 AND created_at > ?2
                     ORDER BY created_at DESC, id DESC",
                    MESSAGE_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![key.as_str(), since], MessageRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    async fn count_messages_since(&self, key: &ChannelKey, since: Timestamp) -> ChatResult<u64> {
        let key = key.clone();
        let count: i64 = self
            .with_conn(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM messages WHERE channel_key = ?1 AND created_at > ?2",
                    params![key.as_str(), since.as_micros()],
                    |row| row.get(0),
                )?)
            })
            .await?;

        counter(count)
    }

    async fn list_member_channels(
        &self,
        game_id: GameId,
        nation: &Nation,
    ) -> ChatResult<Vec<Channel>> {
        let nation = nation.clone();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT c.game_id, c.members, c.n_messages
                     FROM channels c
                     JOIN channel_members m ON m.channel_key = c.channel_key
                     WHERE m.game_id = ?1 AND m.nation = ?2
                     ORDER BY c.channel_key",
                )?;
                let rows = stmt
                    .query_map(params![game_id.as_i64(), nation.as_str()], ChannelRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(ChannelRow::into_channel).collect()
    }
}
