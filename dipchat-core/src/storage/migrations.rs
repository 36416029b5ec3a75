//! Database migrations for the chat store
//!
//! Each migration is applied atomically and tracked in the
//! `chat_schema_version` table.

use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

/// Current schema version
pub const CURRENT_CHAT_SCHEMA_VERSION: i32 = 2;

/// Migration descriptor
pub struct Migration {
    pub version: i32,
    pub description: &'static str,
    pub up_sql: &'static str,
}

/// All available migrations in order
pub fn get_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            description: "Initial channels and messages schema",
            up_sql: r#"
            -- One row per channel; the key is derived from game id + sorted members
            CREATE TABLE IF NOT EXISTS channels (
                channel_key TEXT PRIMARY KEY,           -- "{game_id}:{A,B,...}"
                game_id INTEGER NOT NULL,
                members TEXT NOT NULL,                  -- comma-joined, sorted
                n_messages INTEGER NOT NULL DEFAULT 0 CHECK(n_messages >= 0)
            );

            CREATE INDEX IF NOT EXISTS idx_channels_game ON channels(game_id);

            -- Membership index: which channels a nation belongs to
            CREATE TABLE IF NOT EXISTS channel_members (
                channel_key TEXT NOT NULL,
                game_id INTEGER NOT NULL,
                nation TEXT NOT NULL,
                PRIMARY KEY (channel_key, nation),
                FOREIGN KEY (channel_key) REFERENCES channels(channel_key) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_channel_members_nation
                ON channel_members(game_id, nation);

            -- Messages are partitioned by channel_key
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_key TEXT NOT NULL,
                game_id INTEGER NOT NULL,
                channel_members TEXT NOT NULL,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                created_at INTEGER NOT NULL,            -- microseconds since epoch
                idempotency_key TEXT,
                FOREIGN KEY (channel_key) REFERENCES channels(channel_key) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_channel_created
                ON messages(channel_key, created_at);
            CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_idempotency
                ON messages(channel_key, idempotency_key)
                WHERE idempotency_key IS NOT NULL;
            "#,
        },
        Migration {
            version: 2,
            description: "Scope idempotency keys to the sender",
            up_sql: r#"
            DROP INDEX IF EXISTS idx_messages_idempotency;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_sender_idempotency
                ON messages(channel_key, sender, idempotency_key)
                WHERE idempotency_key IS NOT NULL;
            "#,
        },
    ]
}

fn current_version(conn: &rusqlite::Connection) -> Result<i32, rusqlite::Error> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS chat_schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM chat_schema_version",
        [],
        |row| row.get(0),
    )
}

/// Get current schema version from database
pub fn get_current_version(pool: &Pool<SqliteConnectionManager>) -> Result<i32, rusqlite::Error> {
    let conn = pool.get().map_err(pool_error)?;
    current_version(&conn)
}

/// Run all pending migrations
pub fn migrate(pool: &Pool<SqliteConnectionManager>) -> Result<(), rusqlite::Error> {
    let mut conn = pool.get().map_err(pool_error)?;
    let current = current_version(&conn)?;

    for migration in get_migrations().into_iter().filter(|m| m.version > current) {
        let tx = conn.transaction()?;
        tx.execute_batch(migration.up_sql)?;
        tx.execute(
            "INSERT INTO chat_schema_version (version, applied_at) VALUES (?, ?)",
            params![migration.version, Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;

        tracing::info!(
            version = migration.version,
            description = migration.description,
            "Applied chat schema migration"
        );
    }

    Ok(())
}

fn pool_error(e: r2d2::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Failed to get connection: {}", e),
    )))
}
