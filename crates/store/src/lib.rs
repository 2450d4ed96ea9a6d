//! Message store adapter: an append-only per-conversation log of turns,
//! persisted in SQLite with parameterized queries.
//!
//! All public methods are async; the blocking rusqlite calls run on the
//! tokio blocking pool so the request path never stalls the runtime.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use relay_domain::turn::{NewTurn, SenderType, Turn};
use relay_domain::{Error, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS conversations (
    id          INTEGER PRIMARY KEY,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS turns (
    id              INTEGER PRIMARY KEY,
    conversation_id INTEGER NOT NULL REFERENCES conversations(id),
    content         TEXT,
    summary         TEXT,
    sender_type     TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_turns_conversation
    ON turns(conversation_id, created_at, id);
";

/// Durable owner of conversation and turn state.
pub struct ConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl ConversationStore {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(store_err)?;
        tracing::debug!(path = %path.display(), "opened conversation database");
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests and one-shot CLI runs.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(store_err)?;
        conn.execute_batch(SCHEMA).map_err(store_err)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    /// Allocate a new conversation and return its identifier.
    pub async fn create_conversation(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO conversations (created_at, updated_at) VALUES (?1, ?1)",
                params![now],
            )
            .map_err(store_err)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    /// Persist a new turn and touch the conversation's update timestamp.
    /// Returns the persisted record with its store-assigned id.
    pub async fn append_turn(&self, turn: NewTurn) -> Result<Turn> {
        self.with_conn(move |conn| {
            let now = Utc::now();
            let ts = now.to_rfc3339();
            conn.execute(
                "INSERT INTO turns (conversation_id, content, summary, sender_type, created_at, updated_at)
                 VALUES (?1, ?2, NULL, ?3, ?4, ?4)",
                params![turn.conversation_id, turn.content, turn.role.as_str(), ts],
            )
            .map_err(store_err)?;
            let id = conn.last_insert_rowid();
            conn.execute(
                "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
                params![ts, turn.conversation_id],
            )
            .map_err(store_err)?;
            Ok(Turn {
                id,
                conversation_id: turn.conversation_id,
                content: Some(turn.content),
                summary: None,
                role: turn.role,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    /// All persisted turns for a conversation, ascending creation order.
    /// Empty for an unknown or empty conversation.
    pub async fn list_turns(&self, conversation_id: i64) -> Result<Vec<Turn>> {
        self.with_conn(move |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, conversation_id, content, summary, sender_type, created_at, updated_at
                     FROM turns WHERE conversation_id = ?1
                     ORDER BY created_at ASC, id ASC",
                )
                .map_err(store_err)?;
            let rows = stmt
                .query_map(params![conversation_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                    ))
                })
                .map_err(store_err)?;

            let mut turns = Vec::new();
            for row in rows {
                let (id, conversation_id, content, summary, sender, created, updated) =
                    row.map_err(store_err)?;
                turns.push(Turn {
                    id,
                    conversation_id,
                    content,
                    summary,
                    role: SenderType::parse(&sender).ok_or_else(|| {
                        Error::Store(format!("turn {id}: unknown sender_type {sender:?}"))
                    })?,
                    created_at: parse_ts(&created)?,
                    updated_at: parse_ts(&updated)?,
                });
            }
            Ok(turns)
        })
        .await
    }

    pub async fn count_turns(&self, conversation_id: i64) -> Result<u64> {
        self.with_conn(move |conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM turns WHERE conversation_id = ?1",
                    params![conversation_id],
                    |row| row.get(0),
                )
                .map_err(store_err)?;
            Ok(count as u64)
        })
        .await
    }

    pub async fn conversation_exists(&self, id: i64) -> Result<bool> {
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM conversations WHERE id = ?1 LIMIT 1",
                    params![id],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(store_err(other)),
                })?;
            Ok(found.is_some())
        })
        .await
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock();
            f(&conn)
        })
        .await
        .map_err(|e| Error::Other(format!("spawn_blocking join: {e}")))?
    }
}

fn store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("bad timestamp {s:?}: {e}")))
}
