//! SQLite-backed session store.

use super::{summarize, Session, SessionStats, SessionStore, StoredMessage};
use crate::error::{Result, SkiffError};
use crate::transport::Role;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    provider TEXT NOT NULL,
    model TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    message_count INTEGER NOT NULL DEFAULT 0,
    total_tokens INTEGER NOT NULL DEFAULT 0,
    working_dir TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated_at ON sessions(updated_at);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    session_id TEXT NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    tokens INTEGER NOT NULL DEFAULT 0,
    model TEXT NOT NULL,
    provider TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session_id ON messages(session_id);
"#;

const SESSION_COLUMNS: &str =
    "id, title, provider, model, created_at, updated_at, message_count, total_tokens, working_dir";

/// Session store in a single SQLite file.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    current: Mutex<Option<Session>>,
}

impl SqliteSessionStore {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Opened session store at {:?}", path);
        Ok(Self::with_connection(conn))
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            current: Mutex::new(None),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SkiffError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn current_slot(&self) -> Result<MutexGuard<'_, Option<Session>>> {
        self.current
            .lock()
            .map_err(|e| SkiffError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get(0)?,
            title: row.get(1)?,
            provider: row.get(2)?,
            model: row.get(3)?,
            created_at: parse_timestamp(&row.get::<_, String>(4)?),
            updated_at: parse_timestamp(&row.get::<_, String>(5)?),
            message_count: row.get(6)?,
            total_tokens: row.get::<_, i64>(7)?.max(0) as u64,
            working_dir: row.get(8)?,
        })
    }

    fn row_to_message(row: &Row<'_>) -> rusqlite::Result<StoredMessage> {
        let role: String = row.get(2)?;
        Ok(StoredMessage {
            id: row.get(0)?,
            session_id: row.get(1)?,
            role: role.parse().unwrap_or(Role::User),
            content: row.get(3)?,
            timestamp: parse_timestamp(&row.get::<_, String>(4)?),
            tokens: row.get::<_, i64>(5)?.max(0) as u64,
            model: row.get(6)?,
            provider: row.get(7)?,
        })
    }

    fn query_session(conn: &Connection, id: &str) -> Result<Option<Session>> {
        let session = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                params![id],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn query_messages(conn: &Connection, session_id: &str) -> Result<Vec<StoredMessage>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, session_id, role, content, timestamp, tokens, model, provider
            FROM messages
            WHERE session_id = ?1
            ORDER BY seq
            "#,
        )?;
        let messages = stmt
            .query_map(params![session_id], Self::row_to_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }
}

/// Fixed-width UTC so stored timestamps sort as text.
fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self))]
    async fn new_session(
        &self,
        provider: &str,
        model: &str,
        working_dir: &Path,
    ) -> Result<Session> {
        let session = Session::new(provider, model, working_dir);
        {
            let conn = self.conn()?;
            conn.execute(
                &format!(
                    "INSERT INTO sessions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    SESSION_COLUMNS
                ),
                params![
                    session.id,
                    session.title,
                    session.provider,
                    session.model,
                    format_timestamp(&session.created_at),
                    format_timestamp(&session.updated_at),
                    session.message_count,
                    session.total_tokens as i64,
                    session.working_dir,
                ],
            )?;
        }
        *self.current_slot()? = Some(session.clone());
        debug!("Created session {}", session.id);
        Ok(session)
    }

    async fn current(&self) -> Option<Session> {
        self.current.lock().ok().and_then(|slot| slot.clone())
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        Self::query_session(&conn, id)
    }

    #[instrument(skip(self))]
    async fn load_session(&self, id: &str) -> Result<(Session, Vec<StoredMessage>)> {
        let (session, messages) = {
            let conn = self.conn()?;
            let session = Self::query_session(&conn, id)?
                .ok_or_else(|| SkiffError::Session(format!("session not found: {}", id)))?;
            let messages = Self::query_messages(&conn, id)?;
            (session, messages)
        };
        *self.current_slot()? = Some(session.clone());
        debug!("Loaded session {} with {} messages", id, messages.len());
        Ok((session, messages))
    }

    #[instrument(skip(self, content))]
    async fn add_message(&self, role: Role, content: &str, tokens: u64) -> Result<StoredMessage> {
        let mut current = self.current_slot()?;
        let session = current
            .as_mut()
            .ok_or_else(|| SkiffError::Session("no active session".to_string()))?;

        let mut updated = session.clone();
        updated.touch(role, content, tokens);
        let message = StoredMessage::new(&updated, role, content, tokens);

        {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute(
                r#"
                INSERT INTO messages (id, session_id, role, content, timestamp, tokens, model, provider)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    message.id,
                    message.session_id,
                    message.role.as_str(),
                    message.content,
                    format_timestamp(&message.timestamp),
                    message.tokens as i64,
                    message.model,
                    message.provider,
                ],
            )?;
            tx.execute(
                r#"
                UPDATE sessions
                SET title = ?2, updated_at = ?3, message_count = ?4, total_tokens = ?5
                WHERE id = ?1
                "#,
                params![
                    updated.id,
                    updated.title,
                    format_timestamp(&updated.updated_at),
                    updated.message_count,
                    updated.total_tokens as i64,
                ],
            )?;
            tx.commit()?;
        }

        *session = updated;
        Ok(message)
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let limit = if limit == 0 { -1 } else { limit as i64 };
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions ORDER BY updated_at DESC LIMIT ?1",
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map(params![limit], Self::row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let conn = self.conn()?;
        Self::query_messages(&conn, session_id)
    }

    #[instrument(skip(self))]
    async fn delete_session(&self, id: &str) -> Result<bool> {
        let deleted = {
            let mut conn = self.conn()?;
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM messages WHERE session_id = ?1", params![id])?;
            let deleted = tx.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
            tx.commit()?;
            deleted > 0
        };

        let mut current = self.current_slot()?;
        if current.as_ref().is_some_and(|s| s.id == id) {
            *current = None;
        }
        Ok(deleted)
    }

    async fn stats(&self) -> Result<SessionStats> {
        let sessions = self.list_sessions(0).await?;
        let total_messages: i64 = {
            let conn = self.conn()?;
            conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?
        };
        Ok(summarize(&sessions, total_messages.max(0) as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_add_message_requires_active_session() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let err = store.add_message(Role::User, "hi", 0).await.unwrap_err();
        assert!(err.to_string().contains("no active session"));
    }

    #[tokio::test]
    async fn test_messages_round_trip_in_order() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store
            .new_session("openai", "gpt-4o", Path::new("/work"))
            .await
            .unwrap();

        store.add_message(Role::User, "first question", 0).await.unwrap();
        store.add_message(Role::Assistant, "first answer", 42).await.unwrap();
        store.add_message(Role::User, "second", 0).await.unwrap();

        let messages = store.get_messages(&session.id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first question", "first answer", "second"]);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].tokens, 42);
        assert_eq!(messages[1].model, "gpt-4o");

        let stored = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.message_count, 3);
        assert_eq!(stored.total_tokens, 42);
        assert_eq!(stored.title, "first question");
        assert_eq!(stored.working_dir, "/work");
        assert_eq!(store.current().await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_stored_timestamps_match_returned_values() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store.new_session("openai", "gpt-4o", Path::new("/")).await.unwrap();
        assert_eq!(store.get_session(&session.id).await.unwrap().unwrap(), session);

        let message = store.add_message(Role::User, "hi", 0).await.unwrap();
        assert_eq!(store.get_messages(&session.id).await.unwrap(), vec![message]);
        assert_eq!(
            store.current().await.unwrap(),
            store.get_session(&session.id).await.unwrap().unwrap()
        );
    }

    #[tokio::test]
    async fn test_list_sessions_most_recent_first() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let older = store.new_session("a", "m1", Path::new("/")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let newer = store.new_session("b", "m2", Path::new("/")).await.unwrap();

        let all = store.list_sessions(0).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);

        // Writing to the older session moves it to the top.
        store.load_session(&older.id).await.unwrap();
        store.add_message(Role::User, "bump", 0).await.unwrap();
        let limited = store.list_sessions(1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, older.id);
    }

    #[tokio::test]
    async fn test_load_session_sets_current() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let first = store.new_session("p", "m", Path::new("/")).await.unwrap();
        store.add_message(Role::User, "hello", 0).await.unwrap();
        store.new_session("p", "m", Path::new("/")).await.unwrap();

        let (loaded, messages) = store.load_session(&first.id).await.unwrap();
        assert_eq!(loaded.id, first.id);
        assert_eq!(messages.len(), 1);
        assert_eq!(store.current().await.unwrap().id, first.id);

        assert!(store.load_session("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_delete_session_removes_messages() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store.new_session("p", "m", Path::new("/")).await.unwrap();
        store.add_message(Role::User, "bye", 0).await.unwrap();

        assert!(store.delete_session(&session.id).await.unwrap());
        assert!(!store.delete_session(&session.id).await.unwrap());
        assert!(store.get_session(&session.id).await.unwrap().is_none());
        assert!(store.get_messages(&session.id).await.unwrap().is_empty());
        assert!(store.current().await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_prefix_and_export() {
        let store = SqliteSessionStore::in_memory().unwrap();
        let session = store.new_session("p", "m", Path::new("/")).await.unwrap();
        store.add_message(Role::User, "export me", 3).await.unwrap();

        let resolved = store.resolve_id(session.short_id()).await.unwrap();
        assert_eq!(resolved.id, session.id);
        assert!(store.resolve_id("zzzzzzzz").await.is_err());

        let json = store.export_session(&session.id).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["session"]["id"], session.id.as_str());
        assert_eq!(value["messages"][0]["content"], "export me");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn test_stats() {
        let store = SqliteSessionStore::in_memory().unwrap();
        store.new_session("p", "gpt-4o", Path::new("/")).await.unwrap();
        store.add_message(Role::User, "q", 0).await.unwrap();
        store.add_message(Role::Assistant, "a", 100).await.unwrap();
        store.new_session("p", "gpt-4o", Path::new("/")).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_tokens, 100);
        assert_eq!(stats.average_tokens, 50.0);
        assert_eq!(stats.most_used_model.as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sessions.db");

        let id = {
            let store = SqliteSessionStore::new(&path).unwrap();
            let session = store.new_session("p", "m", Path::new("/")).await.unwrap();
            store.add_message(Role::User, "remember", 0).await.unwrap();
            session.id
        };

        let store = SqliteSessionStore::new(&path).unwrap();
        assert!(store.current().await.is_none());
        let (_, messages) = store.load_session(&id).await.unwrap();
        assert_eq!(messages[0].content, "remember");
    }
}
