//! Conversation persistence.
//!
//! Provides a trait-based interface so the agent can record turns without
//! knowing whether they land in SQLite or in memory.

mod memory;
mod sqlite;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;

use crate::error::{Result, SkiffError};
use crate::transport::{Message, Role};
use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Maximum title length derived from the first user message.
const TITLE_CHARS: usize = 50;

/// A stored chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub provider: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: u32,
    pub total_tokens: u64,
    /// Directory the session was started in.
    pub working_dir: String,
}

/// Current time at the microsecond precision the database keeps.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl Session {
    pub fn new(provider: &str, model: &str, working_dir: &Path) -> Self {
        let now = now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: format!("Chat {}", now.format("%Y-%m-%d %H:%M")),
            provider: provider.to_string(),
            model: model.to_string(),
            created_at: now,
            updated_at: now,
            message_count: 0,
            total_tokens: 0,
            working_dir: working_dir.display().to_string(),
        }
    }

    /// First eight characters of the id, enough to resume by.
    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }

    /// Record a new message on the session counters.
    fn touch(&mut self, role: Role, content: &str, tokens: u64) {
        if self.message_count == 0 && role == Role::User {
            self.title = title_from(content);
        }
        self.message_count += 1;
        self.total_tokens += tokens;
        self.updated_at = now();
    }
}

/// A message as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub tokens: u64,
    pub model: String,
    pub provider: String,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl StoredMessage {
    fn new(session: &Session, role: Role, content: &str, tokens: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session.id.clone(),
            role,
            content: content.to_string(),
            timestamp: now(),
            tokens,
            model: session.model.clone(),
            provider: session.provider.clone(),
        }
    }
}

impl From<&StoredMessage> for Message {
    fn from(stored: &StoredMessage) -> Self {
        Message::new(stored.role, stored.content.clone())
    }
}

/// Aggregate numbers across every session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub total_sessions: usize,
    pub total_messages: usize,
    pub total_tokens: u64,
    pub average_tokens: f64,
    pub most_used_model: Option<String>,
}

#[derive(Debug, Serialize)]
struct SessionExport<'a> {
    session: &'a Session,
    messages: &'a [StoredMessage],
}

/// Trait for session store implementations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Start a session and make it current.
    async fn new_session(&self, provider: &str, model: &str, working_dir: &Path) -> Result<Session>;

    /// The session new messages are appended to.
    async fn current(&self) -> Option<Session>;

    async fn get_session(&self, id: &str) -> Result<Option<Session>>;

    /// Make an existing session current and return its messages.
    async fn load_session(&self, id: &str) -> Result<(Session, Vec<StoredMessage>)>;

    /// Append a message to the current session.
    async fn add_message(&self, role: Role, content: &str, tokens: u64) -> Result<StoredMessage>;

    /// Sessions, most recently updated first. `limit == 0` means all.
    async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>>;

    /// Messages of a session in insertion order.
    async fn get_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>>;

    /// Delete a session and its messages. Returns whether it existed.
    async fn delete_session(&self, id: &str) -> Result<bool>;

    async fn stats(&self) -> Result<SessionStats>;

    /// Find a session by full id or unique id prefix.
    async fn resolve_id(&self, prefix: &str) -> Result<Session> {
        if let Some(session) = self.get_session(prefix).await? {
            return Ok(session);
        }
        let mut matches: Vec<Session> = self
            .list_sessions(0)
            .await?
            .into_iter()
            .filter(|s| s.id.starts_with(prefix))
            .collect();
        match matches.len() {
            0 => Err(SkiffError::Session(format!("session not found: {}", prefix))),
            1 => Ok(matches.remove(0)),
            n => Err(SkiffError::Session(format!(
                "ambiguous session id {} ({} matches)",
                prefix, n
            ))),
        }
    }

    /// Pretty JSON `{session, messages}`.
    async fn export_session(&self, id: &str) -> Result<String> {
        let session = self
            .get_session(id)
            .await?
            .ok_or_else(|| SkiffError::Session(format!("session not found: {}", id)))?;
        let messages = self.get_messages(id).await?;
        Ok(serde_json::to_string_pretty(&SessionExport {
            session: &session,
            messages: &messages,
        })?)
    }
}

fn title_from(content: &str) -> String {
    let line = content.lines().next().unwrap_or("").trim();
    if line.chars().count() <= TITLE_CHARS {
        return line.to_string();
    }
    let mut title: String = line.chars().take(TITLE_CHARS - 3).collect();
    title.push_str("...");
    title
}

/// Totals over `sessions`. The average is tokens per stored message.
fn summarize(sessions: &[Session], total_messages: usize) -> SessionStats {
    let total_tokens = sessions.iter().map(|s| s.total_tokens).sum();
    let average_tokens = if total_messages > 0 {
        total_tokens as f64 / total_messages as f64
    } else {
        0.0
    };
    SessionStats {
        total_sessions: sessions.len(),
        total_messages,
        total_tokens,
        average_tokens,
        most_used_model: most_used(sessions.iter().map(|s| s.model.as_str())),
    }
}

/// Pick the model with the most sessions; ties go to the alphabetically first.
fn most_used<'a>(models: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts = std::collections::BTreeMap::<&str, usize>::new();
    for model in models.filter(|m| !m.is_empty()) {
        *counts.entry(model).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(&str, usize)>, (model, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((model, count)),
        })
        .map(|(model, _)| model.to_string())
}
