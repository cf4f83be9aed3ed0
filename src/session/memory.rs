//! In-memory session store.
//!
//! Used for `--no-session` runs and tests; nothing survives the process.

use super::{summarize, Session, SessionStats, SessionStore, StoredMessage};
use crate::error::{Result, SkiffError};
use crate::transport::Role;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    messages: Vec<StoredMessage>,
    current: Option<String>,
}

/// Session store backed by a map.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<Inner>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| SkiffError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| SkiffError::Session(format!("Failed to acquire lock: {}", e)))
    }
}

fn messages_of(inner: &Inner, session_id: &str) -> Vec<StoredMessage> {
    inner
        .messages
        .iter()
        .filter(|m| m.session_id == session_id)
        .cloned()
        .collect()
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn new_session(
        &self,
        provider: &str,
        model: &str,
        working_dir: &Path,
    ) -> Result<Session> {
        let session = Session::new(provider, model, working_dir);
        let mut inner = self.write()?;
        inner.sessions.insert(session.id.clone(), session.clone());
        inner.current = Some(session.id.clone());
        Ok(session)
    }

    async fn current(&self) -> Option<Session> {
        let inner = self.inner.read().ok()?;
        let id = inner.current.as_ref()?;
        inner.sessions.get(id).cloned()
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        Ok(self.read()?.sessions.get(id).cloned())
    }

    async fn load_session(&self, id: &str) -> Result<(Session, Vec<StoredMessage>)> {
        let mut inner = self.write()?;
        let session = inner
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| SkiffError::Session(format!("session not found: {}", id)))?;
        inner.current = Some(session.id.clone());
        let messages = messages_of(&inner, id);
        Ok((session, messages))
    }

    async fn add_message(&self, role: Role, content: &str, tokens: u64) -> Result<StoredMessage> {
        let mut inner = self.write()?;
        let id = inner
            .current
            .clone()
            .ok_or_else(|| SkiffError::Session("no active session".to_string()))?;
        let session = inner
            .sessions
            .get_mut(&id)
            .ok_or_else(|| SkiffError::Session("no active session".to_string()))?;

        session.touch(role, content, tokens);
        let message = StoredMessage::new(session, role, content, tokens);
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn list_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self.read()?.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        if limit > 0 {
            sessions.truncate(limit);
        }
        Ok(sessions)
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let inner = self.read()?;
        Ok(messages_of(&inner, session_id))
    }

    async fn delete_session(&self, id: &str) -> Result<bool> {
        let mut inner = self.write()?;
        let existed = inner.sessions.remove(id).is_some();
        inner.messages.retain(|m| m.session_id != id);
        if inner.current.as_deref() == Some(id) {
            inner.current = None;
        }
        Ok(existed)
    }

    async fn stats(&self) -> Result<SessionStats> {
        let inner = self.read()?;
        let sessions: Vec<Session> = inner.sessions.values().cloned().collect();
        Ok(summarize(&sessions, inner.messages.len()))
    }
}
