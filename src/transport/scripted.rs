//! In-memory transport that replays canned replies.
//!
//! Useful for exercising the agent loop and the resilience wrapper without a
//! network. Every request is recorded so callers can assert on what was sent.

use super::{ChatTransport, Completion, Message, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

type Reply = Result<Completion, TransportError>;

/// Replays a fixed script of replies, then an optional fallback forever.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Reply with plain text for each entry, in order.
    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            texts
                .into_iter()
                .map(|t| Ok(Completion::from_text(t)))
                .collect(),
        )
    }

    /// Answer every request with the same reply.
    pub fn repeating(reply: Reply) -> Self {
        Self {
            fallback: Some(reply),
            ..Default::default()
        }
    }

    /// Reply used once the script runs out.
    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = Some(reply);
        self
    }

    /// Number of `complete` calls received so far.
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Every message list received, oldest first.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Completion, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        if let Ok(mut requests) = self.requests.lock() {
            requests.push(messages.to_vec());
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next.or_else(|| self.fallback.clone()) {
            Some(reply) => reply,
            None => Err(TransportError::StreamParse(
                "scripted transport exhausted".to_string(),
            )),
        }
    }
}
