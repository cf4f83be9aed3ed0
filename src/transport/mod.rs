//! Streaming chat-completion transport.
//!
//! A transport issues one request for the whole conversation and hands back the
//! model's full reply. Streaming happens on the wire only: the server sends
//! `data:` lines which are accumulated into a single [`Completion`].

mod client;
pub mod scripted;
mod sse;

pub use client::{HttpTransport, TransportConfig, DEFAULT_REQUEST_TIMEOUT_SECS};
pub use scripted::ScriptedTransport;
pub use sse::{ChunkEnvelope, SseLine, SseLineParser};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Role of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// A single chat message as sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// The accumulated result of one streamed model response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Concatenated `delta.content` of every chunk.
    pub text: String,
    /// `usage.total_tokens`, when the provider reports it.
    pub total_tokens: Option<u64>,
    /// Last non-empty `finish_reason` seen on the stream.
    pub finish_reason: Option<String>,
}

impl Completion {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Failure of a single transport call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// The request hit its deadline.
        timeout: bool,
        /// The connection could not be established.
        connect: bool,
    },

    #[error("API error ({status}): {message}")]
    Http { status: u16, message: String },

    #[error("Failed to read response stream: {0}")]
    StreamParse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl TransportError {
    /// Build a network error from a reqwest failure, keeping the error class.
    ///
    /// Only a refused connection counts as `connect`; DNS and TLS failures
    /// while connecting do not.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        TransportError::Network {
            timeout: err.is_timeout(),
            connect: err.is_connect() && connection_refused(err),
            message: err.to_string(),
        }
    }

    /// HTTP status code, if the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

fn connection_refused(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = e.source();
    }
    false
}

/// Anything that can turn a conversation into the model's next reply.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send the full history and return the complete streamed reply.
    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Completion, TransportError>;
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for std::sync::Arc<T> {
    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Completion, TransportError> {
        (**self).complete(messages, cancel).await
    }
}

#[async_trait]
impl<T: ChatTransport + ?Sized> ChatTransport for Box<T> {
    async fn complete(
        &self,
        messages: &[Message],
        cancel: &CancellationToken,
    ) -> Result<Completion, TransportError> {
        (**self).complete(messages, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&Message::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
    }

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::System, Role::User, Role::Assistant] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("tool".parse::<Role>().is_err());
    }

    #[test]
    fn test_http_error_display() {
        let err = TransportError::Http {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert_eq!(err.to_string(), "API error (503): overloaded");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_connection_refused_found_in_source_chain() {
        #[derive(Debug, Error)]
        #[error("error sending request")]
        struct Wrapper(#[source] std::io::Error);

        let refused = Wrapper(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert!(connection_refused(&refused));

        let dns = Wrapper(std::io::Error::new(
            std::io::ErrorKind::Other,
            "failed to lookup address information",
        ));
        assert!(!connection_refused(&dns));
    }
}
