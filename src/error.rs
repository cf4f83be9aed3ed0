//! Error types for Skiff.

use crate::transport::TransportError;
use thiserror::Error;

/// Library-level error type for Skiff operations.
#[derive(Error, Debug)]
pub enum SkiffError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error(
        "No API key found for provider '{provider}'. Set {env_var} or write the key to {key_file}"
    )]
    MissingApiKey {
        provider: String,
        env_var: String,
        key_file: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Agent error: {0}")]
    Agent(String),
}

/// Result type alias for Skiff operations.
pub type Result<T> = std::result::Result<T, SkiffError>;
