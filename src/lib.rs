//! Skiff - an agentic chat client for the terminal
//!
//! Skiff talks to OpenAI-compatible chat providers and lets the model act on
//! the current directory through a fixed catalog of tools: reading, writing
//! and searching files, running shell commands, git and a little web access.
//!
//! # Architecture
//!
//! - `transport` - Chat completion transports (HTTP with streaming, scripted for tests)
//! - `resilience` - Retry with exponential backoff and token-bucket rate limiting
//! - `tools` - Tool catalog, tool bodies and the executor
//! - `agent` - The agentic loop, the tool-call codec, events and usage statistics
//! - `session` - Persistent conversation history (SQLite or in-memory)
//! - `config` - Settings, provider profiles and the system prompt
//! - `runtime` - Wiring of settings, storage, transports and agents
//! - `cli` - Command-line front-end
//!
//! # Example
//!
//! ```rust,no_run
//! use skiff::config::Settings;
//! use skiff::runtime::Runtime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = Runtime::new(Settings::load()?)?;
//!     let provider = runtime.resolve(Some("ollama"), None)?;
//!     let agent = runtime.agent(&provider, &std::env::current_dir()?)?;
//!
//!     let handle = agent.spawn_turn("What files are in this directory?");
//!     let agent = handle.finish().await?;
//!     println!("{}", agent.history().last().map(|m| m.content.as_str()).unwrap_or(""));
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod config;
pub mod error;
pub mod resilience;
pub mod runtime;
pub mod session;
pub mod tools;
pub mod transport;

pub use error::{Result, SkiffError};
