//! The agent loop.
//!
//! An [`Agent`] sends the conversation to the model, runs any tool calls found
//! in the reply, feeds the results back and repeats until the model answers
//! without calling a tool or the iteration cap is hit. Progress is reported as
//! [`AgentEvent`]s.

mod events;
pub mod protocol;
mod runner;
mod stats;

pub use events::{AgentEvent, EventSink, TurnHandle, TurnOutcome, EVENT_CHANNEL_CAPACITY};
pub use runner::{Agent, AgentConfig, LoopState, DEFAULT_MAX_ITERATIONS, DEFAULT_PREVIEW_CHARS};
pub use stats::{ClientStats, SharedStats};
