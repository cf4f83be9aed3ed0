//! CLI command implementations.

mod ask;
mod chat;
mod config;
mod doctor;
mod providers;
mod sessions;
mod tools;

pub use ask::run_ask;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use providers::run_providers;
pub use sessions::run_sessions;
pub use tools::run_tools;
