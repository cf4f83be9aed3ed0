//! Configuration module for Skiff.
//!
//! Handles loading and saving settings, the built-in provider table and the
//! system prompt.

mod prompts;
mod providers;
mod settings;

pub use prompts::system_prompt;
pub use providers::{
    api_key_env_var, api_key_file, builtin, builtin_providers, lookup_api_key, mask_key,
    ProviderProfile, ResolvedProvider, DEFAULT_REQUESTS_PER_MINUTE,
};
pub use settings::{
    AgentSettings, GeneralSettings, ProviderOverride, ProviderSettings, RetrySettings, Settings,
    ToolSettings, SETTABLE_KEYS,
};
