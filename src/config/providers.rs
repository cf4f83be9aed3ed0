//! Built-in provider table and API key lookup.

use std::path::PathBuf;

/// Requests per minute for providers without a known limit.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 30;

/// Static facts about a known provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderProfile {
    pub name: &'static str,
    pub base_url: &'static str,
    pub model: &'static str,
    pub requests_per_minute: u32,
    pub extra_headers: &'static [(&'static str, &'static str)],
    /// Hosted providers refuse anonymous requests.
    pub requires_key: bool,
}

const BUILTIN: &[ProviderProfile] = &[
    ProviderProfile {
        name: "minimax",
        base_url: "https://api.minimax.io/v1",
        model: "MiniMax-M2",
        requests_per_minute: 100,
        extra_headers: &[],
        requires_key: true,
    },
    ProviderProfile {
        name: "openai",
        base_url: "https://api.openai.com/v1",
        model: "gpt-4o",
        requests_per_minute: 60,
        extra_headers: &[],
        requires_key: true,
    },
    ProviderProfile {
        name: "anthropic",
        base_url: "https://api.anthropic.com/v1",
        model: "claude-sonnet-4-20250514",
        requests_per_minute: 50,
        extra_headers: &[("anthropic-version", "2023-06-01")],
        requires_key: true,
    },
    ProviderProfile {
        name: "google",
        base_url: "https://generativelanguage.googleapis.com/v1beta",
        model: "gemini-2.0-flash",
        requests_per_minute: 60,
        extra_headers: &[],
        requires_key: true,
    },
    ProviderProfile {
        name: "groq",
        base_url: "https://api.groq.com/openai/v1",
        model: "llama-3.3-70b-versatile",
        requests_per_minute: 30,
        extra_headers: &[],
        requires_key: true,
    },
    ProviderProfile {
        name: "deepseek",
        base_url: "https://api.deepseek.com/v1",
        model: "deepseek-chat",
        requests_per_minute: 60,
        extra_headers: &[],
        requires_key: true,
    },
    ProviderProfile {
        name: "openrouter",
        base_url: "https://openrouter.ai/api/v1",
        model: "anthropic/claude-sonnet-4",
        requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
        extra_headers: &[
            ("HTTP-Referer", "https://github.com/skiff-cli/skiff"),
            ("X-Title", "Skiff"),
        ],
        requires_key: true,
    },
    ProviderProfile {
        name: "ollama",
        base_url: "http://localhost:11434/v1",
        model: "llama3.2",
        requests_per_minute: 1000,
        extra_headers: &[],
        requires_key: false,
    },
];

/// Every built-in provider, in display order.
pub fn builtin_providers() -> &'static [ProviderProfile] {
    BUILTIN
}

pub fn builtin(name: &str) -> Option<&'static ProviderProfile> {
    BUILTIN.iter().find(|p| p.name == name)
}

/// A provider with every setting decided, ready to build a transport from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub name: String,
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub requests_per_minute: u32,
    pub extra_headers: Vec<(String, String)>,
}

impl ResolvedProvider {
    /// Key with everything but the last four characters hidden.
    pub fn masked_key(&self) -> String {
        mask_key(&self.api_key)
    }
}

/// `openrouter` -> `OPENROUTER_API_KEY`.
pub fn api_key_env_var(provider: &str) -> String {
    format!("{}_API_KEY", provider.to_uppercase().replace('-', "_"))
}

/// `openrouter` -> `~/.openrouter_api_key`.
pub fn api_key_file(provider: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(format!(".{}_api_key", provider))
}

/// Explicit value first, then the environment, then the key file.
pub fn lookup_api_key(provider: &str, explicit: &str) -> Option<String> {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return Some(explicit.to_string());
    }

    if let Ok(key) = std::env::var(api_key_env_var(provider)) {
        let key = key.trim();
        if !key.is_empty() {
            return Some(key.to_string());
        }
    }

    std::fs::read_to_string(api_key_file(provider))
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}

pub fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count == 0 {
        return "(none)".to_string();
    }
    if count <= 8 {
        return "*".repeat(count);
    }
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{}{}", "*".repeat(count - 4), tail)
}
