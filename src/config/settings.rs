//! Configuration settings for Skiff.

use super::providers::{
    api_key_env_var, api_key_file, builtin, lookup_api_key, ResolvedProvider,
    DEFAULT_REQUESTS_PER_MINUTE,
};
use crate::agent::{AgentConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_PREVIEW_CHARS};
use crate::error::{Result, SkiffError};
use crate::resilience::RetryPolicy;
use crate::tools::DEFAULT_SHELL_TIMEOUT_SECS;
use crate::transport::DEFAULT_REQUEST_TIMEOUT_SECS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub provider: ProviderSettings,
    /// Overrides for built-in providers, or entirely custom ones.
    pub providers: BTreeMap<String, ProviderOverride>,
    pub agent: AgentSettings,
    pub retry: RetrySettings,
    pub tools: ToolSettings,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for the session database.
    pub data_dir: String,
    /// Log level used when `-v` is not given (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.skiff".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// The active provider. Empty fields fall back to the provider table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub name: String,
    pub model: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: "minimax".to_string(),
            model: String::new(),
            base_url: String::new(),
            api_key: String::new(),
        }
    }
}

/// A `[providers.<name>]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOverride {
    pub base_url: String,
    pub model: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_minute: Option<u32>,
}

/// Agent loop settings.
/// Longest request timeout accepted (5 minutes).
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    /// Replaces the built-in persona; the tool section is always appended.
    pub system_prompt: String,
    pub show_thinking: bool,
    pub preview_chars: usize,
    pub request_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            system_prompt: String::new(),
            show_thinking: false,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl AgentSettings {
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            max_iterations: self.max_iterations.max(1),
            preview_chars: self.preview_chars,
            show_thinking: self.show_thinking,
        }
    }

    /// Clamped to `1..=300` seconds, the plain-chat ceiling.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(1, MAX_REQUEST_TIMEOUT_SECS))
    }
}

/// Retry/backoff settings for model requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub initial_wait_ms: u64,
    pub max_wait_ms: u64,
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_wait_ms: 1000,
            max_wait_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_wait: Duration::from_millis(self.initial_wait_ms),
            max_wait: Duration::from_millis(self.max_wait_ms),
            multiplier: self.multiplier,
        }
    }
}

/// Tool execution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub shell_timeout_secs: u64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            shell_timeout_secs: DEFAULT_SHELL_TIMEOUT_SECS,
        }
    }
}

impl ToolSettings {
    pub fn shell_timeout(&self) -> Duration {
        Duration::from_secs(self.shell_timeout_secs)
    }
}

/// Keys accepted by [`Settings::set_key`].
pub const SETTABLE_KEYS: &[&str] = &[
    "general.data_dir",
    "general.log_level",
    "provider.name",
    "provider.model",
    "provider.base_url",
    "provider.api_key",
    "agent.max_iterations",
    "agent.system_prompt",
    "agent.show_thinking",
    "agent.preview_chars",
    "agent.request_timeout_secs",
    "retry.max_retries",
    "retry.initial_wait_ms",
    "retry.max_wait_ms",
    "retry.multiplier",
    "tools.shell_timeout_secs",
];

/// Active section first, then the `[providers]` entry, then the table default.
fn pick(from_active: Option<&String>, from_custom: Option<&String>, fallback: &str) -> String {
    from_active
        .filter(|v| !v.is_empty())
        .or(from_custom.filter(|v| !v.is_empty()))
        .cloned()
        .unwrap_or_else(|| fallback.to_string())
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SkiffError::Config(format!("Invalid value for {}: {}", key, value)))
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SkiffError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("skiff")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    pub fn sessions_db_path(&self) -> PathBuf {
        self.data_dir().join("sessions.db")
    }

    /// Update one scalar setting from its dotted key.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "general.data_dir" => self.general.data_dir = value.to_string(),
            "general.log_level" => self.general.log_level = value.to_string(),
            "provider.name" => self.provider.name = value.to_string(),
            "provider.model" => self.provider.model = value.to_string(),
            "provider.base_url" => self.provider.base_url = value.to_string(),
            "provider.api_key" => self.provider.api_key = value.to_string(),
            "agent.max_iterations" => self.agent.max_iterations = parse_value(key, value)?,
            "agent.system_prompt" => self.agent.system_prompt = value.to_string(),
            "agent.show_thinking" => self.agent.show_thinking = parse_value(key, value)?,
            "agent.preview_chars" => self.agent.preview_chars = parse_value(key, value)?,
            "agent.request_timeout_secs" => {
                self.agent.request_timeout_secs = parse_value(key, value)?
            }
            "retry.max_retries" => self.retry.max_retries = parse_value(key, value)?,
            "retry.initial_wait_ms" => self.retry.initial_wait_ms = parse_value(key, value)?,
            "retry.max_wait_ms" => self.retry.max_wait_ms = parse_value(key, value)?,
            "retry.multiplier" => self.retry.multiplier = parse_value(key, value)?,
            "tools.shell_timeout_secs" => {
                self.tools.shell_timeout_secs = parse_value(key, value)?
            }
            _ => {
                return Err(SkiffError::Config(format!(
                    "Unknown key '{}'. Settable keys: {}",
                    key,
                    SETTABLE_KEYS.join(", ")
                )))
            }
        }
        Ok(())
    }

    /// Every provider name known to this configuration, built-ins first.
    pub fn provider_names(&self) -> Vec<String> {
        let mut names: Vec<String> = super::builtin_providers()
            .iter()
            .map(|p| p.name.to_string())
            .collect();
        for name in self.providers.keys() {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Decide base URL, model and key for `name` (the configured provider
    /// when `None`). `model` overrides every configured model.
    pub fn resolve_provider(
        &self,
        name: Option<&str>,
        model: Option<&str>,
    ) -> Result<ResolvedProvider> {
        let name = name.unwrap_or(&self.provider.name).trim();
        let profile = builtin(name);
        let custom = self.providers.get(name);
        if profile.is_none() && custom.is_none() {
            return Err(SkiffError::UnknownProvider(name.to_string()));
        }

        let active = (name == self.provider.name).then_some(&self.provider);
        let base_url = pick(
            active.map(|p| &p.base_url),
            custom.map(|c| &c.base_url),
            profile.map(|p| p.base_url).unwrap_or_default(),
        );
        if base_url.is_empty() {
            return Err(SkiffError::Config(format!(
                "No base_url configured for provider '{}'",
                name
            )));
        }

        let model = match model.filter(|m| !m.is_empty()) {
            Some(m) => m.to_string(),
            None => pick(
                active.map(|p| &p.model),
                custom.map(|c| &c.model),
                profile.map(|p| p.model).unwrap_or_default(),
            ),
        };
        if model.is_empty() {
            return Err(SkiffError::Config(format!("No model configured for provider '{}'", name)));
        }

        let explicit = pick(active.map(|p| &p.api_key), custom.map(|c| &c.api_key), "");
        let api_key = lookup_api_key(name, &explicit).unwrap_or_default();
        if api_key.is_empty() && profile.map(|p| p.requires_key).unwrap_or(true) {
            return Err(SkiffError::MissingApiKey {
                provider: name.to_string(),
                env_var: api_key_env_var(name),
                key_file: api_key_file(name).display().to_string(),
            });
        }

        let requests_per_minute = custom
            .and_then(|c| c.requests_per_minute)
            .or(profile.map(|p| p.requests_per_minute))
            .unwrap_or(DEFAULT_REQUESTS_PER_MINUTE);

        let extra_headers = profile
            .map(|p| {
                p.extra_headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ResolvedProvider {
            name: name.to_string(),
            base_url,
            model,
            api_key,
            requests_per_minute,
            extra_headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.provider.name, "minimax");
        assert_eq!(settings.agent.max_iterations, 10);
        assert_eq!(settings.agent.preview_chars, 800);
        assert_eq!(settings.retry.policy(), RetryPolicy::default());
        assert_eq!(settings.tools.shell_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_request_timeout_is_clamped() {
        let mut agent = AgentSettings::default();
        assert_eq!(agent.request_timeout(), Duration::from_secs(120));
        agent.request_timeout_secs = 0;
        assert_eq!(agent.request_timeout(), Duration::from_secs(1));
        agent.request_timeout_secs = 3600;
        assert_eq!(agent.request_timeout(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [agent]
            max_iterations = 4

            [providers.local]
            base_url = "http://127.0.0.1:8080/v1"
            model = "qwen"
            "#,
        )
        .unwrap();
        assert_eq!(settings.agent.max_iterations, 4);
        assert_eq!(settings.agent.request_timeout_secs, 120);
        assert_eq!(settings.retry.max_retries, 3);
        assert_eq!(settings.providers["local"].model, "qwen");
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut settings = Settings::default();
        settings.set_key("provider.name", "openai").unwrap();
        settings.set_key("retry.multiplier", "1.5").unwrap();
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_set_key_rejects_bad_input() {
        let mut settings = Settings::default();
        settings.set_key("agent.show_thinking", "true").unwrap();
        assert!(settings.agent.show_thinking);
        assert!(settings.set_key("agent.max_iterations", "many").is_err());
        assert!(settings.set_key("agent.nope", "1").is_err());
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let err = Settings::default().resolve_provider(Some("nowhere"), None).unwrap_err();
        assert!(matches!(err, SkiffError::UnknownProvider(name) if name == "nowhere"));
    }

    #[test]
    fn test_resolve_uses_table_and_explicit_key() {
        let mut settings = Settings::default();
        settings.provider.name = "anthropic".to_string();
        settings.provider.api_key = "sk-test".to_string();

        let resolved = settings.resolve_provider(None, None).unwrap();
        assert_eq!(resolved.base_url, "https://api.anthropic.com/v1");
        assert_eq!(resolved.model, "claude-sonnet-4-20250514");
        assert_eq!(resolved.api_key, "sk-test");
        assert_eq!(resolved.requests_per_minute, 50);
        assert_eq!(
            resolved.extra_headers,
            vec![("anthropic-version".to_string(), "2023-06-01".to_string())]
        );

        let overridden = settings.resolve_provider(None, Some("claude-opus")).unwrap();
        assert_eq!(overridden.model, "claude-opus");
    }

    #[test]
    fn test_resolve_custom_provider_missing_key() {
        let mut settings = Settings::default();
        settings.providers.insert(
            "skiff-keyless-test".to_string(),
            ProviderOverride {
                base_url: "http://127.0.0.1:9/v1".to_string(),
                model: "tiny".to_string(),
                ..Default::default()
            },
        );
        let err = settings
            .resolve_provider(Some("skiff-keyless-test"), None)
            .unwrap_err();
        match err {
            SkiffError::MissingApiKey { env_var, .. } => {
                assert_eq!(env_var, "SKIFF_KEYLESS_TEST_API_KEY")
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_resolve_ollama_without_key() {
        let resolved = Settings::default().resolve_provider(Some("ollama"), None).unwrap();
        assert_eq!(resolved.base_url, "http://localhost:11434/v1");
        assert_eq!(resolved.requests_per_minute, 1000);
    }
}
