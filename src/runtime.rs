//! Wiring for the front-ends.
//!
//! Owns the settings and the session store and builds resilient transports
//! and agents from them.

use crate::agent::{Agent, SharedStats};
use crate::config::{system_prompt, ResolvedProvider, Settings};
use crate::error::Result;
use crate::resilience::{ResilientTransport, TokenBucket};
use crate::session::{SessionStore, SqliteSessionStore};
use crate::tools::ExecutionContext;
use crate::transport::{HttpTransport, TransportConfig};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument};

/// Shared state for one CLI invocation.
pub struct Runtime {
    settings: Settings,
    sessions: Arc<dyn SessionStore>,
    stats: SharedStats,
}

impl Runtime {
    /// Open the session database under the configured data directory.
    pub fn new(settings: Settings) -> Result<Self> {
        let sessions = Arc::new(SqliteSessionStore::new(&settings.sessions_db_path())?);
        Ok(Self::with_components(settings, sessions))
    }

    /// Create a runtime with a custom session store.
    pub fn with_components(settings: Settings, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            settings,
            sessions,
            stats: SharedStats::new(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn sessions(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.sessions)
    }

    /// Counters shared by every agent this runtime builds.
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    pub fn resolve(&self, provider: Option<&str>, model: Option<&str>) -> Result<ResolvedProvider> {
        self.settings.resolve_provider(provider, model)
    }

    /// HTTP transport behind retry and the provider's rate limit.
    #[instrument(skip_all, fields(provider = %provider.name, model = %provider.model))]
    pub fn transport(
        &self,
        provider: &ResolvedProvider,
    ) -> Result<ResilientTransport<HttpTransport>> {
        let config =
            TransportConfig::from_provider(provider, self.settings.agent.request_timeout());
        let http = HttpTransport::new(config)?;
        let bucket = TokenBucket::per_minute(provider.requests_per_minute);
        info!("Using {} at {}", provider.model, http.endpoint());
        Ok(ResilientTransport::new(http, self.settings.retry.policy(), bucket))
    }

    /// An agent rooted at `cwd` that records turns to the session store.
    pub fn agent(&self, provider: &ResolvedProvider, cwd: &Path) -> Result<Agent> {
        let context =
            ExecutionContext::new(cwd).with_shell_timeout(self.settings.tools.shell_timeout());
        let agent = Agent::new(self.transport(provider)?, system_prompt(&self.settings), context)
            .with_config(self.settings.agent.agent_config())
            .with_session(self.sessions())
            .with_stats(self.stats());
        Ok(agent)
    }
}
