use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};

/// Usage counters for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub total_requests: u64,
    pub total_errors: u64,
    pub total_tokens: u64,
    pub last_request_time: Option<DateTime<Utc>>,
}

/// Stats shared between the agent (writer) and the front-end (reader).
#[derive(Debug, Clone, Default)]
pub struct SharedStats(Arc<RwLock<ClientStats>>);

impl SharedStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current counters.
    pub fn snapshot(&self) -> ClientStats {
        self.0.read().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn record_success(&self, tokens: Option<u64>) {
        if let Ok(mut stats) = self.0.write() {
            stats.total_requests += 1;
            stats.total_tokens += tokens.unwrap_or(0);
            stats.last_request_time = Some(Utc::now());
        }
    }

    pub fn record_error(&self) {
        if let Ok(mut stats) = self.0.write() {
            stats.total_errors += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_snapshot() {
        let stats = SharedStats::new();
        let reader = stats.clone();

        stats.record_success(Some(120));
        stats.record_success(None);
        stats.record_error();

        let snap = reader.snapshot();
        assert_eq!(snap.total_requests, 2);
        assert_eq!(snap.total_errors, 1);
        assert_eq!(snap.total_tokens, 120);
        assert!(snap.last_request_time.is_some());
    }
}
