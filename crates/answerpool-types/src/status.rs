//! Status snapshots for the administrative surface.
//!
//! These are read-only views: building one never mutates pool state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health state of one API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Healthy,
    Cooldown,
}

impl std::fmt::Display for KeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyState::Healthy => write!(f, "healthy"),
            KeyState::Cooldown => write!(f, "cooldown"),
        }
    }
}

/// Point-in-time health of one provider key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyHealthSnapshot {
    /// `provider#index`
    pub key_id: String,
    /// Key material with everything but the edges masked out.
    pub masked_key: String,
    pub state: KeyState,
    pub consecutive_failures: u32,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Remaining cooldown; zero when healthy.
    pub cooldown_remaining_ms: u64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_latency_ms: Option<u64>,
    /// `successes / (successes + failures)`, 1.0 before any call.
    pub success_rate: f64,
    /// Mean latency of successful calls.
    pub avg_latency_ms: Option<u64>,
}

/// Registry + health summary for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusInfo {
    pub name: String,
    pub base_url: String,
    pub active: bool,
    pub priority: i32,
    pub default_model: String,
    pub models: Vec<String>,
    pub total_keys: usize,
    pub healthy_keys: usize,
    pub total_successes: u64,
    pub total_failures: u64,
    /// Across all keys, 1.0 before any call.
    pub success_rate: f64,
    /// Mean latency of successful calls across all keys.
    pub avg_latency_ms: Option<u64>,
}

impl ProviderStatusInfo {
    /// True when the provider could currently receive traffic.
    pub fn is_available(&self) -> bool {
        self.active && self.healthy_keys > 0
    }
}

/// Response cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsInfo {
    pub hits: u64,
    pub misses: u64,
    /// Subset of `hits` served by the shared tier.
    pub shared_hits: u64,
    pub writes: u64,
    /// `hits / (hits + misses)`, 0.0 before any lookup.
    pub hit_rate: f64,
    /// Approximate in-process entry count.
    pub entries: u64,
    pub shared_enabled: bool,
}

/// Outcome of probing one key with a test question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyProbeOutcome {
    pub key_id: String,
    pub ok: bool,
    pub latency_ms: u64,
    /// Answer text on success, error message on failure.
    pub detail: String,
}

/// Result of probing every key of a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeResult {
    pub provider: String,
    pub model: String,
    pub question: String,
    pub keys: Vec<KeyProbeOutcome>,
}

impl ProbeResult {
    pub fn healthy_count(&self) -> usize {
        self.keys.iter().filter(|k| k.ok).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&KeyState::Cooldown).unwrap(),
            "\"cooldown\""
        );
        assert_eq!(KeyState::Healthy.to_string(), "healthy");
    }

    #[test]
    fn test_provider_availability() {
        let mut info = ProviderStatusInfo {
            name: "p".to_string(),
            base_url: "https://p.example.com".to_string(),
            active: true,
            priority: 1,
            default_model: "m".to_string(),
            models: vec![],
            total_keys: 2,
            healthy_keys: 0,
            total_successes: 0,
            total_failures: 6,
            success_rate: 0.0,
            avg_latency_ms: None,
        };
        assert!(!info.is_available());
        info.healthy_keys = 1;
        assert!(info.is_available());
        info.active = false;
        assert!(!info.is_available());
    }
}
