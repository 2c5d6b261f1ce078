//! Per-key health tracking.
//!
//! Each (provider, key) pair moves through `Healthy -> Cooldown -> Healthy`.
//! A key enters cooldown once its consecutive-failure counter reaches the
//! threshold; the cooldown doubles for every further failure up to a cap.
//! Expiry is lazy: callers pass `now` and an elapsed cooldown simply reads as
//! healthy, so no timers run in the background.
//!
//! State lives in a `DashMap` with one entry per key. Every mutation takes
//! that entry's shard lock only for the duration of the update.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;

use answerpool_types::config::HealthConfig;
use answerpool_types::status::{KeyHealthSnapshot, KeyState};
use answerpool_types::upstream::UpstreamError;

/// Identity of one API key: provider name plus key position.
///
/// This is what gets logged; key material never is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub provider: String,
    pub index: usize,
}

impl KeyId {
    pub fn new(provider: impl Into<String>, index: usize) -> Self {
        Self {
            provider: provider.into(),
            index,
        }
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.provider, self.index)
    }
}

/// Cooldown policy derived from `HealthConfig`.
#[derive(Debug, Clone)]
pub struct HealthPolicy {
    pub failure_threshold: u32,
    pub base_cooldown: Duration,
    pub max_cooldown: Duration,
}

impl HealthPolicy {
    /// Cooldown for a key with `consecutive_failures` failures in a row, or
    /// `None` while still under the threshold.
    pub fn cooldown_for(&self, consecutive_failures: u32) -> Option<Duration> {
        if consecutive_failures < self.failure_threshold {
            return None;
        }
        let exponent = consecutive_failures - self.failure_threshold;
        let cooldown = 2u32
            .checked_pow(exponent)
            .map(|factor| self.base_cooldown.saturating_mul(factor))
            .unwrap_or(self.max_cooldown);
        Some(cooldown.min(self.max_cooldown))
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            base_cooldown: Duration::from_millis(config.base_cooldown_ms),
            max_cooldown: Duration::from_millis(config.max_cooldown_ms),
        }
    }
}

#[derive(Debug, Default)]
struct KeyEntry {
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
    total_successes: u64,
    total_failures: u64,
    /// Dispatch sequence number of the last use; 0 = never used.
    last_dispatch: u64,
    last_used_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_latency_ms: Option<u64>,
    /// Running sum of successful-call latencies, for the average.
    latency_total_ms: u64,
}

impl KeyEntry {
    fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Extend the cooldown; an earlier deadline never shortens a later one.
    fn extend_cooldown(&mut self, until: Instant) {
        self.cooldown_until = Some(match self.cooldown_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }
}

/// Tracks runtime health for every provider key.
#[derive(Debug)]
pub struct KeyHealthTracker {
    policy: HealthPolicy,
    keys: DashMap<KeyId, KeyEntry>,
    dispatch_seq: AtomicU64,
}

impl KeyHealthTracker {
    pub fn new(policy: HealthPolicy) -> Self {
        Self {
            policy,
            keys: DashMap::new(),
            dispatch_seq: AtomicU64::new(0),
        }
    }

    /// True when the key is healthy or its cooldown has elapsed at `now`.
    pub fn is_healthy(&self, key: &KeyId, now: Instant) -> bool {
        self.keys
            .get(key)
            .map(|entry| !entry.in_cooldown(now))
            .unwrap_or(true)
    }

    /// Stamp the key as just dispatched to.
    pub fn mark_dispatched(&self, key: &KeyId) {
        let seq = self.dispatch_seq.fetch_add(1, Ordering::AcqRel) + 1;
        let mut entry = self.keys.entry(key.clone()).or_default();
        entry.last_dispatch = entry.last_dispatch.max(seq);
        entry.last_used_at = Some(Utc::now());
    }

    /// Dispatch sequence of the key's last use (0 = never).
    pub fn last_dispatch(&self, key: &KeyId) -> u64 {
        self.keys.get(key).map(|e| e.last_dispatch).unwrap_or(0)
    }

    /// Reset the failure streak and clear any cooldown.
    pub fn record_success(&self, key: &KeyId, latency: Duration) {
        let mut entry = self.keys.entry(key.clone()).or_default();
        entry.consecutive_failures = 0;
        entry.cooldown_until = None;
        entry.total_successes += 1;
        let latency_ms = latency.as_millis() as u64;
        entry.last_latency_ms = Some(latency_ms);
        entry.latency_total_ms = entry.latency_total_ms.saturating_add(latency_ms);
    }

    /// Count a failure; arms or re-arms the cooldown once over threshold.
    ///
    /// A rate-limit error carrying a retry hint additionally extends the
    /// cooldown to the hinted deadline (capped at `max_cooldown`).
    ///
    /// Returns the key's cooldown deadline if it is now in cooldown.
    pub fn record_failure(&self, key: &KeyId, error: &UpstreamError, now: Instant) -> Option<Instant> {
        {
            let mut entry = self.keys.entry(key.clone()).or_default();
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);
            entry.total_failures += 1;
            entry.last_error = Some(error.to_string());

            if let Some(cooldown) = self.policy.cooldown_for(entry.consecutive_failures) {
                entry.extend_cooldown(now + cooldown);
                tracing::warn!(
                    key = %key,
                    consecutive_failures = entry.consecutive_failures,
                    cooldown_ms = cooldown.as_millis() as u64,
                    "Key entered cooldown"
                );
            }
        }

        if let UpstreamError::RateLimited {
            retry_after_ms: Some(ms),
        } = error
        {
            self.record_rate_limit(key, Duration::from_millis(*ms), now);
        }

        self.keys
            .get(key)
            .and_then(|entry| entry.cooldown_until)
            .filter(|until| now < *until)
    }

    /// Extend a key's cooldown to honor an upstream `Retry-After` hint,
    /// without touching its failure counters.
    pub fn record_rate_limit(&self, key: &KeyId, retry_after: Duration, now: Instant) {
        let hint = retry_after.min(self.policy.max_cooldown);
        let mut entry = self.keys.entry(key.clone()).or_default();
        entry.extend_cooldown(now + hint);
        tracing::debug!(key = %key, retry_after_ms = hint.as_millis() as u64, "Rate limit hint applied");
    }

    /// Manual recovery: clear the failure streak and cooldown, keep totals.
    pub fn reset(&self, key: &KeyId) {
        if let Some(mut entry) = self.keys.get_mut(key) {
            entry.consecutive_failures = 0;
            entry.cooldown_until = None;
        }
    }

    /// Reset every key of a provider.
    pub fn reset_provider(&self, provider: &str, key_count: usize) {
        for index in 0..key_count {
            self.reset(&KeyId::new(provider, index));
        }
        tracing::info!(provider = %provider, key_count, "Provider key health reset");
    }

    pub fn snapshot(&self, key: &KeyId, masked_key: String, now: Instant) -> KeyHealthSnapshot {
        let Some(entry) = self.keys.get(key) else {
            return KeyHealthSnapshot {
                key_id: key.to_string(),
                masked_key,
                state: KeyState::Healthy,
                consecutive_failures: 0,
                total_successes: 0,
                total_failures: 0,
                cooldown_remaining_ms: 0,
                last_used_at: None,
                last_error: None,
                last_latency_ms: None,
                success_rate: 1.0,
                avg_latency_ms: None,
            };
        };

        let remaining = entry
            .cooldown_until
            .map(|until| until.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO);
        let state = if entry.in_cooldown(now) {
            KeyState::Cooldown
        } else {
            KeyState::Healthy
        };

        KeyHealthSnapshot {
            key_id: key.to_string(),
            masked_key,
            state,
            consecutive_failures: entry.consecutive_failures,
            total_successes: entry.total_successes,
            total_failures: entry.total_failures,
            cooldown_remaining_ms: remaining.as_millis() as u64,
            last_used_at: entry.last_used_at,
            last_error: entry.last_error.clone(),
            last_latency_ms: entry.last_latency_ms,
            success_rate: success_rate(entry.total_successes, entry.total_failures),
            avg_latency_ms: entry.latency_total_ms.checked_div(entry.total_successes),
        }
    }
}

/// Share of successful calls; a key that was never called counts as 1.0.
pub fn success_rate(successes: u64, failures: u64) -> f64 {
    let total = successes + failures;
    if total == 0 {
        1.0
    } else {
        successes as f64 / total as f64
    }
}

impl Default for KeyHealthTracker {
    fn default() -> Self {
        Self::new(HealthPolicy::default())
    }
}
