//! Response cache combining a bounded in-process tier with an optional
//! shared durable tier.
//!
//! Lookups check the moka tier first, then the shared tier; a shared hit is
//! copied into the moka tier with whatever TTL it has left. Writes go to both.
//! Every entry carries its own deadline and is treated as absent once that
//! deadline passes, independent of moka's eviction timing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tokio::time::Instant;

use answerpool_types::answer::CachedAnswer;
use answerpool_types::config::CacheConfig;
use answerpool_types::error::CacheStoreError;
use answerpool_types::status::CacheStatsInfo;

use super::fingerprint::Fingerprint;
use super::store::BoxSharedCacheStore;

#[derive(Debug, Clone)]
struct LocalEntry {
    answer: CachedAnswer,
    expires_at: Instant,
}

/// Fingerprint -> answer cache with hit/miss accounting.
pub struct ResponseCache {
    enabled: bool,
    local: Cache<String, LocalEntry>,
    shared: Option<BoxSharedCacheStore>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    shared_hits: AtomicU64,
    writes: AtomicU64,
}

impl ResponseCache {
    /// In-process cache holding at most `max_entries`, default TTL `ttl`.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let local = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            enabled: true,
            local,
            shared: None,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            shared_hits: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.max_entries, Duration::from_secs(config.ttl_secs.max(1)));
        cache.enabled = config.enabled;
        cache
    }

    /// Attach the shared durable tier.
    pub fn with_shared(mut self, store: BoxSharedCacheStore) -> Self {
        self.shared = Some(store);
        self
    }

    /// Configured TTL for fresh answers.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CachedAnswer> {
        if !self.enabled {
            return None;
        }
        let key = fingerprint.as_str();
        let now = Instant::now();

        if let Some(entry) = self.local.get(key).await {
            if now < entry.expires_at {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.answer);
            }
            self.local.invalidate(key).await;
        }

        if let Some(shared) = &self.shared {
            match shared.get(key).await {
                Ok(Some(entry)) if !entry.remaining_ttl.is_zero() => {
                    self.local
                        .insert(
                            key.to_string(),
                            LocalEntry {
                                answer: entry.answer.clone(),
                                expires_at: now + entry.remaining_ttl,
                            },
                        )
                        .await;
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    self.shared_hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(fingerprint = %key, "Shared cache hit");
                    return Some(entry.answer);
                }
                Ok(_) => {}
                Err(CacheStoreError::Payload(reason)) => {
                    tracing::warn!(fingerprint = %key, error = %reason, "Dropping unreadable shared cache entry");
                    if let Err(e) = shared.delete(key).await {
                        tracing::warn!(fingerprint = %key, error = %e, "Shared cache delete failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(fingerprint = %key, error = %e, "Shared cache read failed, treating as miss");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store an answer in both tiers, overwriting any existing entry.
    pub async fn put(&self, fingerprint: &Fingerprint, answer: CachedAnswer, ttl: Duration) {
        if !self.enabled || ttl.is_zero() {
            return;
        }
        let key = fingerprint.as_str();

        if let Some(shared) = &self.shared {
            if let Err(e) = shared.set(key, &answer, ttl).await {
                tracing::warn!(fingerprint = %key, error = %e, "Shared cache write failed, skipping");
            }
        }

        self.local
            .insert(
                key.to_string(),
                LocalEntry {
                    answer,
                    expires_at: Instant::now() + ttl,
                },
            )
            .await;
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every entry from both tiers. Returns the number of shared-tier
    /// rows removed (0 without a shared tier or when it is unreachable).
    pub async fn clear(&self) -> u64 {
        self.local.invalidate_all();
        self.local.run_pending_tasks().await;

        let mut removed = 0;
        if let Some(shared) = &self.shared {
            match shared.clear().await {
                Ok(n) => removed = n,
                Err(e) => tracing::warn!(error = %e, "Shared cache clear failed"),
            }
        }
        tracing::info!(shared_removed = removed, "Response cache cleared");
        removed
    }

    pub fn stats(&self) -> CacheStatsInfo {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        CacheStatsInfo {
            hits,
            misses,
            shared_hits: self.shared_hits.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            entries: self.local.entry_count(),
            shared_enabled: self.shared.is_some(),
        }
    }
}
