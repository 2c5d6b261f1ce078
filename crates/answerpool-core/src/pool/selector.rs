//! Candidate selection.
//!
//! Turns the registry and tracker state into an ordered list of
//! (provider, key) pairs for one request:
//!
//! 1. Keep active providers that can serve the requested model.
//! 2. Order by priority tier; inside a tier, the provider dispatched to least
//!    recently goes first (round-robin), ties by configuration order.
//! 3. Inside a provider, drop keys in cooldown and order the rest least
//!    recently used first, ties by key position.
//!
//! Recency comes from the tracker's dispatch sequence, so the order is fully
//! determined by the state snapshot taken at the start of selection.

use std::sync::Arc;

use tokio::time::Instant;

use super::health::{KeyHealthTracker, KeyId};
use super::registry::{Provider, ProviderRegistry};

/// One (provider, key) pair to try, with the model resolved for it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub provider: Arc<Provider>,
    pub key_index: usize,
    pub model: String,
}

impl Candidate {
    pub fn key_id(&self) -> KeyId {
        KeyId::new(self.provider.name(), self.key_index)
    }
}

/// Builds candidate lists from registry + tracker state.
pub struct Selector {
    registry: Arc<ProviderRegistry>,
    tracker: Arc<KeyHealthTracker>,
}

struct RankedProvider {
    provider: Arc<Provider>,
    model: String,
    recency: u64,
    keys: Vec<usize>,
}

impl Selector {
    pub fn new(registry: Arc<ProviderRegistry>, tracker: Arc<KeyHealthTracker>) -> Self {
        Self { registry, tracker }
    }

    /// Candidates for `model` (or any model when `None`), as of now.
    pub fn candidates(&self, model: Option<&str>) -> Vec<Candidate> {
        self.candidates_at(model, Instant::now())
    }

    /// Candidates for `model` evaluated at `now`. An empty list means no
    /// active provider has a healthy key for the model.
    pub fn candidates_at(&self, model: Option<&str>, now: Instant) -> Vec<Candidate> {
        let mut ranked: Vec<RankedProvider> = self
            .registry
            .providers()
            .iter()
            .filter(|p| p.is_active())
            .filter_map(|p| {
                let resolved = p.resolve_model(model)?;
                let mut keys: Vec<(u64, usize)> = (0..p.key_count())
                    .map(|index| {
                        let id = KeyId::new(p.name(), index);
                        (self.tracker.last_dispatch(&id), index)
                    })
                    .collect();
                let recency = keys.iter().map(|(seq, _)| *seq).max().unwrap_or(0);

                keys.retain(|(_, index)| self.tracker.is_healthy(&KeyId::new(p.name(), *index), now));
                if keys.is_empty() {
                    tracing::debug!(provider = %p.name(), "All keys in cooldown, skipping provider");
                    return None;
                }
                keys.sort_unstable();

                Some(RankedProvider {
                    provider: Arc::clone(p),
                    model: resolved,
                    recency,
                    keys: keys.into_iter().map(|(_, index)| index).collect(),
                })
            })
            .collect();

        ranked.sort_by_key(|r| (r.provider.priority(), r.recency, r.provider.order()));

        ranked
            .into_iter()
            .flat_map(|r| {
                let RankedProvider {
                    provider,
                    model,
                    keys,
                    ..
                } = r;
                keys.into_iter().map(move |key_index| Candidate {
                    provider: Arc::clone(&provider),
                    key_index,
                    model: model.clone(),
                })
            })
            .collect()
    }
}
