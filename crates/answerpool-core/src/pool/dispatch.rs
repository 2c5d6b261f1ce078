//! Dispatch orchestrator.
//!
//! `AnswerDispatcher::answer` is the single entry point for answering a
//! question: cache lookup, candidate selection, one bounded upstream attempt
//! per candidate with failover, health bookkeeping and cache population.
//! The administrative operations (status, activation, priority, reset,
//! probe, cache stats) live here too so callers hold one handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use answerpool_types::answer::{Answer, AnswerRequest, CachedAnswer};
use answerpool_types::config::{DispatchConfig, PoolConfig};
use answerpool_types::error::{AttemptFailure, PoolError, RegistryError};
use answerpool_types::status::{
    CacheStatsInfo, KeyHealthSnapshot, KeyProbeOutcome, KeyState, ProbeResult,
    ProviderStatusInfo,
};
use answerpool_types::upstream::{ChatMessage, ChatRequest, UpstreamError};

use super::health::{HealthPolicy, KeyHealthTracker, KeyId, success_rate};
use super::registry::ProviderRegistry;
use super::selector::{Candidate, Selector};
use crate::answer::prompt::{build_messages, clean_answer};
use crate::cache::fingerprint::{ANY_MODEL, Fingerprinter};
use crate::cache::response::ResponseCache;
use crate::cache::store::BoxSharedCacheStore;
use crate::service::hash::ContentHasher;
use crate::upstream::box_client::BoxUpstreamClient;
use crate::upstream::client::UpstreamTarget;

/// Questions used when probing keys; rotated per probe.
const PROBE_QUESTIONS: &[&str] = &[
    "1+1等于几？",
    "中国的首都是哪里？",
    "一年有几个月？",
    "水的化学式是什么？",
];

/// Upstream request settings resolved from `DispatchConfig`.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub request_timeout: Duration,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    pub system_prompt: String,
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            max_tokens: config.max_tokens,
            temperature: Some(config.temperature),
            system_prompt: config.system_prompt.clone(),
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// Answers questions through the provider pool.
pub struct AnswerDispatcher {
    registry: Arc<ProviderRegistry>,
    tracker: Arc<KeyHealthTracker>,
    selector: Selector,
    cache: ResponseCache,
    fingerprinter: Fingerprinter,
    client: BoxUpstreamClient,
    settings: DispatchSettings,
    probe_counter: AtomicUsize,
}

impl AnswerDispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        tracker: Arc<KeyHealthTracker>,
        cache: ResponseCache,
        hasher: Arc<dyn ContentHasher>,
        client: BoxUpstreamClient,
        settings: DispatchSettings,
    ) -> Self {
        let selector = Selector::new(Arc::clone(&registry), Arc::clone(&tracker));
        Self {
            registry,
            tracker,
            selector,
            cache,
            fingerprinter: Fingerprinter::new(hasher),
            client,
            settings,
            probe_counter: AtomicUsize::new(0),
        }
    }

    /// Wire a dispatcher from validated configuration.
    pub fn from_config(
        config: &PoolConfig,
        client: BoxUpstreamClient,
        hasher: Arc<dyn ContentHasher>,
        shared: Option<BoxSharedCacheStore>,
    ) -> Result<Self, RegistryError> {
        let registry = Arc::new(ProviderRegistry::from_configs(&config.providers)?);
        let tracker = Arc::new(KeyHealthTracker::new(HealthPolicy::from(&config.health)));
        let mut cache = ResponseCache::from_config(&config.cache);
        if let Some(store) = shared {
            cache = cache.with_shared(store);
        }
        Ok(Self::new(
            registry,
            tracker,
            cache,
            hasher,
            client,
            DispatchSettings::from(&config.dispatch),
        ))
    }

    /// Answer one question.
    ///
    /// Returns from cache with zero upstream calls on a hit. Otherwise tries
    /// each candidate once, in selector order, until one produces a usable
    /// answer. Cancelling `cancel` abandons the in-flight call without
    /// recording an outcome for it and skips the remaining candidates.
    pub async fn answer(
        &self,
        request: &AnswerRequest,
        cancel: &CancellationToken,
    ) -> Result<Answer, PoolError> {
        let started = Instant::now();
        if cancel.is_cancelled() {
            return Err(PoolError::Cancelled);
        }

        let fingerprint = self.fingerprinter.fingerprint(request);
        if let Some(hit) = self.cache.get(&fingerprint).await {
            tracing::debug!(provider = %hit.provider, fingerprint = %fingerprint, "Cache hit");
            return Ok(Answer {
                answer: hit.answer,
                provider: hit.provider,
                model: hit.model,
                from_cache: true,
                latency_ms: started.elapsed().as_millis() as u64,
                attempts: 0,
            });
        }

        let model = request
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let candidates = self.selector.candidates(model);
        if candidates.is_empty() {
            tracing::warn!(model = model.unwrap_or(ANY_MODEL), "No available provider");
            return Err(PoolError::NoAvailableProvider {
                model: model.unwrap_or(ANY_MODEL).to_string(),
            });
        }

        let messages = build_messages(&self.settings.system_prompt, request);
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for candidate in &candidates {
            if cancel.is_cancelled() {
                return Err(PoolError::Cancelled);
            }

            let key_id = candidate.key_id();
            if !self.tracker.is_healthy(&key_id, Instant::now()) {
                // Cooled down by a concurrent request after selection.
                tracing::debug!(key = %key_id, "Key entered cooldown since selection, skipping");
                continue;
            }

            let attempt_started = Instant::now();
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(key = %key_id, "Request cancelled during upstream call");
                    return Err(PoolError::Cancelled);
                }
                outcome = self.attempt(candidate, &key_id, &messages) => outcome,
            };

            let outcome = outcome.and_then(|content| {
                let cleaned = clean_answer(&content, request.question_type.as_deref());
                if cleaned.is_empty() {
                    Err(UpstreamError::Malformed {
                        message: "empty answer after cleanup".to_string(),
                    })
                } else {
                    Ok(cleaned)
                }
            });

            match outcome {
                Ok(answer) => {
                    let latency = attempt_started.elapsed();
                    self.tracker.record_success(&key_id, latency);

                    let provider = candidate.provider.name().to_string();
                    self.cache
                        .put(
                            &fingerprint,
                            CachedAnswer {
                                answer: answer.clone(),
                                provider: provider.clone(),
                                model: candidate.model.clone(),
                            },
                            self.cache.ttl(),
                        )
                        .await;

                    let attempts = failures.len() as u32 + 1;
                    tracing::info!(
                        provider = %provider,
                        key = %key_id,
                        model = %candidate.model,
                        latency_ms = latency.as_millis() as u64,
                        attempts,
                        "Answer produced"
                    );
                    return Ok(Answer {
                        answer,
                        provider,
                        model: candidate.model.clone(),
                        from_cache: false,
                        latency_ms: started.elapsed().as_millis() as u64,
                        attempts,
                    });
                }
                Err(err) => {
                    self.tracker.record_failure(&key_id, &err, Instant::now());
                    tracing::warn!(
                        provider = %candidate.provider.name(),
                        key = %key_id,
                        kind = %err.kind(),
                        error = %err,
                        "Upstream attempt failed, trying next candidate"
                    );
                    failures.push(AttemptFailure {
                        provider: candidate.provider.name().to_string(),
                        key: key_id.to_string(),
                        error: err,
                    });
                }
            }
        }

        if failures.is_empty() {
            return Err(PoolError::NoAvailableProvider {
                model: model.unwrap_or(ANY_MODEL).to_string(),
            });
        }

        tracing::error!(attempts = failures.len(), "All candidates failed");
        Err(PoolError::AllProvidersExhausted { attempts: failures })
    }

    /// One bounded upstream call; returns the raw completion text.
    async fn attempt(
        &self,
        candidate: &Candidate,
        key_id: &KeyId,
        messages: &[ChatMessage],
    ) -> Result<String, UpstreamError> {
        let Some(api_key) = candidate.provider.key(candidate.key_index) else {
            return Err(UpstreamError::Connection {
                message: format!("key {key_id} is not configured"),
            });
        };
        let request = ChatRequest {
            model: candidate.model.clone(),
            messages: messages.to_vec(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let target = UpstreamTarget {
            provider: candidate.provider.name(),
            base_url: candidate.provider.base_url(),
            api_key,
        };

        self.tracker.mark_dispatched(key_id);
        tracing::debug!(key = %key_id, model = %request.model, "Dispatching upstream request");

        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.client.complete(target, &request)).await {
            Ok(result) => result.map(|completion| completion.content),
            Err(_) => Err(UpstreamError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Registry and key-health summary for every provider, by priority.
    pub fn provider_statuses(&self) -> Vec<ProviderStatusInfo> {
        let now = Instant::now();
        self.registry
            .list()
            .into_iter()
            .map(|snapshot| {
                let keys: Vec<KeyHealthSnapshot> = (0..snapshot.key_count)
                    .map(|index| {
                        self.tracker
                            .snapshot(&KeyId::new(&snapshot.name, index), String::new(), now)
                    })
                    .collect();
                let total_successes: u64 = keys.iter().map(|k| k.total_successes).sum();
                let total_failures: u64 = keys.iter().map(|k| k.total_failures).sum();
                let latency_sum: u64 = keys
                    .iter()
                    .filter_map(|k| k.avg_latency_ms.map(|avg| avg * k.total_successes))
                    .sum();
                ProviderStatusInfo {
                    healthy_keys: keys.iter().filter(|k| k.state == KeyState::Healthy).count(),
                    total_successes,
                    total_failures,
                    success_rate: success_rate(total_successes, total_failures),
                    avg_latency_ms: latency_sum.checked_div(total_successes),
                    total_keys: snapshot.key_count,
                    name: snapshot.name,
                    base_url: snapshot.base_url,
                    active: snapshot.active,
                    priority: snapshot.priority,
                    default_model: snapshot.default_model,
                    models: snapshot.models,
                }
            })
            .collect()
    }

    /// Per-key health snapshot for one provider.
    pub fn key_health(&self, name: &str) -> Result<Vec<KeyHealthSnapshot>, PoolError> {
        let provider = self.registry.get(name)?;
        let now = Instant::now();
        Ok((0..provider.key_count())
            .map(|index| {
                self.tracker.snapshot(
                    &KeyId::new(provider.name(), index),
                    provider.masked_key(index),
                    now,
                )
            })
            .collect())
    }

    pub fn set_provider_active(&self, name: &str, active: bool) -> Result<(), PoolError> {
        Ok(self.registry.set_active(name, active)?)
    }

    pub fn set_provider_priority(&self, name: &str, priority: i32) -> Result<(), PoolError> {
        Ok(self.registry.set_priority(name, priority)?)
    }

    /// Clear failure streaks and cooldowns for every key of a provider.
    pub fn reset_provider_health(&self, name: &str) -> Result<(), PoolError> {
        let provider = self.registry.get(name)?;
        self.tracker.reset_provider(provider.name(), provider.key_count());
        Ok(())
    }

    /// Send a short test question through every key of a provider.
    ///
    /// Ignores the active flag and the cache; outcomes are recorded in the
    /// tracker like regular traffic.
    pub async fn probe_provider(&self, name: &str) -> Result<ProbeResult, PoolError> {
        let provider = self.registry.get(name)?;
        let turn = self.probe_counter.fetch_add(1, Ordering::Relaxed);
        let question = PROBE_QUESTIONS[turn % PROBE_QUESTIONS.len()];
        let request = AnswerRequest::new(question);
        let messages = build_messages(&self.settings.system_prompt, &request);

        let probes = (0..provider.key_count()).map(|key_index| {
            let candidate = Candidate {
                provider: Arc::clone(&provider),
                key_index,
                model: provider.default_model().to_string(),
            };
            let messages = &messages;
            async move {
                let key_id = candidate.key_id();
                let started = Instant::now();
                let outcome = self.attempt(&candidate, &key_id, messages).await;
                let latency = started.elapsed();
                match outcome {
                    Ok(content) => {
                        self.tracker.record_success(&key_id, latency);
                        KeyProbeOutcome {
                            key_id: key_id.to_string(),
                            ok: true,
                            latency_ms: latency.as_millis() as u64,
                            detail: clean_answer(&content, None),
                        }
                    }
                    Err(err) => {
                        self.tracker.record_failure(&key_id, &err, Instant::now());
                        KeyProbeOutcome {
                            key_id: key_id.to_string(),
                            ok: false,
                            latency_ms: latency.as_millis() as u64,
                            detail: err.to_string(),
                        }
                    }
                }
            }
        });
        let keys = join_all(probes).await;

        tracing::info!(
            provider = %provider.name(),
            healthy = keys.iter().filter(|k| k.ok).count(),
            total = keys.len(),
            "Provider probe finished"
        );
        Ok(ProbeResult {
            provider: provider.name().to_string(),
            model: provider.default_model().to_string(),
            question: question.to_string(),
            keys,
        })
    }

    /// Probe every active provider, one after another in list order.
    pub async fn check_active_providers(&self) -> Vec<ProbeResult> {
        let mut results = Vec::new();
        for snapshot in self.registry.list().into_iter().filter(|p| p.active) {
            match self.probe_provider(&snapshot.name).await {
                Ok(result) => results.push(result),
                Err(e) => tracing::warn!(provider = %snapshot.name, error = %e, "Health check skipped"),
            }
        }
        results
    }

    pub fn cache_stats(&self) -> CacheStatsInfo {
        self.cache.stats()
    }

    /// Empty both cache tiers.
    pub async fn clear_cache(&self) -> u64 {
        self.cache.clear().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use answerpool_types::config::ProviderConfig;
    use answerpool_types::upstream::ChatCompletion;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::cache::fingerprint::tests::PlainHasher;
    use crate::pool::registry::tests::provider_config;
    use crate::upstream::client::UpstreamClient;

    /// Scripted upstream: responses are keyed by API key material and
    /// consumed in order; the last one repeats.
    #[derive(Default)]
    pub(crate) struct ScriptedClient {
        script: Mutex<HashMap<String, Vec<Result<String, UpstreamError>>>>,
        calls: Mutex<Vec<String>>,
        delay: Option<Duration>,
    }

    impl ScriptedClient {
        pub(crate) fn on(self, key: &str, responses: Vec<Result<String, UpstreamError>>) -> Self {
            self.script.lock().unwrap().insert(key.to_string(), responses);
            self
        }
    }

    impl UpstreamClient for Arc<ScriptedClient> {
        async fn complete(
            &self,
            target: UpstreamTarget<'_>,
            request: &ChatRequest,
        ) -> Result<ChatCompletion, UpstreamError> {
            let key = target.api_key.expose_secret().to_string();
            self.calls.lock().unwrap().push(key.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = {
                let mut script = self.script.lock().unwrap();
                let responses = script.entry(key).or_default();
                if responses.len() > 1 {
                    responses.remove(0)
                } else {
                    responses.first().cloned().unwrap_or_else(|| Ok("ok".to_string()))
                }
            };
            next.map(|content| ChatCompletion {
                content,
                model: request.model.clone(),
                usage: None,
            })
        }
    }

    fn server_error() -> UpstreamError {
        UpstreamError::Server {
            status: 503,
            message: "busy".to_string(),
        }
    }

    pub(crate) fn dispatcher(
        providers: Vec<ProviderConfig>,
        client: Arc<ScriptedClient>,
    ) -> AnswerDispatcher {
        let mut config = PoolConfig {
            providers,
            ..Default::default()
        };
        config.health.base_cooldown_ms = 30_000;
        config.dispatch.request_timeout_ms = 1_000;
        AnswerDispatcher::from_config(
            &config,
            BoxUpstreamClient::new(client),
            Arc::new(PlainHasher),
            None,
        )
        .unwrap()
    }

    pub(crate) fn calls(client: &ScriptedClient) -> Vec<String> {
        client.calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_failover_then_cache_hit() {
        let client = Arc::new(
            ScriptedClient::default()
                .on("k1", vec![Err(server_error())])
                .on("k2", vec![Ok("Paris".to_string())]),
        );
        let d = dispatcher(
            vec![
                provider_config("p1", 1, &["k1", "k2"]),
                provider_config("p2", 2, &["k3"]),
            ],
            Arc::clone(&client),
        );
        let cancel = CancellationToken::new();
        let req = AnswerRequest::new("Capital of France?");

        let first = d.answer(&req, &cancel).await.unwrap();
        assert_eq!(first.answer, "Paris");
        assert_eq!(first.provider, "p1");
        assert_eq!(first.attempts, 2);
        assert!(!first.from_cache);
        assert_eq!(calls(&client), vec!["k1", "k2"]);

        let k1 = &d.key_health("p1").unwrap()[0];
        assert_eq!(k1.consecutive_failures, 1);
        assert_eq!(k1.state, KeyState::Healthy);

        let second = d.answer(&AnswerRequest::new("  capital of  FRANCE? "), &cancel).await.unwrap();
        assert!(second.from_cache);
        assert_eq!(second.provider, "p1");
        assert_eq!(second.attempts, 0);
        assert_eq!(calls(&client).len(), 2);
    }

    #[tokio::test]
    async fn test_no_available_provider_makes_no_calls() {
        let client = Arc::new(ScriptedClient::default());
        let mut off = provider_config("p1", 1, &["k1"]);
        off.active = false;
        let d = dispatcher(vec![off, provider_config("p2", 1, &["k2"])], Arc::clone(&client));

        let err = d
            .answer(&AnswerRequest::new("q").with_model("unsupported"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::NoAvailableProvider {
                model: "unsupported".to_string()
            }
        );

        d.set_provider_active("p2", false).unwrap();
        let err = d
            .answer(&AnswerRequest::new("q"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::NoAvailableProvider { .. }));
        assert!(calls(&client).is_empty());
    }

    #[tokio::test]
    async fn test_all_fail_exhausts_each_candidate_once() {
        let client = Arc::new(
            ScriptedClient::default()
                .on("k1", vec![Err(server_error())])
                .on("k2", vec![Err(UpstreamError::Unauthorized { status: 401 })])
                .on("k3", vec![Err(UpstreamError::RateLimited { retry_after_ms: None })]),
        );
        let d = dispatcher(
            vec![
                provider_config("p1", 1, &["k1", "k2"]),
                provider_config("p2", 2, &["k3"]),
            ],
            Arc::clone(&client),
        );

        let err = d
            .answer(&AnswerRequest::new("q"), &CancellationToken::new())
            .await
            .unwrap_err();
        let PoolError::AllProvidersExhausted { attempts } = &err else {
            panic!("expected exhaustion, got {err:?}");
        };
        assert_eq!(attempts.len(), 3);
        assert_eq!(attempts[2].key, "p2#0");
        assert_eq!(calls(&client), vec!["k1", "k2", "k3"]);
        assert!(err.to_string().contains("all 3 candidates failed"));

        // Nothing cached on failure.
        assert_eq!(d.cache_stats().writes, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_recorded() {
        let client = Arc::new(
            ScriptedClient::default()
                .on("k1", vec![Err(server_error())])
                .on("k2", vec![Err(server_error())]),
        );
        let mut config = PoolConfig {
            providers: vec![provider_config("p1", 1, &["k1", "k2"])],
            ..Default::default()
        };
        config.health.failure_threshold = 1_000;
        let d = Arc::new(
            AnswerDispatcher::from_config(
                &config,
                BoxUpstreamClient::new(Arc::clone(&client)),
                Arc::new(PlainHasher),
                None,
            )
            .unwrap(),
        );

        let tasks: Vec<_> = (0..200)
            .map(|i| {
                let d = Arc::clone(&d);
                tokio::spawn(async move {
                    let request = AnswerRequest::new(format!("question {i}"));
                    d.answer(&request, &CancellationToken::new()).await
                })
            })
            .collect();

        let mut attempts = 0;
        for task in tasks {
            match task.await.unwrap() {
                Err(PoolError::AllProvidersExhausted { attempts: failed }) => {
                    attempts += failed.len()
                }
                other => panic!("expected exhaustion, got {other:?}"),
            }
        }

        let health = d.key_health("p1").unwrap();
        let recorded: u64 = health.iter().map(|k| k.total_failures).sum();
        assert_eq!(attempts, 400);
        assert_eq!(calls(&client).len(), 400);
        assert_eq!(recorded, 400);
        for key in &health {
            assert_eq!(key.consecutive_failures, 200);
            assert_eq!(key.state, KeyState::Healthy);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_cooldown_excludes_then_restores() {
        let client = Arc::new(ScriptedClient::default().on(
            "k1",
            vec![
                Err(server_error()),
                Err(server_error()),
                Err(server_error()),
                Ok("late".to_string()),
            ],
        ));
        let d = dispatcher(vec![provider_config("p1", 1, &["k1", "k2"])], Arc::clone(&client));
        d.set_provider_active("p1", true).unwrap();
        let cancel = CancellationToken::new();

        // Three failures on k1; k2 (default "ok") answers each time.
        for i in 0..3 {
            let answer = d.answer(&AnswerRequest::new(format!("q{i}")), &cancel).await.unwrap();
            assert_eq!(answer.answer, "ok");
        }
        let health = d.key_health("p1").unwrap();
        assert_eq!(health[0].state, KeyState::Cooldown);

        client.calls.lock().unwrap().clear();
        d.answer(&AnswerRequest::new("during"), &cancel).await.unwrap();
        assert_eq!(calls(&client), vec!["k2"]);

        tokio::time::advance(Duration::from_secs(31)).await;
        client.calls.lock().unwrap().clear();
        let candidates = d.selector.candidates(None);
        assert_eq!(candidates.len(), 2);

        let answer = d.answer(&AnswerRequest::new("after"), &cancel).await.unwrap();
        assert_eq!(answer.answer, "late");
        assert_eq!(calls(&client), vec!["k1"]);
        assert_eq!(d.key_health("p1").unwrap()[0].consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient_failure() {
        let client = Arc::new(ScriptedClient {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let d = dispatcher(vec![provider_config("p1", 1, &["k1"])], Arc::clone(&client));

        let err = d
            .answer(&AnswerRequest::new("slow"), &CancellationToken::new())
            .await
            .unwrap_err();
        let PoolError::AllProvidersExhausted { attempts } = err else {
            panic!("expected exhaustion");
        };
        assert_eq!(attempts[0].error, UpstreamError::Timeout { after_ms: 1_000 });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_skips_bookkeeping() {
        let client = Arc::new(ScriptedClient {
            delay: Some(Duration::from_millis(500)),
            ..Default::default()
        });
        let d = Arc::new(dispatcher(
            vec![provider_config("p1", 1, &["k1", "k2"])],
            Arc::clone(&client),
        ));
        let cancel = CancellationToken::new();

        let task = {
            let d = Arc::clone(&d);
            let cancel = cancel.clone();
            tokio::spawn(async move { d.answer(&AnswerRequest::new("q"), &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap().unwrap_err(), PoolError::Cancelled);
        assert_eq!(calls(&client), vec!["k1"]);
        let k1 = &d.key_health("p1").unwrap()[0];
        assert_eq!(k1.total_failures, 0);
        assert_eq!(k1.total_successes, 0);
    }

    #[tokio::test]
    async fn test_empty_answer_is_malformed() {
        let client = Arc::new(
            ScriptedClient::default()
                .on("k1", vec![Ok("<think>...</think>".to_string())])
                .on("k2", vec![Ok("答案：B. 2".to_string())]),
        );
        let d = dispatcher(vec![provider_config("p1", 1, &["k1", "k2"])], Arc::clone(&client));

        let answer = d
            .answer(&AnswerRequest::new("1+1?").with_type("single"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer.answer, "2");
        assert_eq!(answer.attempts, 2);
        assert!(
            d.key_health("p1").unwrap()[0]
                .last_error
                .as_deref()
                .unwrap()
                .contains("malformed")
        );
    }

    #[tokio::test]
    async fn test_admin_operations() {
        let client = Arc::new(
            ScriptedClient::default().on("k2-secret-material-xyz", vec![Err(server_error())]),
        );
        let d = dispatcher(
            vec![
                provider_config("p1", 1, &["k1", "k2-secret-material-xyz"]),
                provider_config("p2", 2, &["k3"]),
            ],
            Arc::clone(&client),
        );

        d.set_provider_priority("p2", 0).unwrap();
        let statuses = d.provider_statuses();
        assert_eq!(statuses[0].name, "p2");
        assert_eq!(statuses[1].total_keys, 2);

        let probe = d.probe_provider("p1").await.unwrap();
        assert_eq!(probe.keys.len(), 2);
        assert_eq!(probe.healthy_count(), 1);
        assert!(!probe.keys[1].ok);

        let health = d.key_health("p1").unwrap();
        assert_eq!(health[1].masked_key, "k2-sec...-xyz");
        assert_eq!(health[1].consecutive_failures, 1);

        d.reset_provider_health("p1").unwrap();
        assert_eq!(d.key_health("p1").unwrap()[1].consecutive_failures, 0);

        assert_eq!(
            d.key_health("ghost").unwrap_err(),
            PoolError::NotFound("ghost".to_string())
        );
        assert!(d.set_provider_active("ghost", true).is_err());
        assert!(d.probe_provider("ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_cache_forces_upstream() {
        let client = Arc::new(ScriptedClient::default());
        let d = dispatcher(vec![provider_config("p1", 1, &["k1"])], Arc::clone(&client));
        let cancel = CancellationToken::new();

        d.answer(&AnswerRequest::new("q"), &cancel).await.unwrap();
        d.clear_cache().await;
        let again = d.answer(&AnswerRequest::new("q"), &cancel).await.unwrap();
        assert!(!again.from_cache);
        assert_eq!(calls(&client).len(), 2);
    }
}
