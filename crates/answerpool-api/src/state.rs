//! Application state wiring the pool together.
//!
//! AppState holds the dispatcher used by both CLI commands and REST API
//! handlers. The dispatcher is generic over its ports only through boxed
//! trait objects; this is where they get pinned to the infra adapters.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use answerpool_core::cache::store::BoxSharedCacheStore;
use answerpool_core::pool::dispatch::AnswerDispatcher;
use answerpool_core::upstream::box_client::BoxUpstreamClient;
use answerpool_infra::config::load_pool_config;
use answerpool_infra::crypto::hash::Sha256ContentHasher;
use answerpool_infra::sqlite::pool::{default_data_dir, default_database_url};
use answerpool_infra::sqlite::response_store::SqliteResponseStore;
use answerpool_infra::upstream::openai_compat::OpenAiCompatClient;
use answerpool_types::config::{PoolConfig, ServerConfig};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<AnswerDispatcher>,
    /// Listen address defaults for `serve`.
    pub server: ServerConfig,
    /// Period of the background health check; `None` when disabled.
    pub health_check: Option<Duration>,
}

impl AppState {
    /// Load the config at `config_path` and wire the dispatcher.
    pub async fn init(config_path: &Path) -> anyhow::Result<Self> {
        let config = load_pool_config(config_path).await?;
        Self::from_config(&config).await
    }

    /// Wire the dispatcher from an already validated config.
    pub async fn from_config(config: &PoolConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_millis(config.dispatch.request_timeout_ms);
        let client = OpenAiCompatClient::new(timeout).context("failed to build HTTP client")?;

        let shared = match config.cache.shared.as_ref() {
            Some(shared) if config.cache.enabled => {
                let url = if shared.database_url.trim().is_empty() {
                    tokio::fs::create_dir_all(default_data_dir()).await?;
                    default_database_url()
                } else {
                    shared.database_url.clone()
                };
                let store = SqliteResponseStore::connect(&url)
                    .await
                    .with_context(|| format!("failed to open shared cache at {url}"))?;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!(purged, "Purged expired shared cache rows"),
                    Err(e) => tracing::warn!(error = %e, "Failed to purge shared cache"),
                }
                Some(BoxSharedCacheStore::new(store))
            }
            _ => None,
        };

        let dispatcher = AnswerDispatcher::from_config(
            config,
            BoxUpstreamClient::new(client),
            Arc::new(Sha256ContentHasher::new()),
            shared,
        )?;

        tracing::info!(
            providers = dispatcher.provider_statuses().len(),
            shared_cache = config.cache.shared.is_some(),
            "Answer pool ready"
        );

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            server: config.server.clone(),
            health_check: (config.health.check_interval_ms > 0)
                .then(|| Duration::from_millis(config.health.check_interval_ms)),
        })
    }
}
