//! Pool configuration types.
//!
//! `PoolConfig` represents the top-level `answerpool.toml`: the ordered
//! provider list plus cache, health and dispatch settings. Every section
//! has serde defaults so a file only needs `[[providers]]` entries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One upstream provider record as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g., "siliconflow", "openrouter").
    pub name: String,
    /// Base endpoint URL (e.g., "https://api.openai.com").
    pub base_url: String,
    /// API keys, tried in rotation. Entries of the form `env:NAME` are
    /// resolved from the environment at load time.
    pub keys: Vec<String>,
    /// Default model, used when a request has no model preference.
    pub model: String,
    /// Additional supported model identifiers.
    #[serde(default)]
    pub models: Vec<String>,
    /// Whether this provider takes traffic.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Priority tier; lower = tried first.
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_active() -> bool {
    true
}

fn default_priority() -> i32 {
    1
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether answers are cached at all.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Time-to-live for cached answers, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Maximum entries kept in the in-process tier.
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Optional shared durable tier.
    #[serde(default)]
    pub shared: Option<SharedCacheConfig>,
}

/// Shared cache tier settings (SQLite database URL).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedCacheConfig {
    /// e.g. `sqlite:///var/lib/answerpool/cache.db?mode=rwc`; empty selects
    /// the default data directory.
    #[serde(default)]
    pub database_url: String,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_ttl_secs() -> u64 {
    // 30 days
    2_592_000
}

fn default_max_entries() -> u64 {
    10_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            shared: None,
        }
    }
}

/// Key health / cooldown policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures before a key enters cooldown.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Cooldown applied when the threshold is first reached, in milliseconds.
    #[serde(default = "default_base_cooldown_ms")]
    pub base_cooldown_ms: u64,
    /// Upper bound for the exponential cooldown, in milliseconds.
    #[serde(default = "default_max_cooldown_ms")]
    pub max_cooldown_ms: u64,
    /// Period of the background check that sends a test question through
    /// every key of each active provider, in milliseconds. 0 disables it.
    #[serde(default)]
    pub check_interval_ms: u64,
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_base_cooldown_ms() -> u64 {
    30_000
}

fn default_max_cooldown_ms() -> u64 {
    600_000
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_cooldown_ms: default_base_cooldown_ms(),
            max_cooldown_ms: default_max_cooldown_ms(),
            check_interval_ms: 0,
        }
    }
}

/// Upstream request settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Per-attempt upstream timeout, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// System prompt prepended to every upstream request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f64 {
    0.7
}

fn default_system_prompt() -> String {
    "你是一个专业的考试答题助手。请直接回答答案，不要解释。\
     选择题只回答选项的内容；多选题用#号分隔答案；\
     判断题只回答正确或错误；填空题直接给出答案。"
        .to_string()
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

/// HTTP listener settings for `apool serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Top-level configuration for the provider pool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Ordered provider list; order breaks priority ties.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl PoolConfig {
    /// Reject malformed entries at load time rather than at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for provider in &self.providers {
            validate_provider(provider)?;
            if !seen.insert(provider.name.as_str()) {
                return Err(ConfigError::DuplicateProvider(provider.name.clone()));
            }
        }

        if self.cache.enabled && self.cache.ttl_secs == 0 {
            return Err(ConfigError::InvalidSetting(
                "cache.ttl_secs must be greater than zero".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::InvalidSetting(
                "cache.max_entries must be greater than zero".to_string(),
            ));
        }
        if self.health.failure_threshold == 0 {
            return Err(ConfigError::InvalidSetting(
                "health.failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.health.max_cooldown_ms < self.health.base_cooldown_ms {
            return Err(ConfigError::InvalidSetting(
                "health.max_cooldown_ms must not be below health.base_cooldown_ms".to_string(),
            ));
        }
        if self.dispatch.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidSetting(
                "dispatch.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_provider(provider: &ProviderConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| ConfigError::InvalidProvider {
        provider: provider.name.clone(),
        message: message.to_string(),
    };

    if provider.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if !(provider.base_url.starts_with("http://") || provider.base_url.starts_with("https://")) {
        return Err(invalid("base_url must start with http:// or https://"));
    }
    if provider.keys.is_empty() {
        return Err(invalid("at least one API key is required"));
    }
    if provider.keys.iter().any(|k| k.trim().is_empty()) {
        return Err(invalid("API keys must not be blank"));
    }
    if provider.model.trim().is_empty() {
        return Err(invalid("default model must not be empty"));
    }
    if provider.models.iter().any(|m| m.trim().is_empty()) {
        return Err(invalid("model identifiers must not be blank"));
    }
    Ok(())
}
