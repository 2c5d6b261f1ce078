//! Pool configuration loader.
//!
//! Reads `answerpool.toml`, resolves `env:NAME` API key references from the
//! environment and validates the result. Unlike optional settings files, a
//! missing or malformed pool config is an error: there is nothing to route
//! to without providers.

use std::path::{Path, PathBuf};

use answerpool_types::config::PoolConfig;
use answerpool_types::error::ConfigError;

/// Prefix marking an API key entry as an environment variable reference.
const ENV_KEY_PREFIX: &str = "env:";

/// Default config path when neither `--config` nor `APOOL_CONFIG` is given.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("answerpool.toml")
}

/// Load, resolve and validate the pool configuration at `path`.
pub async fn load_pool_config(path: &Path) -> Result<PoolConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let config = parse_pool_config(&content, |name| std::env::var(name).ok())?;
    tracing::debug!(
        path = %path.display(),
        providers = config.providers.len(),
        "Loaded pool configuration"
    );
    Ok(config)
}

/// Parse TOML, resolve key references with `lookup`, then validate.
pub fn parse_pool_config(
    content: &str,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PoolConfig, ConfigError> {
    let mut config: PoolConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    resolve_key_refs(&mut config, lookup)?;
    config.validate()?;
    Ok(config)
}

/// Replace every `env:NAME` key entry with the variable's value.
pub fn resolve_key_refs(
    config: &mut PoolConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    for provider in &mut config.providers {
        for key in &mut provider.keys {
            if let Some(var) = key.strip_prefix(ENV_KEY_PREFIX) {
                let var = var.trim();
                *key = lookup(var)
                    .filter(|value| !value.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingEnv(var.to_string()))?;
            }
        }
    }
    Ok(())
}
