use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Errors from provider registry lookups and mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("provider '{0}' not found")]
    NotFound(String),

    #[error("provider '{0}' is registered twice")]
    Duplicate(String),
}

/// One failed candidate attempt, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptFailure {
    pub provider: String,
    /// Key identity as `provider#index`; never the key material.
    pub key: String,
    pub error: UpstreamError,
}

/// Terminal outcomes of a pool operation, surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PoolError {
    #[error("provider '{0}' not found")]
    NotFound(String),

    #[error("no active provider with a healthy key supports model '{model}'")]
    NoAvailableProvider { model: String },

    #[error("all {} candidates failed; last error: {}", .attempts.len(), last_reason(.attempts))]
    AllProvidersExhausted { attempts: Vec<AttemptFailure> },

    #[error("request cancelled")]
    Cancelled,
}

fn last_reason(attempts: &[AttemptFailure]) -> String {
    attempts
        .last()
        .map(|a| format!("{} via {}", a.error, a.key))
        .unwrap_or_else(|| "none".to_string())
}

impl From<RegistryError> for PoolError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::NotFound(name) | RegistryError::Duplicate(name) => {
                PoolError::NotFound(name)
            }
        }
    }
}

/// Errors detected while loading or validating pool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid provider '{provider}': {message}")]
    InvalidProvider { provider: String, message: String },

    #[error("duplicate provider name '{0}'")]
    DuplicateProvider(String),

    #[error("environment variable '{0}' referenced by an API key is not set")]
    MissingEnv(String),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// Errors from the shared (durable) cache tier.
#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("cache store connection error: {0}")]
    Connection(String),

    #[error("cache store query error: {0}")]
    Query(String),

    #[error("cache payload error: {0}")]
    Payload(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_message_names_count_and_last_reason() {
        let err = PoolError::AllProvidersExhausted {
            attempts: vec![
                AttemptFailure {
                    provider: "p1".to_string(),
                    key: "p1#0".to_string(),
                    error: UpstreamError::Timeout { after_ms: 100 },
                },
                AttemptFailure {
                    provider: "p2".to_string(),
                    key: "p2#0".to_string(),
                    error: UpstreamError::Unauthorized { status: 401 },
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("all 2 candidates failed"), "got: {msg}");
        assert!(msg.contains("p2#0"), "got: {msg}");
        assert!(msg.contains("401"), "got: {msg}");
    }

    #[test]
    fn test_registry_not_found_converts() {
        let err: PoolError = RegistryError::NotFound("ghost".to_string()).into();
        assert_eq!(err, PoolError::NotFound("ghost".to_string()));
        assert_eq!(err.to_string(), "provider 'ghost' not found");
    }
}
