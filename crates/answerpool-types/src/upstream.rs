//! Upstream completion request/response types.
//!
//! These model a provider-neutral chat completion exchange. The infra layer
//! maps them onto the OpenAI-compatible wire format.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
}

/// A single message in a chat exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Chat completion request sent to one upstream provider.
///
/// `model` is already resolved against the provider's supported models.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// Token usage reported by the upstream, when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// Well-formed completion returned by an upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletion {
    /// Completion text (`choices[0].message.content`).
    pub content: String,
    /// Model the upstream reports having used.
    pub model: String,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Coarse failure class used for health bookkeeping and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network trouble, timeouts, 5xx, malformed bodies, other rejections.
    Transient,
    /// 401/402/403/429: credential or quota problems on this key.
    QuotaOrAuth,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::QuotaOrAuth => write!(f, "quota_or_auth"),
        }
    }
}

/// Outcome of one failed upstream attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamError {
    #[error("request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("malformed response: {message}")]
    Malformed { message: String },

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("credential rejected (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
}

impl UpstreamError {
    /// Classify this failure for the tracker and telemetry.
    pub fn kind(&self) -> FailureKind {
        match self {
            UpstreamError::RateLimited { .. } | UpstreamError::Unauthorized { .. } => {
                FailureKind::QuotaOrAuth
            }
            UpstreamError::Timeout { .. }
            | UpstreamError::Connection { .. }
            | UpstreamError::Server { .. }
            | UpstreamError::Malformed { .. }
            | UpstreamError::Rejected { .. } => FailureKind::Transient,
        }
    }

    /// Map a non-success HTTP status (and body excerpt) onto the taxonomy.
    pub fn from_status(status: u16, message: String, retry_after_ms: Option<u64>) -> Self {
        match status {
            401 | 402 | 403 => UpstreamError::Unauthorized { status },
            429 => UpstreamError::RateLimited { retry_after_ms },
            500..=599 => UpstreamError::Server { status, message },
            _ => UpstreamError::Rejected { status, message },
        }
    }
}
