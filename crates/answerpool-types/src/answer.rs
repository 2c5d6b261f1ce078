//! Inbound question and outbound answer types.

use serde::{Deserialize, Serialize};

/// A normalized question handed to the pool by the calling collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerRequest {
    /// Question text as submitted (normalization happens in the fingerprint).
    pub question: String,
    /// Preferred model; `None` lets each provider use its default model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Question type hint (`single`, `multiple`, `judge`, `completion`, ...).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
    /// Answer options block, one option per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<String>,
}

impl AnswerRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_type(mut self, question_type: impl Into<String>) -> Self {
        self.question_type = Some(question_type.into());
        self
    }

    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.options = Some(options.into());
        self
    }

    /// Reject requests that must never reach an upstream.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.question.trim().is_empty() {
            return Err("question must not be empty");
        }
        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err("model must not be blank");
        }
        Ok(())
    }
}

/// Answer plus provenance returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Provider that produced the answer (original provider on cache hits).
    pub provider: String,
    pub model: String,
    pub from_cache: bool,
    pub latency_ms: u64,
    /// Upstream attempts made for this request (0 on cache hits).
    pub attempts: u32,
}

/// Payload stored in both cache tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAnswer {
    pub answer: String,
    pub provider: String,
    pub model: String,
}
