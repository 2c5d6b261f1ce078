//! UpstreamClient trait definition.
//!
//! One call = one attempt against one (provider, key). The client does not
//! retry and does not touch health state; it only reports a well-formed
//! completion or a classified `UpstreamError`. Implementations live in
//! answerpool-infra (e.g., `OpenAiCompatClient`).

use secrecy::SecretString;

use answerpool_types::upstream::{ChatCompletion, ChatRequest, UpstreamError};

/// Where a single attempt goes.
#[derive(Clone, Copy)]
pub struct UpstreamTarget<'a> {
    /// Provider name, for logging only.
    pub provider: &'a str,
    /// Base URL without trailing slash.
    pub base_url: &'a str,
    pub api_key: &'a SecretString,
}

impl std::fmt::Debug for UpstreamTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamTarget")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Trait for chat-completion backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait UpstreamClient: Send + Sync {
    /// Send one chat completion request to `target`.
    fn complete(
        &self,
        target: UpstreamTarget<'_>,
        request: &ChatRequest,
    ) -> impl std::future::Future<Output = Result<ChatCompletion, UpstreamError>> + Send;
}
