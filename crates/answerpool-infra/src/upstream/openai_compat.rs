//! OpenAiCompatClient -- concrete [`UpstreamClient`] for OpenAI-compatible
//! chat-completions endpoints.
//!
//! Sends `POST {base_url}/v1/chat/completions` (or `{base_url}/chat/completions`
//! when the base URL already ends in `/v1`) with a Bearer key, and maps every
//! outcome onto `UpstreamError`. The raw HTTP status is kept so the pool can
//! tell quota/auth rejections from transient failures.
//!
//! API keys arrive as [`secrecy::SecretString`] and are only exposed when
//! building the `Authorization` header.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use secrecy::ExposeSecret;

use answerpool_core::upstream::client::{UpstreamClient, UpstreamTarget};
use answerpool_types::upstream::{ChatCompletion, ChatRequest, TokenUsage, UpstreamError};

use super::types::ChatCompletionResponse;

/// Longest upstream error body kept in an `UpstreamError` message.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// HTTP client shared by every provider and key.
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAiCompatClient {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("answerpool/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    /// Chat-completions URL for a provider base URL.
    pub fn completions_url(base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with("/v1") {
            format!("{base}/chat/completions")
        } else {
            format!("{base}/v1/chat/completions")
        }
    }
}

/// `Retry-After` in delta-seconds form, as milliseconds.
fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<u64> {
    let secs: f64 = value?.to_str().ok()?.trim().parse().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0) as u64)
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{cut}...")
    }
}

impl UpstreamClient for OpenAiCompatClient {
    async fn complete(
        &self,
        target: UpstreamTarget<'_>,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, UpstreamError> {
        let url = Self::completions_url(target.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                AUTHORIZATION,
                format!("Bearer {}", target.api_key.expose_secret()),
            )
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    UpstreamError::Timeout {
                        after_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    UpstreamError::Connection {
                        message: format!("HTTP request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = parse_retry_after(response.headers().get(RETRY_AFTER));
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                provider = %target.provider,
                status = status.as_u16(),
                "Upstream returned error status"
            );
            return Err(UpstreamError::from_status(
                status.as_u16(),
                excerpt(&body),
                retry_after_ms,
            ));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }
            } else {
                UpstreamError::Connection {
                    message: format!("failed to read response body: {e}"),
                }
            }
        })?;

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| UpstreamError::Malformed {
                message: format!("failed to parse response: {e}"),
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| UpstreamError::Malformed {
                message: "response has no completion content".to_string(),
            })?;

        Ok(ChatCompletion {
            content,
            model: parsed.model.unwrap_or_else(|| request.model.clone()),
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use answerpool_types::upstream::{ChatMessage, FailureKind};

    use super::*;

    fn request() -> ChatRequest {
        ChatRequest {
            model: "deepseek-chat".to_string(),
            messages: vec![ChatMessage::system("sys"), ChatMessage::user("1+1?")],
            max_tokens: 64,
            temperature: Some(0.7),
        }
    }

    async fn call(server: &MockServer, base_suffix: &str) -> Result<ChatCompletion, UpstreamError> {
        let client = OpenAiCompatClient::new(Duration::from_secs(5)).unwrap();
        let key = SecretString::from("sk-test".to_string());
        let base = format!("{}{}", server.uri(), base_suffix);
        client
            .complete(
                UpstreamTarget {
                    provider: "mock",
                    base_url: &base,
                    api_key: &key,
                },
                &request(),
            )
            .await
    }

    #[test]
    fn test_completions_url() {
        assert_eq!(
            OpenAiCompatClient::completions_url("https://api.example.com/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            OpenAiCompatClient::completions_url("https://api.example.com/v1"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            OpenAiCompatClient::completions_url("https://openrouter.ai/api/v1/"),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_retry_after_parsing() {
        let v = reqwest::header::HeaderValue::from_static("7");
        assert_eq!(parse_retry_after(Some(&v)), Some(7_000));
        let v = reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&v)), None);
        assert_eq!(parse_retry_after(None), None);
    }

    #[tokio::test]
    async fn test_success_sends_bearer_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "deepseek-chat", "max_tokens": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "deepseek-chat-0324",
                "choices": [{"message": {"role": "assistant", "content": "2"}}],
                "usage": {"prompt_tokens": 12, "completion_tokens": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = call(&server, "").await.unwrap();
        assert_eq!(completion.content, "2");
        assert_eq!(completion.model, "deepseek-chat-0324");
        assert_eq!(completion.usage.unwrap().prompt_tokens, 12);
    }

    #[tokio::test]
    async fn test_v1_base_url_not_doubled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let completion = call(&server, "/v1").await.unwrap();
        assert_eq!(completion.content, "ok");
        assert_eq!(completion.model, "deepseek-chat");
    }

    #[tokio::test]
    async fn test_rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_string("slow down"),
            )
            .mount(&server)
            .await;

        let err = call(&server, "").await.unwrap_err();
        assert_eq!(
            err,
            UpstreamError::RateLimited {
                retry_after_ms: Some(3_000)
            }
        );
        assert_eq!(err.kind(), FailureKind::QuotaOrAuth);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        for (status, expected_kind) in [
            (401, FailureKind::QuotaOrAuth),
            (403, FailureKind::QuotaOrAuth),
            (500, FailureKind::Transient),
            (502, FailureKind::Transient),
            (400, FailureKind::Transient),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
                .mount(&server)
                .await;

            let err = call(&server, "").await.unwrap_err();
            assert_eq!(err.kind(), expected_kind, "status {status}: {err}");
        }
    }

    #[tokio::test]
    async fn test_malformed_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;
        assert!(matches!(
            call(&server, "").await.unwrap_err(),
            UpstreamError::Malformed { .. }
        ));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;
        assert!(matches!(
            call(&server, "").await.unwrap_err(),
            UpstreamError::Malformed { .. }
        ));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        // Nothing listens on port 1.
        let uri = "http://127.0.0.1:1".to_string();
        let client = OpenAiCompatClient::new(Duration::from_secs(2)).unwrap();
        let key = SecretString::from("sk-test".to_string());
        let err = client
            .complete(
                UpstreamTarget {
                    provider: "gone",
                    base_url: &uri,
                    api_key: &key,
                },
                &request(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transient);
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let client = OpenAiCompatClient::new(Duration::from_millis(200)).unwrap();
        let key = SecretString::from("sk-test".to_string());
        let base = server.uri();
        let err = client
            .complete(
                UpstreamTarget {
                    provider: "slow",
                    base_url: &base,
                    api_key: &key,
                },
                &request(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, UpstreamError::Timeout { after_ms: 200 });
    }
}
