//! Per-family transport adapter.
//!
//! One network call per provider: place the secret where the family wants
//! it, enforce the provider's timeout, and pull the answer text plus token
//! usage out of the family-specific response envelope. The family is a
//! closed tagged set: every family-specific decision lives in this module,
//! and adding a family touches nothing outside it.

pub mod request;

use std::time::Duration;

use serde_json::Value;

use crate::config::{ProviderConfig, ProviderFamily};
use crate::error::TransportError;

pub use request::{build_wire_request, WireRequest};

/// Maximum error-body length carried into a provider failure message.
const ERROR_BODY_SNIPPET: usize = 400;

/// Token counters as reported by the provider itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// The model's answer text plus whatever usage the envelope reported.
#[derive(Debug, Clone)]
pub struct RawReply {
    pub text: String,
    pub usage: Option<TokenUsage>,
}

/// Performs provider HTTP calls. One shared client, no retries; retry
/// policy belongs to the surrounding tool, not this engine.
#[derive(Debug, Clone)]
pub struct TransportAdapter {
    client: reqwest::Client,
}

impl TransportAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Perform exactly one network call against `provider`.
    pub async fn call(
        &self,
        provider: &ProviderConfig,
        wire: &WireRequest,
        secret: Option<&str>,
    ) -> Result<RawReply, TransportError> {
        let mut req = self
            .client
            .post(&wire.endpoint)
            .header("content-type", "application/json")
            .timeout(Duration::from_millis(provider.timeout_ms))
            .body(wire.body.clone());

        req = apply_auth(provider.family, req, secret);
        for (name, value) in &provider.extra_headers {
            req = req.header(name, value);
        }

        let resp = match req.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                return Err(TransportError::Timeout {
                    timeout_ms: provider.timeout_ms,
                })
            }
            Err(e) => return Err(TransportError::Network(e.to_string())),
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let envelope: Value = resp
            .json()
            .await
            .map_err(|e| TransportError::Envelope(format!("response is not JSON: {e}")))?;

        let text = extract_text(provider.family, &envelope).ok_or_else(|| {
            TransportError::Envelope(format!(
                "no answer text at the {} path",
                provider.family.label()
            ))
        })?;

        Ok(RawReply {
            text,
            usage: extract_usage(provider.family, &envelope),
        })
    }
}

impl Default for TransportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Place the secret where this family expects it.
fn apply_auth(
    family: ProviderFamily,
    req: reqwest::RequestBuilder,
    secret: Option<&str>,
) -> reqwest::RequestBuilder {
    let Some(secret) = secret else {
        return req;
    };
    match family {
        ProviderFamily::MessageApi => req
            .header("x-api-key", secret)
            .header("anthropic-version", "2023-06-01"),
        ProviderFamily::ChatCompletionApi => req.bearer_auth(secret),
        ProviderFamily::GenerationApi => req.header("x-goog-api-key", secret),
        // Local endpoints are usually open; honor a secret if one is set.
        ProviderFamily::LocalHttp => req.bearer_auth(secret),
    }
}

/// JSON path to the answer text, per family.
fn extract_text(family: ProviderFamily, envelope: &Value) -> Option<String> {
    let text = match family {
        ProviderFamily::MessageApi => envelope["content"][0]["text"].as_str(),
        ProviderFamily::ChatCompletionApi => envelope["choices"][0]["message"]["content"].as_str(),
        ProviderFamily::GenerationApi => {
            envelope["candidates"][0]["content"]["parts"][0]["text"].as_str()
        }
        ProviderFamily::LocalHttp => envelope["response"].as_str(),
    };
    text.map(str::to_string)
}

/// JSON path to the usage counters, per family. `None` when the envelope
/// reports nothing, in which case the orchestrator falls back to estimation.
fn extract_usage(family: ProviderFamily, envelope: &Value) -> Option<TokenUsage> {
    let (input, output) = match family {
        ProviderFamily::MessageApi => (
            envelope["usage"]["input_tokens"].as_u64(),
            envelope["usage"]["output_tokens"].as_u64(),
        ),
        ProviderFamily::ChatCompletionApi => (
            envelope["usage"]["prompt_tokens"].as_u64(),
            envelope["usage"]["completion_tokens"].as_u64(),
        ),
        ProviderFamily::GenerationApi => (
            envelope["usageMetadata"]["promptTokenCount"].as_u64(),
            envelope["usageMetadata"]["candidatesTokenCount"].as_u64(),
        ),
        ProviderFamily::LocalHttp => (
            envelope["prompt_eval_count"].as_u64(),
            envelope["eval_count"].as_u64(),
        ),
    };
    if input.is_none() && output.is_none() {
        return None;
    }
    Some(TokenUsage {
        input_tokens: input.unwrap_or(0),
        output_tokens: output.unwrap_or(0),
    })
}

fn snippet(body: &str) -> String {
    if body.len() <= ERROR_BODY_SNIPPET {
        body.to_string()
    } else {
        let mut end = ERROR_BODY_SNIPPET;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(family: ProviderFamily, endpoint: String) -> ProviderConfig {
        ProviderConfig {
            id: "test".into(),
            family,
            endpoint_template: endpoint,
            auth_env_var: Some("TEST_KEY".into()),
            model: "test-model".into(),
            extra_headers: vec![],
            request_template: r#"{"prompt":"{{prompt}}"}"#.into(),
            timeout_ms: 2_000,
            enabled: true,
            input_cost_per_1k: 0.0,
            output_cost_per_1k: 0.0,
        }
    }

    async fn call(provider: &ProviderConfig, secret: Option<&str>) -> Result<RawReply, TransportError> {
        let wire = WireRequest {
            endpoint: provider.endpoint_template.clone(),
            body: r#"{"prompt":"review"}"#.into(),
        };
        TransportAdapter::new().call(provider, &wire, secret).await
    }

    #[tokio::test]
    async fn message_api_auth_and_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "[]"}],
                "usage": {"input_tokens": 120, "output_tokens": 8}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let p = provider(ProviderFamily::MessageApi, format!("{}/v1/messages", server.uri()));
        let reply = call(&p, Some("sk-test")).await.unwrap();
        assert_eq!(reply.text, "[]");
        assert_eq!(
            reply.usage,
            Some(TokenUsage {
                input_tokens: 120,
                output_tokens: 8
            })
        );
    }

    #[tokio::test]
    async fn chat_completion_auth_and_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "answer text"}}],
                "usage": {"prompt_tokens": 50, "completion_tokens": 20}
            })))
            .mount(&server)
            .await;

        let p = provider(
            ProviderFamily::ChatCompletionApi,
            format!("{}/v1/chat/completions", server.uri()),
        );
        let reply = call(&p, Some("sk-chat")).await.unwrap();
        assert_eq!(reply.text, "answer text");
        assert_eq!(reply.usage.unwrap().total(), 70);
    }

    #[tokio::test]
    async fn generation_api_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-goog-api-key", "g-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "gen answer"}]}}],
                "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 12}
            })))
            .mount(&server)
            .await;

        let p = provider(ProviderFamily::GenerationApi, server.uri());
        let reply = call(&p, Some("g-key")).await.unwrap();
        assert_eq!(reply.text, "gen answer");
        assert_eq!(reply.usage.unwrap().input_tokens, 30);
    }

    #[tokio::test]
    async fn local_http_unauthenticated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": "local answer",
                "prompt_eval_count": 40,
                "eval_count": 10
            })))
            .mount(&server)
            .await;

        let p = provider(ProviderFamily::LocalHttp, server.uri());
        let reply = call(&p, None).await.unwrap();
        assert_eq!(reply.text, "local answer");
        assert_eq!(reply.usage.unwrap().total(), 50);
    }

    #[tokio::test]
    async fn missing_usage_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"response": "no counters"})),
            )
            .mount(&server)
            .await;

        let p = provider(ProviderFamily::LocalHttp, server.uri());
        let reply = call(&p, None).await.unwrap();
        assert!(reply.usage.is_none());
    }

    #[tokio::test]
    async fn non_success_status_maps_to_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let p = provider(ProviderFamily::MessageApi, server.uri());
        let err = call(&p, Some("k")).await.unwrap_err();
        match err {
            TransportError::HttpStatus { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "rate limited");
            }
            other => panic!("expected HttpStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"response": "too late"}))
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;

        let mut p = provider(ProviderFamily::LocalHttp, server.uri());
        p.timeout_ms = 20;
        let err = call(&p, None).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn wrong_envelope_shape_is_an_envelope_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"unexpected": "shape"})),
            )
            .mount(&server)
            .await;

        let p = provider(ProviderFamily::MessageApi, server.uri());
        let err = call(&p, Some("k")).await.unwrap_err();
        assert!(matches!(err, TransportError::Envelope(_)));
        assert!(err.to_string().contains("message-api"));
    }

    #[test]
    fn snippet_truncates_long_bodies() {
        let long = "x".repeat(1000);
        let s = snippet(&long);
        assert!(s.len() < 1000);
        assert!(s.ends_with('…'));
        assert_eq!(snippet("short"), "short");
    }
}
