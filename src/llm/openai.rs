//! OpenAI chat completions with enforced JSON output.

use super::{retry_after_secs, LlmProvider, VerdictPrompt};
use crate::error::LlmError;
use crate::models::ProviderKind;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_URL: &str = "https://api.openai.com/v1";

const PROVIDER: &str = "OpenAI";
const MAX_COMPLETION_TOKENS: u32 = 4000;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_completion_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl OpenAiProvider {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            policy,
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("POST {} (json mode: {})", url, request.response_format.is_some());

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(PROVIDER, status.as_u16(), &body, retry_after));
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("{} envelope: {}", PROVIDER, e)))?;

        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::InvalidResponse(format!("{} returned no message content", PROVIDER)))
    }

    /// One attempt; models that reject `response_format` get a plain retry.
    async fn complete(&self, prompt: &VerdictPrompt, model: &str) -> Result<String, LlmError> {
        let user = prompt.user_message();
        let mut request = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &user,
                },
            ],
            max_completion_tokens: MAX_COMPLETION_TOKENS,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };

        match self.send(&request).await {
            Err(LlmError::Api { status: 400, body }) if body.to_lowercase().contains("response_format") => {
                warn!("{} does not support response_format, retrying without it", model);
                request.response_format = None;
                self.send(&request).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn enforces_schema(&self) -> bool {
        true
    }

    async fn generate_verdict(&self, prompt: &VerdictPrompt, model: &str) -> Result<String, LlmError> {
        self.policy.run("openai", || self.complete(prompt, model)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fast_policy, sample_prompt};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> OpenAiProvider {
        OpenAiProvider::new(reqwest::Client::new(), server.uri(), "sk-test", fast_policy())
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]})
    }

    #[tokio::test]
    async fn test_returns_message_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_object"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"verdict\":\"weak\"}")))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server)
            .generate_verdict(&sample_prompt(), "gpt-4o-mini")
            .await
            .unwrap();
        assert_eq!(text, "{\"verdict\":\"weak\"}");
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Incorrect API key provided"))
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate_verdict(&sample_prompt(), "gpt-4o-mini")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Authentication(_)));
        assert!(err.to_string().contains("Invalid OpenAI API key"));
    }

    #[tokio::test]
    async fn test_quota_exhaustion() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_string("You exceeded your current quota, please check your plan and billing details"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate_verdict(&sample_prompt(), "gpt-4o-mini")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::QuotaExceeded(_)));
    }

    #[tokio::test]
    async fn test_service_unavailable_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate_verdict(&sample_prompt(), "gpt-4o-mini")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_falls_back_when_response_format_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"message": "Invalid parameter: 'response_format' is not supported with this model."}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("plain text")))
            .expect(1)
            .mount(&server)
            .await;

        let text = provider(&server)
            .generate_verdict(&sample_prompt(), "o1-preview")
            .await
            .unwrap();
        assert_eq!(text, "plain text");
    }

    #[tokio::test]
    async fn test_malformed_envelope_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"object": "list"})))
            .mount(&server)
            .await;

        let err = provider(&server)
            .generate_verdict(&sample_prompt(), "gpt-4o-mini")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidResponse(_)));
    }
}
