//! Anthropic messages API. Output format is not enforced by the provider.

use super::{retry_after_secs, LlmProvider, VerdictPrompt};
use crate::error::LlmError;
use crate::models::ProviderKind;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_URL: &str = "https://api.anthropic.com/v1";
pub const API_VERSION: &str = "2023-06-01";

const PROVIDER: &str = "Anthropic";
const MAX_TOKENS: u32 = 2000;
const TEMPERATURE: f32 = 0.3;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    text: Option<String>,
}

pub struct AnthropicProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl AnthropicProvider {
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

    async fn complete(&self, prompt: &VerdictPrompt, model: &str) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.base_url);
        let user = prompt.user_message();
        let request = MessagesRequest {
            model,
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
            system: &prompt.system,
            messages: [Message {
                role: "user",
                content: &user,
            }],
        };
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(PROVIDER, e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = retry_after_secs(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::from_status(PROVIDER, status.as_u16(), &body, retry_after));
        }

        let envelope: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("{} envelope: {}", PROVIDER, e)))?;

        envelope
            .content
            .into_iter()
            .filter(|block| block.kind.is_empty() || block.kind == "text")
            .find_map(|block| block.text)
            .ok_or_else(|| LlmError::InvalidResponse(format!("{} returned no text block", PROVIDER)))
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn enforces_schema(&self) -> bool {
        false
    }

    async fn generate_verdict(&self, prompt: &VerdictPrompt, model: &str) -> Result<String, LlmError> {
        self.policy.run("anthropic", || self.complete(prompt, model)).await
    }
}
