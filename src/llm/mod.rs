//! LLM provider families.
//!
//! Both families sit behind [`LlmProvider`]. A provider only turns a
//! [`VerdictPrompt`] into raw response text; schema validation happens in
//! the correlation analyzer regardless of what the provider promises.

pub mod anthropic;
pub mod openai;
pub mod prompt;

use crate::config::{LlmConfig, RetryConfig};
use crate::error::LlmError;
use crate::models::ProviderKind;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use prompt::VerdictPrompt;

/// One LLM provider family.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the provider enforces JSON output on its side.
    fn enforces_schema(&self) -> bool;

    /// Send the prompt and return the model's raw text.
    async fn generate_verdict(&self, prompt: &VerdictPrompt, model: &str) -> Result<String, LlmError>;
}

/// Providers available to the pipeline, by family.
pub type ProviderRegistry = HashMap<ProviderKind, Arc<dyn LlmProvider>>;

/// Build every provider family that has an API key.
pub fn build_providers(
    config: &LlmConfig,
    retry: &RetryConfig,
    client: &reqwest::Client,
) -> ProviderRegistry {
    let mut providers: ProviderRegistry = HashMap::new();
    let policy = config.retry_policy(retry);

    match config.api_key(ProviderKind::OpenAi) {
        Some(key) => {
            debug!("OpenAI provider at {}", config.openai_base_url());
            providers.insert(
                ProviderKind::OpenAi,
                Arc::new(OpenAiProvider::new(
                    client.clone(),
                    config.openai_base_url(),
                    key,
                    policy.clone(),
                )),
            );
        }
        None => debug!("No OpenAI API key configured"),
    }

    match config.api_key(ProviderKind::Anthropic) {
        Some(key) => {
            debug!("Anthropic provider at {}", config.anthropic_base_url());
            providers.insert(
                ProviderKind::Anthropic,
                Arc::new(AnthropicProvider::new(
                    client.clone(),
                    config.anthropic_base_url(),
                    key,
                    policy,
                )),
            );
        }
        None => debug!("No Anthropic API key configured"),
    }

    if providers.is_empty() {
        warn!("No LLM provider has an API key; analyses will stop after evidence collection");
    }
    providers
}

/// Parse the `retry-after` header as whole seconds.
pub(crate) fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
