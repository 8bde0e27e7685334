//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.genelink.toml` files.

use crate::cli::{Args, OutputFormat};
use crate::llm::{anthropic, openai};
use crate::models::{AnalysisRequest, ProviderKind};
use crate::retry::RetryPolicy;
use crate::sources::{ensembl, europe_pmc, gwas, ols, opentargets};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".genelink.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Evidence provider endpoints and limits.
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Retry policy shared by the evidence providers.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Phase deadlines.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Request defaults.
    #[serde(default)]
    pub defaults: RequestDefaults,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Default report format.
    #[serde(default)]
    pub format: OutputFormat,
}

/// Evidence provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_ensembl_url")]
    pub ensembl_url: String,

    #[serde(default = "default_ols_url")]
    pub ols_url: String,

    #[serde(default = "default_opentargets_url")]
    pub opentargets_url: String,

    #[serde(default = "default_europe_pmc_url")]
    pub europe_pmc_url: String,

    #[serde(default = "default_gwas_url")]
    pub gwas_url: String,

    /// Maximum GWAS associations kept per analysis.
    #[serde(default = "default_gwas_max_records")]
    pub gwas_max_records: usize,

    /// Targets per Open Targets association page.
    #[serde(default = "default_opentargets_page_size")]
    pub opentargets_page_size: usize,

    /// Association pages scanned before giving up on a gene.
    #[serde(default = "default_opentargets_max_pages")]
    pub opentargets_max_pages: usize,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            ensembl_url: default_ensembl_url(),
            ols_url: default_ols_url(),
            opentargets_url: default_opentargets_url(),
            europe_pmc_url: default_europe_pmc_url(),
            gwas_url: default_gwas_url(),
            gwas_max_records: default_gwas_max_records(),
            opentargets_page_size: default_opentargets_page_size(),
            opentargets_max_pages: default_opentargets_max_pages(),
        }
    }
}

fn default_ensembl_url() -> String {
    ensembl::DEFAULT_URL.to_string()
}

fn default_ols_url() -> String {
    ols::DEFAULT_URL.to_string()
}

fn default_opentargets_url() -> String {
    opentargets::DEFAULT_URL.to_string()
}

fn default_europe_pmc_url() -> String {
    europe_pmc::DEFAULT_URL.to_string()
}

fn default_gwas_url() -> String {
    gwas::DEFAULT_URL.to_string()
}

fn default_gwas_max_records() -> usize {
    15
}

fn default_opentargets_page_size() -> usize {
    50
}

fn default_opentargets_max_pages() -> usize {
    20
}

/// Retry settings for evidence providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Relative jitter applied to each delay (0.0 - 1.0).
    #[serde(default = "default_jitter")]
    pub jitter: f64,

    /// Time budget of a single attempt.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
            attempt_timeout_secs: default_attempt_timeout(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: self.jitter,
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> f64 {
    0.25
}

fn default_attempt_timeout() -> u64 {
    30
}

/// Phase deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Wall-clock bound of the evidence collection phase.
    #[serde(default = "default_collection_deadline")]
    pub collection_deadline_secs: u64,

    /// Wall-clock bound of a whole analysis.
    #[serde(default = "default_overall_timeout")]
    pub overall_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection_deadline_secs: default_collection_deadline(),
            overall_timeout_secs: default_overall_timeout(),
        }
    }
}

fn default_collection_deadline() -> u64 {
    120
}

fn default_overall_timeout() -> u64 {
    600
}

/// LLM provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider family used when the CLI does not name one.
    #[serde(default = "default_provider")]
    pub provider: ProviderKind,

    /// Model name; the provider's default model when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// OpenAI API base URL (`OPENAI_BASE_URL` overrides).
    #[serde(default = "default_openai_url")]
    pub openai_url: String,

    /// Anthropic API base URL (`ANTHROPIC_BASE_URL` overrides).
    #[serde(default = "default_anthropic_url")]
    pub anthropic_url: String,

    /// OpenAI key; falls back to `OPENAI_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    /// Anthropic key; falls back to `ANTHROPIC_API_KEY`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,

    /// Time budget of one provider call, in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    /// Attempts per verdict request on transient failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            openai_url: default_openai_url(),
            anthropic_url: default_anthropic_url(),
            openai_api_key: None,
            anthropic_api_key: None,
            timeout_seconds: default_llm_timeout(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_provider() -> ProviderKind {
    ProviderKind::OpenAi
}

fn default_openai_url() -> String {
    openai::DEFAULT_URL.to_string()
}

fn default_anthropic_url() -> String {
    anthropic::DEFAULT_URL.to_string()
}

fn default_llm_timeout() -> u64 {
    90
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_var(name: &str) -> Option<String> {
    non_empty(std::env::var(name).ok())
}

impl LlmConfig {
    /// API key for `kind` from the file, else from the environment.
    pub fn api_key(&self, kind: ProviderKind) -> Option<String> {
        match kind {
            ProviderKind::OpenAi => {
                non_empty(self.openai_api_key.clone()).or_else(|| env_var("OPENAI_API_KEY"))
            }
            ProviderKind::Anthropic => {
                non_empty(self.anthropic_api_key.clone()).or_else(|| env_var("ANTHROPIC_API_KEY"))
            }
        }
    }

    pub fn openai_base_url(&self) -> String {
        env_var("OPENAI_BASE_URL").unwrap_or_else(|| self.openai_url.clone())
    }

    pub fn anthropic_base_url(&self) -> String {
        env_var("ANTHROPIC_BASE_URL").unwrap_or_else(|| self.anthropic_url.clone())
    }

    /// Model to use for `kind`.
    pub fn model_for(&self, kind: ProviderKind) -> String {
        non_empty(self.model.clone()).unwrap_or_else(|| kind.default_model().to_string())
    }

    /// Backoff shape from `[retry]`; attempt count and timeout from `[llm]`.
    pub fn retry_policy(&self, retry: &RetryConfig) -> RetryPolicy {
        retry
            .policy()
            .with_max_attempts(self.max_attempts)
            .with_attempt_timeout(Duration::from_secs(self.timeout_seconds))
    }
}

/// Defaults for fields the CLI does not set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDefaults {
    #[serde(default = "default_since_year")]
    pub since_year: i32,

    #[serde(default = "default_max_abstracts")]
    pub max_abstracts: usize,

    #[serde(default = "default_true")]
    pub include_gwas: bool,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            since_year: default_since_year(),
            max_abstracts: default_max_abstracts(),
            include_gwas: true,
        }
    }
}

fn default_since_year() -> i32 {
    2015
}

fn default_max_abstracts() -> usize {
    8
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Reject budgets that would make every request fail immediately.
    pub fn validate(&self) -> Result<()> {
        if self.retry.attempt_timeout_secs == 0 {
            anyhow::bail!("retry.attempt_timeout_secs must be at least 1 second");
        }
        if self.llm.timeout_seconds == 0 {
            anyhow::bail!("llm.timeout_seconds must be at least 1 second");
        }
        if self.pipeline.collection_deadline_secs == 0 {
            anyhow::bail!("pipeline.collection_deadline_secs must be at least 1 second");
        }
        if self.pipeline.overall_timeout_secs == 0 {
            anyhow::bail!("pipeline.overall_timeout_secs must be at least 1 second");
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            anyhow::bail!("retry.jitter must be between 0.0 and 1.0");
        }
        Ok(())
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(provider) = args.provider {
            if provider != self.llm.provider {
                // a model configured for the other family would not exist here
                self.llm.model = None;
            }
            self.llm.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.llm.model = Some(model.clone());
        }

        if let Some(since_year) = args.since_year {
            self.defaults.since_year = since_year;
        }
        if let Some(max_abstracts) = args.max_abstracts {
            self.defaults.max_abstracts = max_abstracts;
        }
        if args.no_gwas {
            self.defaults.include_gwas = false;
        }

        if let Some(timeout) = args.timeout {
            self.pipeline.overall_timeout_secs = timeout;
        }
        if let Some(format) = args.format {
            self.general.format = format;
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Build the analysis request for a gene/disease pair.
    pub fn request(&self, gene: &str, disease: &str, with_llm: bool) -> AnalysisRequest {
        let mut request = AnalysisRequest::new(gene, disease);
        request.since_year = self.defaults.since_year;
        request.max_abstracts = self.defaults.max_abstracts;
        request.include_gwas = self.defaults.include_gwas;
        if with_llm {
            let provider = self.llm.provider;
            request = request.with_llm(provider, self.llm.model_for(provider));
        }
        request
    }

    pub fn collection_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline.collection_deadline_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.overall_timeout_secs)
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
