//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::ProviderKind;
use chrono::Datelike;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Earliest literature year accepted by `--since-year`.
pub const MIN_SINCE_YEAR: i32 = 1990;
/// Literature records accepted by `--max-abstracts`.
pub const MAX_ABSTRACTS: usize = 25;

const MAX_GENE_LEN: usize = 50;
const MAX_DISEASE_LEN: usize = 200;

/// GeneLink - LLM-assisted gene/disease correlation analysis
///
/// Gathers evidence from Ensembl, OLS, Open Targets, Europe PMC and the
/// GWAS Catalog, then asks an LLM for a structured correlation verdict.
///
/// Examples:
///   genelink --gene TP53 --disease "lung cancer"
///   genelink --gene BRCA1 --disease MONDO:0007254 --provider anthropic
///   genelink --gene APOE --disease "Alzheimer disease" --no-llm --format json
///   genelink --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Gene symbol or Ensembl gene id (e.g. TP53, ENSG00000141510)
    #[arg(short, long, value_name = "SYMBOL", required_unless_present = "init_config")]
    pub gene: Option<String>,

    /// Disease name or ontology id (e.g. "lung cancer", EFO_0001071)
    #[arg(short, long, value_name = "NAME", required_unless_present = "init_config")]
    pub disease: Option<String>,

    /// Earliest publication year for literature evidence
    #[arg(long, value_name = "YEAR")]
    pub since_year: Option<i32>,

    /// Maximum literature records to keep (1 - 25)
    #[arg(long, value_name = "COUNT")]
    pub max_abstracts: Option<usize>,

    /// Skip the GWAS Catalog
    #[arg(long)]
    pub no_gwas: bool,

    /// LLM provider family
    #[arg(long, value_enum, env = "GENELINK_PROVIDER")]
    pub provider: Option<ProviderKind>,

    /// Model name (defaults to the provider's default model)
    #[arg(short, long, env = "GENELINK_MODEL")]
    pub model: Option<String>,

    /// Collect evidence only; do not ask an LLM for a verdict
    #[arg(long)]
    pub no_llm: bool,

    /// Output format (markdown, json)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<OutputFormat>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .genelink.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Overall analysis timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .genelink.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl clap::ValueEnum for ProviderKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[ProviderKind::OpenAi, ProviderKind::Anthropic]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
        }))
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn gene(&self) -> &str {
        self.gene.as_deref().unwrap_or("").trim()
    }

    pub fn disease(&self) -> &str {
        self.disease.as_deref().unwrap_or("").trim()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        let gene_len = self.gene().chars().count();
        if gene_len == 0 || gene_len > MAX_GENE_LEN {
            return Err(format!(
                "Gene symbol must be 1 to {} characters",
                MAX_GENE_LEN
            ));
        }

        let disease_len = self.disease().chars().count();
        if disease_len == 0 || disease_len > MAX_DISEASE_LEN {
            return Err(format!(
                "Disease name must be 1 to {} characters",
                MAX_DISEASE_LEN
            ));
        }

        if let Some(year) = self.since_year {
            let current = chrono::Utc::now().year();
            if !(MIN_SINCE_YEAR..=current).contains(&year) {
                return Err(format!(
                    "Since-year must be between {} and {}",
                    MIN_SINCE_YEAR, current
                ));
            }
        }

        if let Some(count) = self.max_abstracts {
            if !(1..=MAX_ABSTRACTS).contains(&count) {
                return Err(format!("Max abstracts must be between 1 and {}", MAX_ABSTRACTS));
            }
        }

        if self.no_llm && (self.provider.is_some() || self.model.is_some()) {
            return Err("Cannot combine --no-llm with --provider or --model".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
