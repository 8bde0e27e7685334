//! Correlation verdict synthesis.
//!
//! The provider's answer goes through two validation tiers. The strict tier
//! accepts only the exact schema; anything else is handed to the fallback
//! tier, which never fails. Provider errors are not formatting problems and
//! are returned to the caller untouched.

use super::extract;
use crate::error::LlmError;
use crate::llm::{LlmProvider, VerdictPrompt};
use crate::models::{
    clamp_confidence, AnalysisRequest, EvidenceBundle, EvidenceDriver, KeyPoint, LlmVerdict,
    ParseTier, ResolvedEntity, Verdict,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct StrictVerdict {
    verdict: Verdict,
    confidence: f64,
    key_points: Vec<KeyPoint>,
    drivers: BTreeMap<String, EvidenceDriver>,
    #[serde(default)]
    recommended_next_steps: Vec<String>,
}

/// Parse `raw` as the exact verdict schema.
pub fn parse_strict(raw: &str) -> Result<LlmVerdict, serde_json::Error> {
    let parsed: StrictVerdict = serde_json::from_str(raw.trim())?;
    Ok(LlmVerdict {
        verdict: parsed.verdict,
        confidence: clamp_confidence(parsed.confidence),
        key_points: parsed.key_points,
        drivers: parsed.drivers,
        recommended_next_steps: parsed.recommended_next_steps,
        tier: ParseTier::Strict,
        raw_response: None,
    })
}

/// Best-effort verdict with safe defaults for whatever cannot be recovered.
pub fn parse_fallback(raw: &str) -> LlmVerdict {
    let recovered = extract::recover(raw);
    let defaults = LlmVerdict::inconclusive(Some(raw.to_string()));
    LlmVerdict {
        verdict: recovered.verdict.unwrap_or(defaults.verdict),
        confidence: recovered.confidence.unwrap_or(defaults.confidence),
        key_points: recovered.key_points,
        drivers: recovered.drivers,
        recommended_next_steps: recovered.recommended_next_steps,
        ..defaults
    }
}

/// Strict tier, then fallback tier.
pub fn parse_verdict(raw: &str) -> LlmVerdict {
    match parse_strict(raw) {
        Ok(verdict) => verdict,
        Err(err) => {
            warn!("Response failed strict validation ({}), using fallback extraction", err);
            parse_fallback(raw)
        }
    }
}

/// Renders a verdict for one analysis with one provider and model.
pub struct CorrelationAnalyzer {
    provider: Arc<dyn LlmProvider>,
    model: String,
}

impl CorrelationAnalyzer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    pub async fn analyze(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        bundle: &EvidenceBundle,
        request: &AnalysisRequest,
    ) -> Result<LlmVerdict, LlmError> {
        let prompt = VerdictPrompt::build(gene, disease, bundle, request);
        info!(
            "Requesting verdict from {} ({}), {} source(s) usable",
            self.provider.kind(),
            self.model,
            bundle.usable_count()
        );

        let raw = self.provider.generate_verdict(&prompt, &self.model).await?;
        debug!("Received {} chars from {}", raw.len(), self.provider.kind());

        if !self.provider.enforces_schema() {
            debug!("{} does not enforce the schema", self.provider.kind());
        }
        let verdict = parse_verdict(&raw);
        info!(
            "Verdict: {} (confidence {:.2}, {:?} tier)",
            verdict.verdict, verdict.confidence, verdict.tier
        );
        Ok(verdict)
    }
}
