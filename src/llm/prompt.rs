//! Prompt construction for the correlation verdict.

use crate::models::{AnalysisRequest, EvidenceBundle, ResolvedEntity};
use serde_json::{json, Value};

/// Instructions shared by every provider family.
pub const SYSTEM_PROMPT: &str = "You are a biomedical evidence-synthesis assistant. \
Assess whether the GENE is causally or mechanistically associated with the DISEASE.
Rules:
1) Use only the evidence provided. Do not invent citations or facts.
2) Weigh genetic evidence highest, then functional/omics, then literature consensus.
3) Note contradictions, biases (small N, population stratification), and whether evidence is disease-subtype-specific.
4) Prefer human data over model organisms unless human is absent.
5) Output valid JSON only, matching the schema you are given.
6) Every key point must cite the evidence item it relies on (e.g. \"europe_pmc:PMID123\").
7) If evidence is insufficient, say so and explain next steps.";

/// Shape the model must answer with.
pub const VERDICT_SCHEMA: &str = r#"{
  "verdict": "strong|moderate|weak|no_evidence|inconclusive",
  "confidence": 0.0,
  "key_points": [
    {"statement": "...", "citation": "gwas_catalog:PMID..."}
  ],
  "drivers": {
    "genetic": {"present": true, "summary": "..."},
    "functional": {"present": true, "summary": "..."},
    "literature": {"present": false, "summary": ""}
  },
  "recommended_next_steps": ["..."]
}"#;

/// One verdict request: instructions, evidence summary and schema.
#[derive(Debug, Clone, PartialEq)]
pub struct VerdictPrompt {
    pub system: String,
    /// Evidence summary as a JSON document.
    pub evidence: String,
    pub schema: String,
}

impl VerdictPrompt {
    pub fn build(
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        bundle: &EvidenceBundle,
        request: &AnalysisRequest,
    ) -> Self {
        let summary = evidence_summary(gene, disease, bundle, request);
        Self {
            system: SYSTEM_PROMPT.to_string(),
            evidence: serde_json::to_string_pretty(&summary).unwrap_or_else(|_| summary.to_string()),
            schema: VERDICT_SCHEMA.to_string(),
        }
    }

    /// The user turn sent after the system instructions.
    pub fn user_message(&self) -> String {
        format!(
            "Task: Evaluate the correlation between the gene and the disease described below. \
             Return ONLY a JSON object matching this schema:\n{}\n\nEVIDENCE:\n{}",
            self.schema, self.evidence
        )
    }
}

fn entity_summary(entity: &ResolvedEntity) -> Value {
    json!({
        "input": entity.raw,
        "identifier": entity.identifier,
        "label": entity.label,
        "resolved": entity.is_resolved(),
        "synonyms": entity.synonyms,
    })
}

/// Everything the model may rely on, including which sources failed.
pub fn evidence_summary(
    gene: &ResolvedEntity,
    disease: &ResolvedEntity,
    bundle: &EvidenceBundle,
    request: &AnalysisRequest,
) -> Value {
    let sources: serde_json::Map<String, Value> = bundle
        .sources
        .iter()
        .map(|(name, result)| {
            let mut entry = json!({ "status": result.status });
            if let Some(payload) = &result.payload {
                entry["data"] = serde_json::to_value(payload).unwrap_or(Value::Null);
            }
            if let Some(error) = &result.error {
                entry["note"] = Value::String(error.clone());
            }
            (name.clone(), entry)
        })
        .collect();

    json!({
        "gene": entity_summary(gene),
        "disease": entity_summary(disease),
        "literature_since_year": request.since_year,
        "sources": sources,
    })
}
