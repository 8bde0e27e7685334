//! Data models for the correlation pipeline.
//!
//! This module contains the core data structures that flow through the
//! pipeline: the request, resolved entities, per-source results, the
//! evidence bundle, the LLM verdict and the terminal analysis result.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// LLM provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Chat completions with enforced JSON output.
    OpenAi,
    /// Messages API without enforced structured output.
    Anthropic,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl ProviderKind {
    /// Model used when the caller does not name one.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Anthropic => "claude-3-haiku-20240307",
        }
    }
}

/// Which provider and model should render the verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSelection {
    pub provider: ProviderKind,
    pub model: String,
}

/// Immutable input of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Raw gene symbol as typed by the user.
    pub gene: String,
    /// Raw disease name or ontology identifier.
    pub disease: String,
    /// Earliest publication year for literature evidence.
    pub since_year: i32,
    /// Maximum literature records to keep.
    pub max_abstracts: usize,
    /// Whether to query the GWAS Catalog.
    pub include_gwas: bool,
    /// LLM to use; `None` skips the analysis phase.
    pub llm: Option<LlmSelection>,
}

impl AnalysisRequest {
    /// Creates a request with the default literature window and no LLM.
    pub fn new(gene: impl Into<String>, disease: impl Into<String>) -> Self {
        Self {
            gene: gene.into().trim().to_string(),
            disease: disease.into().trim().to_string(),
            since_year: 2015,
            max_abstracts: 8,
            include_gwas: true,
            llm: None,
        }
    }

    /// Selects the LLM that renders the verdict.
    pub fn with_llm(mut self, provider: ProviderKind, model: impl Into<String>) -> Self {
        self.llm = Some(LlmSelection {
            provider,
            model: model.into(),
        });
        self
    }
}

/// Gene or disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Gene,
    Disease,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Gene => write!(f, "gene"),
            EntityKind::Disease => write!(f, "disease"),
        }
    }
}

/// Outcome of entity resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
}

/// A gene or disease after resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    pub kind: EntityKind,
    /// The string the user supplied.
    pub raw: String,
    /// Canonical identifier, or the raw input when unresolved.
    pub identifier: String,
    /// Human readable label.
    pub label: String,
    /// Synonyms, deduplicated, in preference order.
    pub synonyms: Vec<String>,
    /// Other identifiers for the same concept (e.g. MONDO next to EFO).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternate_ids: Vec<String>,
    pub status: ResolutionStatus,
}

impl ResolvedEntity {
    /// A resolved entity; the raw input is always kept among the synonyms.
    pub fn resolved(
        kind: EntityKind,
        raw: &str,
        identifier: impl Into<String>,
        label: impl Into<String>,
        synonyms: Vec<String>,
    ) -> Self {
        let label = label.into();
        let mut all = vec![label.clone(), raw.to_string()];
        all.extend(synonyms);
        Self {
            kind,
            raw: raw.to_string(),
            identifier: identifier.into(),
            label,
            synonyms: dedup_terms(all),
            alternate_ids: Vec::new(),
            status: ResolutionStatus::Resolved,
        }
    }

    /// A degraded entity carrying only the raw input.
    pub fn unresolved(kind: EntityKind, raw: &str) -> Self {
        Self {
            kind,
            raw: raw.to_string(),
            identifier: raw.to_string(),
            label: raw.to_string(),
            synonyms: vec![raw.to_string()],
            alternate_ids: Vec::new(),
            status: ResolutionStatus::Unresolved,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ResolutionStatus::Resolved
    }

    /// The canonical identifier, if resolution succeeded.
    pub fn canonical_id(&self) -> Option<&str> {
        if self.is_resolved() {
            Some(&self.identifier)
        } else {
            None
        }
    }
}

/// Remove empty and case-insensitively duplicated terms, keeping first occurrence.
pub fn dedup_terms(terms: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    terms
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

/// Per-provider outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    Partial,
    Unavailable,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Ok => write!(f, "ok"),
            SourceStatus::Partial => write!(f, "partial"),
            SourceStatus::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Gene lookup record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneRecord {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// Best-matching ontology concept for a disease label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseConcept {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mondo_id: Option<String>,
}

/// Gene/disease association score from Open Targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationScore {
    pub overall: f64,
    /// Score per evidence datatype (genetic_association, literature, ...).
    pub datatype_scores: BTreeMap<String, f64>,
    pub disease_id: String,
    pub disease_name: String,
    pub target_id: String,
}

/// Association lookup outcome, including the "no association" case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationEvidence {
    pub association: Option<AssociationScore>,
    pub pages_scanned: usize,
    pub total_targets: usize,
}

/// One literature record with sentences mentioning both entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureHit {
    pub pmid: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub uri: Option<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub authors: String,
    pub sentences: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiteratureEvidence {
    pub query: String,
    pub hits: Vec<LiteratureHit>,
}

/// One GWAS association that maps to the gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GwasHit {
    pub snp: Option<String>,
    pub trait_name: Option<String>,
    pub p_value: Option<f64>,
    pub mapped_genes: Vec<String>,
    pub effect_size: Option<f64>,
    pub pmid: Option<String>,
    pub study_accession: Option<String>,
    pub uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GwasEvidence {
    pub trait_query: String,
    pub hits: Vec<GwasHit>,
}

/// Provider-specific payload of a [`SourceResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourcePayload {
    Gene(GeneRecord),
    Disease(DiseaseConcept),
    Association(AssociationEvidence),
    Literature(LiteratureEvidence),
    Gwas(GwasEvidence),
}

/// Outcome of one Source Adapter invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult {
    pub source: String,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<SourcePayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResult {
    pub fn ok(source: &str, payload: SourcePayload) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Ok,
            payload: Some(payload),
            error: None,
        }
    }

    /// Usable payload with a note on what is missing.
    pub fn partial(source: &str, payload: SourcePayload, detail: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Partial,
            payload: Some(payload),
            error: Some(detail.into()),
        }
    }

    pub fn unavailable(source: &str, error: impl Into<String>) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Unavailable,
            payload: None,
            error: Some(error.into()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status != SourceStatus::Unavailable
    }
}

/// All source results of one analysis, keyed by provider name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub sources: BTreeMap<String, SourceResult>,
}

impl EvidenceBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a result, replacing any earlier result for the same provider.
    pub fn insert(&mut self, result: SourceResult) {
        self.sources.insert(result.source.clone(), result);
    }

    pub fn get(&self, source: &str) -> Option<&SourceResult> {
        self.sources.get(source)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.keys().map(String::as_str).collect()
    }

    pub fn count(&self, status: SourceStatus) -> usize {
        self.sources.values().filter(|r| r.status == status).count()
    }

    pub fn usable_count(&self) -> usize {
        self.sources.values().filter(|r| r.is_usable()).count()
    }
}

/// Strength-of-correlation label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Strong,
    Moderate,
    Weak,
    NoEvidence,
    Inconclusive,
}

impl Verdict {
    pub const ALL: [Verdict; 5] = [
        Verdict::Strong,
        Verdict::Moderate,
        Verdict::Weak,
        Verdict::NoEvidence,
        Verdict::Inconclusive,
    ];

    /// Lenient label parsing used by the fallback tier.
    pub fn parse_lenient(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match normalized.as_str() {
            "strong" => Some(Verdict::Strong),
            "moderate" => Some(Verdict::Moderate),
            "weak" => Some(Verdict::Weak),
            "no_evidence" | "none" => Some(Verdict::NoEvidence),
            "inconclusive" => Some(Verdict::Inconclusive),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Strong => write!(f, "strong"),
            Verdict::Moderate => write!(f, "moderate"),
            Verdict::Weak => write!(f, "weak"),
            Verdict::NoEvidence => write!(f, "no_evidence"),
            Verdict::Inconclusive => write!(f, "inconclusive"),
        }
    }
}

/// One supporting statement of the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPoint {
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

/// Whether a named line of evidence supports the association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceDriver {
    pub present: bool,
    pub summary: String,
}

/// Which validation tier produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseTier {
    Strict,
    Fallback,
}

/// Structured verdict rendered by the LLM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmVerdict {
    pub verdict: Verdict,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub key_points: Vec<KeyPoint>,
    pub drivers: BTreeMap<String, EvidenceDriver>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recommended_next_steps: Vec<String>,
    pub tier: ParseTier,
    /// Provider text, kept when the fallback tier had to be used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl LlmVerdict {
    /// Safe defaults used when nothing can be recovered.
    pub fn inconclusive(raw: Option<String>) -> Self {
        Self {
            verdict: Verdict::Inconclusive,
            confidence: 0.0,
            key_points: Vec::new(),
            drivers: BTreeMap::new(),
            recommended_next_steps: Vec::new(),
            tier: ParseTier::Fallback,
            raw_response: raw,
        }
    }
}

/// Clamp a confidence into `[0, 1]`; non-finite values become 0.
pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Pending,
    Resolving,
    CollectingEvidence,
    Analyzing,
    Completed,
    Failed,
}

impl PipelineStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStatus::Completed | PipelineStatus::Failed)
    }

    /// Position in the forward order; `Failed` sorts last.
    pub fn ordinal(&self) -> u8 {
        match self {
            PipelineStatus::Pending => 0,
            PipelineStatus::Resolving => 1,
            PipelineStatus::CollectingEvidence => 2,
            PipelineStatus::Analyzing => 3,
            PipelineStatus::Completed => 4,
            PipelineStatus::Failed => 5,
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PipelineStatus::Pending => "pending",
            PipelineStatus::Resolving => "resolving",
            PipelineStatus::CollectingEvidence => "collecting_evidence",
            PipelineStatus::Analyzing => "analyzing",
            PipelineStatus::Completed => "completed",
            PipelineStatus::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Terminal artifact of one analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: Uuid,
    pub request: AnalysisRequest,
    pub gene: ResolvedEntity,
    pub disease: ResolvedEntity,
    pub evidence: EvidenceBundle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<LlmVerdict>,
    pub status: PipelineStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn duration_seconds(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Source counts by status, for summaries.
    pub fn source_summary(&self) -> HashMap<SourceStatus, usize> {
        let mut counts = HashMap::new();
        for result in self.evidence.sources.values() {
            *counts.entry(result.status).or_insert(0) += 1;
        }
        counts
    }
}

/// Transient notification of a pipeline transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub analysis_id: Uuid,
    pub status: PipelineStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
