//! EBI Ontology Lookup Service (OLS4) disease search.

use super::{Fetched, HttpSource, SourceAdapter, OLS};
use crate::error::FetchError;
use crate::models::{dedup_terms, AnalysisRequest, DiseaseConcept, ResolvedEntity, SourcePayload};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::Value;

pub const DEFAULT_URL: &str = "https://www.ebi.ac.uk/ols4/api";

const SEARCH_ROWS: usize = 25;
const ONTOLOGY_PREFIXES: [&str; 4] = ["EFO_", "MONDO_", "Orphanet_", "HP_"];

/// Normalize `MONDO:0005148`-style ids to the underscore form.
pub fn normalize_ontology_id(term: &str) -> String {
    term.trim().replacen(':', "_", 1)
}

/// Whether `term` already is an ontology identifier.
pub fn is_ontology_id(term: &str) -> bool {
    let normalized = normalize_ontology_id(term);
    ONTOLOGY_PREFIXES.iter().any(|prefix| {
        normalized
            .strip_prefix(prefix)
            .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or(false)
    })
}

/// One ontology term from a search response.
#[derive(Debug, Clone, PartialEq)]
struct Term {
    ontology: String,
    id: String,
    label: String,
    synonyms: Vec<String>,
}

fn str_field<'a>(doc: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| doc.get(*k).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn parse_term(doc: &Value) -> Option<Term> {
    let ontology = str_field(doc, &["ontology_name", "ontology_prefix", "ontology"])?.to_lowercase();
    let raw_id = str_field(doc, &["short_form", "obo_id"])?;
    let raw_id = raw_id.rsplit('/').next().unwrap_or(raw_id);
    let label = str_field(doc, &["label", "name"]).unwrap_or_default().to_string();

    let synonyms = ["synonym", "synonyms"]
        .iter()
        .filter_map(|k| doc.get(*k).and_then(Value::as_array))
        .flatten()
        .filter_map(Value::as_str)
        .map(String::from)
        .collect();

    Some(Term {
        id: canonical_id(&ontology, raw_id),
        ontology,
        label,
        synonyms,
    })
}

fn canonical_id(ontology: &str, raw_id: &str) -> String {
    let normalized = normalize_ontology_id(raw_id);
    if ontology.starts_with("efo") && !normalized.contains('_') {
        format!("EFO_{}", normalized)
    } else if ontology.starts_with("mondo") && !normalized.starts_with("MONDO") {
        format!("MONDO_{}", normalized)
    } else {
        normalized
    }
}

fn search_docs(body: &Value) -> Vec<Value> {
    body.pointer("/response/docs")
        .or_else(|| body.pointer("/_embedded/terms"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

/// Pick the best concept: first EFO term, else first MONDO term.
///
/// When `wanted_id` is given only the term with that identifier qualifies.
fn select_concept(docs: &[Value], label: &str, wanted_id: Option<&str>) -> Option<DiseaseConcept> {
    let terms: Vec<Term> = docs
        .iter()
        .filter_map(parse_term)
        .filter(|t| wanted_id.map(|w| t.id == w).unwrap_or(true))
        .collect();

    let efo = terms.iter().find(|t| t.ontology.starts_with("efo"));
    let mondo = terms.iter().find(|t| t.ontology.starts_with("mondo"));
    let best = efo.or(mondo).or_else(|| {
        if wanted_id.is_some() {
            terms.first()
        } else {
            None
        }
    })?;

    let mut synonyms: Vec<String> = Vec::new();
    synonyms.extend(efo.map(|t| t.synonyms.clone()).unwrap_or_default());
    synonyms.extend(mondo.map(|t| t.synonyms.clone()).unwrap_or_default());
    synonyms.push(label.to_string());

    let mondo_id = mondo.filter(|m| m.id != best.id).map(|m| m.id.clone());

    Some(DiseaseConcept {
        id: best.id.clone(),
        label: best.label.clone(),
        synonyms: dedup_terms(synonyms),
        mondo_id,
    })
}

/// Disease label search against OLS.
pub struct OlsClient {
    http: HttpSource,
    policy: RetryPolicy,
}

impl OlsClient {
    pub fn new(http: HttpSource, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    /// Single search attempt for a disease label or ontology id.
    pub async fn search(&self, term: &str) -> Result<DiseaseConcept, FetchError> {
        let term = term.trim();
        let wanted = is_ontology_id(term).then(|| normalize_ontology_id(term));

        let params = [
            ("q", term.to_string()),
            ("ontology", "efo,mondo".to_string()),
            ("type", "class".to_string()),
            ("rows", SEARCH_ROWS.to_string()),
            ("exact", "false".to_string()),
        ];
        let body: Value = self.http.get_json("search", &params).await?;
        let docs = search_docs(&body);

        select_concept(&docs, term, wanted.as_deref())
            .ok_or_else(|| FetchError::NotFound(format!("no EFO/MONDO concept for '{}'", term)))
    }

    /// Search with this client's retry policy.
    pub async fn search_with_retry(&self, term: &str) -> Result<DiseaseConcept, FetchError> {
        self.policy.run(OLS, || self.search(term)).await
    }
}

#[async_trait]
impl SourceAdapter for OlsClient {
    fn name(&self) -> &'static str {
        OLS
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn query(
        &self,
        _gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        _request: &AnalysisRequest,
    ) -> Result<Fetched, FetchError> {
        let term = disease.canonical_id().unwrap_or(&disease.raw);
        let concept = self.search(term).await?;
        Ok(Fetched::complete(SourcePayload::Disease(concept)))
    }
}
