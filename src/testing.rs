//! Shared fixtures for unit tests: fast retry budgets, a scripted LLM
//! provider and canned provider payloads mounted on a `wiremock` server.

use crate::analysis::EvidenceAggregator;
use crate::error::LlmError;
use crate::llm::{LlmProvider, ProviderRegistry, VerdictPrompt};
use crate::models::{AnalysisRequest, EntityKind, EvidenceBundle, ProviderKind, ResolvedEntity};
use crate::pipeline::Pipeline;
use crate::resolver::EntityResolver;
use crate::retry::RetryPolicy;
use crate::sources::{
    EnsemblClient, EuropePmcClient, GwasCatalogClient, HttpSource, OlsClient, OpenTargetsClient,
    SourceAdapter,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Three attempts with millisecond delays and no jitter.
pub fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        jitter: 0.0,
        attempt_timeout: Duration::from_millis(200),
    }
}

pub fn sample_prompt() -> VerdictPrompt {
    let gene = ResolvedEntity::resolved(EntityKind::Gene, "TP53", "ENSG00000141510", "TP53", vec![]);
    let disease = ResolvedEntity::resolved(
        EntityKind::Disease,
        "lung cancer",
        "EFO_0001071",
        "lung carcinoma",
        vec!["lung cancer".to_string()],
    );
    VerdictPrompt::build(
        &gene,
        &disease,
        &EvidenceBundle::new(),
        &AnalysisRequest::new("TP53", "lung cancer"),
    )
}

/// LLM provider that answers every prompt with the same scripted reply.
pub struct StaticProvider {
    kind: ProviderKind,
    reply: Result<String, LlmError>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn responding(kind: ProviderKind, text: &str) -> Self {
        Self {
            kind,
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: ProviderKind, error: LlmError) -> Self {
        Self {
            kind,
            reply: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for StaticProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn enforces_schema(&self) -> bool {
        self.kind == ProviderKind::OpenAi
    }

    async fn generate_verdict(&self, _prompt: &VerdictPrompt, _model: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

/// A well-formed strict-tier answer.
pub const STRONG_VERDICT: &str = r#"{
  "verdict": "strong",
  "confidence": 0.87,
  "key_points": [
    {"statement": "TP53 loss promotes lung cancer", "citation": "europe_pmc:111"},
    {"statement": "Genome-wide significant locus", "citation": "gwas_catalog:2999"}
  ],
  "drivers": {
    "genetic": {"present": true, "summary": "GWAS hit at p=3e-10"},
    "functional": {"present": true, "summary": "Open Targets score 0.82"},
    "literature": {"present": true, "summary": "Consistent reports"}
  },
  "recommended_next_steps": ["Replicate in an independent cohort"]
}"#;

pub fn registry_with(provider: StaticProvider) -> ProviderRegistry {
    let mut providers = ProviderRegistry::new();
    let kind = provider.kind;
    providers.insert(kind, Arc::new(provider) as Arc<dyn LlmProvider>);
    providers
}

// Canned payloads. Every provider lives under its own prefix on one server.

pub async fn mount_gene(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex("^/ensembl/lookup/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "ENSG00000141510",
            "display_name": "TP53",
            "synonyms": ["P53", "LFS1"]
        })))
        .mount(server)
        .await;
}

pub async fn mount_disease(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ols/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"docs": [{
                "ontology_name": "efo",
                "short_form": "EFO_0001071",
                "label": "lung carcinoma",
                "synonym": ["lung cancer"]
            }]}
        })))
        .mount(server)
        .await;
}

pub async fn mount_unknown_disease(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/ols/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"docs": []}})))
        .mount(server)
        .await;
}

pub async fn mount_association(server: &MockServer, score: f64) {
    Mock::given(method("POST"))
        .and(path("/opentargets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"disease": {
            "id": "EFO_0001071",
            "name": "lung carcinoma",
            "associatedTargets": {"count": 1, "rows": [{
                "score": score,
                "target": {"id": "ENSG00000141510", "approvedSymbol": "TP53"},
                "datatypeScores": [
                    {"id": "genetic_association", "score": 0.71},
                    {"id": "somatic_mutation", "score": 0.93}
                ]
            }]}
        }}})))
        .mount(server)
        .await;
}

pub fn literature_body() -> Value {
    json!({"resultList": {"result": [{
        "pmid": "111",
        "title": "TP53 mutations in lung cancer",
        "pubYear": "2021",
        "authorString": "Doe J, Roe R.",
        "source": "MED",
        "abstractText": "We find TP53 loss drives lung cancer progression. Unrelated closing remark."
    }]}})
}

pub async fn mount_literature(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/europepmc/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(literature_body()))
        .mount(server)
        .await;
}

pub fn gwas_body() -> Value {
    json!({"_embedded": {"associations": [{
        "pvalueMantissa": 3.0,
        "pvalueExponent": -10,
        "orPerCopyNum": 1.3,
        "pubmedId": "2999",
        "trait": [{"trait": "lung carcinoma"}],
        "studyAccession": "GCST000001",
        "loci": [{
            "authorReportedGenes": [{"geneName": "TP53"}],
            "strongestRiskAlleles": [{"riskAlleleName": "rs1042522-C"}]
        }],
        "_links": {"self": {"href": "https://www.ebi.ac.uk/gwas/rest/api/associations/1"}}
    }]}})
}

pub async fn mount_gwas(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/gwas/associations/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gwas_body()))
        .mount(server)
        .await;
}

/// Every provider answers successfully.
pub async fn mount_all(server: &MockServer) {
    mount_gene(server).await;
    mount_disease(server).await;
    mount_association(server, 0.82).await;
    mount_literature(server).await;
    mount_gwas(server).await;
}

/// Resolver plus the five adapters, wired against `server` with [`fast_policy`].
pub fn components(server: &MockServer, deadline: Duration) -> (EntityResolver, EvidenceAggregator) {
    let client = reqwest::Client::new();
    let source = |prefix: &str| HttpSource::new(client.clone(), format!("{}/{}", server.uri(), prefix));

    let ensembl = Arc::new(EnsemblClient::new(source("ensembl"), fast_policy()));
    let ols = Arc::new(OlsClient::new(source("ols"), fast_policy()));
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        ensembl.clone(),
        ols.clone(),
        Arc::new(OpenTargetsClient::new(source("opentargets"), fast_policy())),
        Arc::new(EuropePmcClient::new(source("europepmc"), fast_policy())),
        Arc::new(GwasCatalogClient::new(source("gwas"), fast_policy())),
    ];

    (
        EntityResolver::new(ensembl, ols),
        EvidenceAggregator::new(adapters, deadline),
    )
}

pub fn pipeline_for(server: &MockServer, providers: ProviderRegistry) -> Pipeline {
    let (resolver, aggregator) = components(server, Duration::from_secs(5));
    Pipeline::new(resolver, aggregator, providers, Duration::from_secs(30))
}
