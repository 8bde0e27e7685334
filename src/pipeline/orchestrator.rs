//! Per-analysis state machine.

use super::progress::ProgressSink;
use crate::analysis::{CorrelationAnalyzer, EvidenceAggregator};
use crate::config::Config;
use crate::error::{panic_message, LlmError, PipelineError};
use crate::llm::{build_providers, ProviderRegistry};
use crate::models::{
    AnalysisRequest, AnalysisResult, EntityKind, EvidenceBundle, LlmVerdict, PipelineStatus,
    ProgressEvent, ProviderKind, ResolvedEntity,
};
use crate::resolver::EntityResolver;
use crate::sources::{
    EnsemblClient, EuropePmcClient, GwasCatalogClient, HttpSource, OlsClient, OpenTargetsClient,
    SourceAdapter,
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Cooperative cancellation flag, checked between phases.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything one analysis has produced so far.
struct RunState {
    id: Uuid,
    request: AnalysisRequest,
    status: PipelineStatus,
    gene: Option<ResolvedEntity>,
    disease: Option<ResolvedEntity>,
    evidence: Option<EvidenceBundle>,
    verdict: Option<LlmVerdict>,
}

impl RunState {
    fn new(request: AnalysisRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            request,
            status: PipelineStatus::Pending,
            gene: None,
            disease: None,
            evidence: None,
            verdict: None,
        }
    }

    fn advance(&mut self, sink: &dyn ProgressSink, status: PipelineStatus, message: impl Into<String>) {
        let message = message.into();
        debug!("{}: {} -> {}", self.id, self.status, status);
        self.status = status;
        sink.on_progress(ProgressEvent {
            analysis_id: self.id,
            status,
            message,
            timestamp: Utc::now(),
        });
    }

    fn finish(self, started_at: DateTime<Utc>, error: Option<PipelineError>) -> AnalysisResult {
        let gene = self
            .gene
            .unwrap_or_else(|| ResolvedEntity::unresolved(EntityKind::Gene, &self.request.gene));
        let disease = self
            .disease
            .unwrap_or_else(|| ResolvedEntity::unresolved(EntityKind::Disease, &self.request.disease));

        AnalysisResult {
            analysis_id: self.id,
            request: self.request,
            gene,
            disease,
            evidence: self.evidence.unwrap_or_default(),
            verdict: self.verdict,
            status: self.status,
            error: error.map(|e| e.to_string()),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

fn checkpoint(cancel: &CancelHandle, next: PipelineStatus) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled(next.to_string()))
    } else {
        Ok(())
    }
}

/// Runs analyses. Holds no per-analysis state, so one instance can serve
/// many concurrent requests.
pub struct Pipeline {
    resolver: EntityResolver,
    aggregator: EvidenceAggregator,
    providers: ProviderRegistry,
    overall_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        resolver: EntityResolver,
        aggregator: EvidenceAggregator,
        providers: ProviderRegistry,
        overall_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            aggregator,
            providers,
            overall_timeout,
        }
    }

    /// Wire the resolver, the five evidence adapters and the LLM providers
    /// from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = HttpSource::default_client().context("Failed to build HTTP client")?;
        let policy = config.retry.policy();
        let sources = &config.sources;
        let http = |url: &String| HttpSource::new(client.clone(), url);

        let ensembl = Arc::new(EnsemblClient::new(http(&sources.ensembl_url), policy.clone()));
        let ols = Arc::new(OlsClient::new(http(&sources.ols_url), policy.clone()));
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            ensembl.clone(),
            ols.clone(),
            Arc::new(
                OpenTargetsClient::new(http(&sources.opentargets_url), policy.clone())
                    .with_paging(sources.opentargets_page_size, sources.opentargets_max_pages),
            ),
            Arc::new(EuropePmcClient::new(http(&sources.europe_pmc_url), policy.clone())),
            Arc::new(
                GwasCatalogClient::new(http(&sources.gwas_url), policy)
                    .with_max_records(sources.gwas_max_records),
            ),
        ];

        Ok(Self::new(
            EntityResolver::new(ensembl, ols),
            EvidenceAggregator::new(adapters, config.collection_deadline()),
            build_providers(&config.llm, &config.retry, &client),
            config.overall_timeout(),
        ))
    }

    /// Provider families with credentials.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.to_string());
        kinds
    }

    /// Run one analysis to a terminal state.
    ///
    /// Never panics and never returns an error: every failure ends up in the
    /// result as `failed` with a message, alongside whatever the earlier
    /// phases produced.
    pub async fn run(
        &self,
        request: AnalysisRequest,
        sink: &dyn ProgressSink,
        cancel: &CancelHandle,
    ) -> AnalysisResult {
        let started_at = Utc::now();
        let mut state = RunState::new(request);
        info!(
            "Analysis {} started: {} / {}",
            state.id, state.request.gene, state.request.disease
        );

        let outcome = tokio::time::timeout(
            self.overall_timeout,
            AssertUnwindSafe(self.execute(&mut state, sink, cancel)).catch_unwind(),
        )
        .await;

        let failure = match outcome {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(err))) => Some(err),
            Ok(Err(panic)) => Some(PipelineError::Internal(panic_message(panic.as_ref()))),
            Err(_) => Some(PipelineError::Timeout(self.overall_timeout)),
        };

        match failure {
            None => {
                let message = match &state.verdict {
                    Some(v) => format!("Verdict: {} (confidence {:.2})", v.verdict, v.confidence),
                    None => "Evidence collected; no LLM verdict requested".to_string(),
                };
                info!("Analysis {} completed", state.id);
                state.advance(sink, PipelineStatus::Completed, message);
                state.finish(started_at, None)
            }
            Some(err) => {
                error!("Analysis {} failed during {}: {}", state.id, state.status, err);
                state.advance(sink, PipelineStatus::Failed, err.to_string());
                state.finish(started_at, Some(err))
            }
        }
    }

    async fn execute(
        &self,
        state: &mut RunState,
        sink: &dyn ProgressSink,
        cancel: &CancelHandle,
    ) -> Result<(), PipelineError> {
        checkpoint(cancel, PipelineStatus::Resolving)?;
        let message = format!(
            "Resolving gene '{}' and disease '{}'",
            state.request.gene, state.request.disease
        );
        state.advance(sink, PipelineStatus::Resolving, message);

        let (gene, disease) = self
            .resolver
            .resolve(&state.request.gene, &state.request.disease)
            .await;
        state.gene = Some(gene.clone());
        state.disease = Some(disease.clone());

        checkpoint(cancel, PipelineStatus::CollectingEvidence)?;
        let message = format!(
            "Collecting evidence for {} / {} from {} source(s)",
            gene.identifier,
            disease.identifier,
            self.aggregator.enabled_sources(&state.request).len()
        );
        state.advance(sink, PipelineStatus::CollectingEvidence, message);

        let bundle = self.aggregator.collect(&gene, &disease, &state.request).await;
        state.evidence = Some(bundle.clone());

        let Some(selection) = state.request.llm.clone() else {
            info!("No LLM selected, skipping analysis");
            return Ok(());
        };

        checkpoint(cancel, PipelineStatus::Analyzing)?;
        let message = format!(
            "Analyzing {} usable source(s) with {} ({})",
            bundle.usable_count(),
            selection.provider,
            selection.model
        );
        state.advance(sink, PipelineStatus::Analyzing, message);

        let provider = self
            .providers
            .get(&selection.provider)
            .cloned()
            .ok_or_else(|| LlmError::MissingApiKey(selection.provider.to_string()))?;
        let analyzer = CorrelationAnalyzer::new(provider, selection.model);
        let verdict = analyzer
            .analyze(&gene, &disease, &bundle, &state.request)
            .await?;
        state.verdict = Some(verdict);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmProvider, OpenAiProvider, VerdictPrompt};
    use crate::models::{ResolutionStatus, SourcePayload, SourceStatus, Verdict};
    use crate::pipeline::ChannelSink;
    use crate::sources::{EUROPE_PMC, GWAS_CATALOG, OPEN_TARGETS};
    use crate::testing::{
        components, fast_policy, gwas_body, literature_body, mount_all, mount_association,
        mount_disease, mount_gene, mount_gwas, mount_literature, mount_unknown_disease,
        pipeline_for, registry_with, StaticProvider, STRONG_VERDICT,
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request_with_llm() -> AnalysisRequest {
        AnalysisRequest::new("TP53", "lung cancer").with_llm(ProviderKind::OpenAi, "gpt-4o-mini")
    }

    async fn run_collecting(
        pipeline: &Pipeline,
        request: AnalysisRequest,
    ) -> (AnalysisResult, Vec<ProgressEvent>) {
        let (sink, mut rx) = ChannelSink::new();
        let result = pipeline.run(request, &sink, &CancelHandle::new()).await;
        drop(sink);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }

    fn statuses(events: &[ProgressEvent]) -> Vec<PipelineStatus> {
        events.iter().map(|e| e.status).collect()
    }

    #[tokio::test]
    async fn test_all_sources_succeed() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_for(
            &server,
            registry_with(StaticProvider::responding(ProviderKind::OpenAi, STRONG_VERDICT)),
        );

        let (result, events) = run_collecting(&pipeline, request_with_llm()).await;

        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.error, None);
        assert_eq!(result.evidence.len(), 5);
        assert_eq!(result.evidence.count(SourceStatus::Ok), 5);
        assert_eq!(result.gene.identifier, "ENSG00000141510");
        assert_eq!(result.disease.identifier, "EFO_0001071");

        let Some(SourcePayload::Association(association)) =
            &result.evidence.get(OPEN_TARGETS).unwrap().payload
        else {
            panic!("expected association payload");
        };
        assert_eq!(association.association.as_ref().unwrap().overall, 0.82);

        let verdict = result.verdict.unwrap();
        assert!(Verdict::ALL.contains(&verdict.verdict));
        assert_eq!(verdict.verdict, Verdict::Strong);

        assert_eq!(
            statuses(&events),
            vec![
                PipelineStatus::Resolving,
                PipelineStatus::CollectingEvidence,
                PipelineStatus::Analyzing,
                PipelineStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_tagged() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_for(
            &server,
            registry_with(StaticProvider::responding(ProviderKind::OpenAi, "not json")),
        );

        let (result, events) = run_collecting(&pipeline, request_with_llm()).await;

        assert!(events.iter().all(|e| e.analysis_id == result.analysis_id));
        assert!(events.iter().all(|e| !e.message.is_empty()));
        assert!(events
            .windows(2)
            .all(|w| w[0].status.ordinal() < w[1].status.ordinal() && w[0].timestamp <= w[1].timestamp));
        assert_eq!(events.last().unwrap().status, result.status);
    }

    #[tokio::test]
    async fn test_slow_sources_degrade_without_failing() {
        let server = MockServer::start().await;
        mount_gene(&server).await;
        mount_disease(&server).await;
        mount_association(&server, 0.82).await;
        let slow = Duration::from_millis(500);
        Mock::given(method("GET"))
            .and(path("/europepmc/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(literature_body()).set_delay(slow))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gwas/associations/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(gwas_body()).set_delay(slow))
            .mount(&server)
            .await;
        let pipeline = pipeline_for(
            &server,
            registry_with(StaticProvider::responding(ProviderKind::OpenAi, STRONG_VERDICT)),
        );

        let (result, _) = run_collecting(&pipeline, request_with_llm()).await;

        assert_eq!(result.status, PipelineStatus::Completed);
        let status = |name: &str| result.evidence.get(name).unwrap().status;
        assert_eq!(status(EUROPE_PMC), SourceStatus::Unavailable);
        assert_eq!(status(GWAS_CATALOG), SourceStatus::Unavailable);
        assert_eq!(status(OPEN_TARGETS), SourceStatus::Ok);
        assert!(result.evidence.get(EUROPE_PMC).unwrap().error.as_ref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_authentication_error_fails_but_keeps_evidence() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        Mock::given(method("POST"))
            .and(path("/openai/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": {"message": "Incorrect API key provided"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut providers = ProviderRegistry::new();
        providers.insert(
            ProviderKind::OpenAi,
            Arc::new(OpenAiProvider::new(
                reqwest::Client::new(),
                format!("{}/openai", server.uri()),
                "sk-invalid",
                fast_policy(),
            )),
        );
        let pipeline = pipeline_for(&server, providers);

        let (result, events) = run_collecting(&pipeline, request_with_llm()).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        let message = result.error.unwrap();
        assert!(message.contains("authentication failed"), "{}", message);
        assert!(message.contains("Invalid OpenAI API key"), "{}", message);
        assert_eq!(result.evidence.len(), 5);
        assert!(result.verdict.is_none());
        assert_eq!(
            statuses(&events)[2..],
            [PipelineStatus::Analyzing, PipelineStatus::Failed]
        );
    }

    #[tokio::test]
    async fn test_unresolvable_disease_still_completes() {
        let server = MockServer::start().await;
        mount_gene(&server).await;
        mount_unknown_disease(&server).await;
        mount_association(&server, 0.82).await;
        mount_literature(&server).await;
        mount_gwas(&server).await;
        let pipeline = pipeline_for(
            &server,
            registry_with(StaticProvider::responding(ProviderKind::OpenAi, STRONG_VERDICT)),
        );

        let request = AnalysisRequest::new("TP53", "xyzzy syndrome")
            .with_llm(ProviderKind::OpenAi, "gpt-4o-mini");
        let (result, events) = run_collecting(&pipeline, request).await;

        assert_eq!(result.disease.status, ResolutionStatus::Unresolved);
        assert_eq!(result.disease.identifier, "xyzzy syndrome");
        assert!(statuses(&events).contains(&PipelineStatus::CollectingEvidence));
        assert_eq!(result.status, PipelineStatus::Completed);
        // association lookup needs a canonical disease id
        assert_eq!(
            result.evidence.get(OPEN_TARGETS).unwrap().status,
            SourceStatus::Unavailable
        );
    }

    #[tokio::test]
    async fn test_every_source_down_still_completes() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let provider = StaticProvider::responding(
            ProviderKind::Anthropic,
            r#"{"verdict": "inconclusive", "confidence": 0.1, "key_points": [], "drivers": {}}"#,
        );
        let pipeline = pipeline_for(&server, registry_with(provider));

        let request = AnalysisRequest::new("TP53", "lung cancer")
            .with_llm(ProviderKind::Anthropic, "claude-3-haiku-20240307");
        let (result, _) = run_collecting(&pipeline, request).await;

        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.evidence.count(SourceStatus::Unavailable), 5);
        assert_eq!(result.verdict.unwrap().verdict, Verdict::Inconclusive);
    }

    #[tokio::test]
    async fn test_skipped_llm_completes_without_verdict() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_for(&server, ProviderRegistry::new());

        let (result, events) =
            run_collecting(&pipeline, AnalysisRequest::new("TP53", "lung cancer")).await;

        assert_eq!(result.status, PipelineStatus::Completed);
        assert!(result.verdict.is_none());
        assert_eq!(
            statuses(&events),
            vec![
                PipelineStatus::Resolving,
                PipelineStatus::CollectingEvidence,
                PipelineStatus::Completed,
            ]
        );
    }

    #[tokio::test]
    async fn test_disabled_gwas_has_no_bundle_entry() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_for(&server, ProviderRegistry::new());

        let mut request = AnalysisRequest::new("TP53", "lung cancer");
        request.include_gwas = false;
        let (result, _) = run_collecting(&pipeline, request).await;

        assert_eq!(result.evidence.len(), 4);
        assert!(result.evidence.get(GWAS_CATALOG).is_none());
    }

    #[tokio::test]
    async fn test_missing_provider_credentials_fail_analysis() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_for(&server, ProviderRegistry::new());

        let request = AnalysisRequest::new("TP53", "lung cancer")
            .with_llm(ProviderKind::Anthropic, "claude-3-haiku-20240307");
        let (result, events) = run_collecting(&pipeline, request).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.error.unwrap().contains("missing API key for anthropic"));
        assert_eq!(result.evidence.len(), 5);
        assert_eq!(statuses(&events).last(), Some(&PipelineStatus::Failed));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let server = MockServer::start().await;
        let pipeline = pipeline_for(&server, ProviderRegistry::new());
        let cancel = CancelHandle::new();
        cancel.cancel();

        let (sink, mut rx) = ChannelSink::new();
        let result = pipeline
            .run(AnalysisRequest::new("TP53", "lung cancer"), &sink, &cancel)
            .await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("analysis cancelled before resolving"));
        assert_eq!(result.gene.identifier, "TP53");
        assert!(result.evidence.is_empty());
        assert_eq!(rx.recv().await.unwrap().status, PipelineStatus::Failed);
    }

    /// Cancels as soon as it sees the given status.
    struct CancellingSink {
        at: PipelineStatus,
        cancel: CancelHandle,
        seen: Mutex<Vec<PipelineStatus>>,
    }

    impl ProgressSink for CancellingSink {
        fn on_progress(&self, event: ProgressEvent) {
            if event.status == self.at {
                self.cancel.cancel();
            }
            self.seen.lock().unwrap().push(event.status);
        }
    }

    #[tokio::test]
    async fn test_cancellation_between_phases_keeps_collected_evidence() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let provider = Arc::new(StaticProvider::responding(ProviderKind::OpenAi, STRONG_VERDICT));
        let mut providers = ProviderRegistry::new();
        providers.insert(ProviderKind::OpenAi, provider.clone());
        let pipeline = pipeline_for(&server, providers);

        let cancel = CancelHandle::new();
        let sink = CancellingSink {
            at: PipelineStatus::CollectingEvidence,
            cancel: cancel.clone(),
            seen: Mutex::new(Vec::new()),
        };
        let result = pipeline.run(request_with_llm(), &sink, &cancel).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("analysis cancelled before analyzing"));
        // the running phase finishes before the signal is honoured
        assert_eq!(result.evidence.len(), 5);
        assert_eq!(provider.calls(), 0);
        assert_eq!(
            *sink.seen.lock().unwrap(),
            vec![
                PipelineStatus::Resolving,
                PipelineStatus::CollectingEvidence,
                PipelineStatus::Failed,
            ]
        );
    }

    struct HangingProvider;

    #[async_trait]
    impl LlmProvider for HangingProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn enforces_schema(&self) -> bool {
            true
        }

        async fn generate_verdict(&self, _prompt: &VerdictPrompt, _model: &str) -> Result<String, LlmError> {
            futures::future::pending().await
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl LlmProvider for PanickingProvider {
        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn enforces_schema(&self) -> bool {
            true
        }

        async fn generate_verdict(&self, _prompt: &VerdictPrompt, _model: &str) -> Result<String, LlmError> {
            panic!("provider exploded")
        }
    }

    fn pipeline_with(server: &MockServer, provider: Arc<dyn LlmProvider>, overall: Duration) -> Pipeline {
        let (resolver, aggregator) = components(server, Duration::from_secs(5));
        let mut providers = ProviderRegistry::new();
        providers.insert(ProviderKind::OpenAi, provider);
        Pipeline::new(resolver, aggregator, providers, overall)
    }

    #[tokio::test]
    async fn test_overall_timeout_fails_regardless_of_phase() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_with(&server, Arc::new(HangingProvider), Duration::from_secs(2));

        let started = std::time::Instant::now();
        let (result, events) = run_collecting(&pipeline, request_with_llm()).await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(result.status, PipelineStatus::Failed);
        assert!(result.error.unwrap().contains("timed out"));
        assert_eq!(result.evidence.len(), 5);
        assert_eq!(statuses(&events).last(), Some(&PipelineStatus::Failed));
    }

    #[tokio::test]
    async fn test_panic_is_caught_as_internal_error() {
        let server = MockServer::start().await;
        mount_all(&server).await;
        let pipeline = pipeline_with(&server, Arc::new(PanickingProvider), Duration::from_secs(30));

        let (result, _) = run_collecting(&pipeline, request_with_llm()).await;

        assert_eq!(result.status, PipelineStatus::Failed);
        let message = result.error.unwrap();
        assert!(message.starts_with("internal pipeline error"));
        assert!(message.contains("provider exploded"));
        assert_eq!(result.evidence.len(), 5);
    }

    #[tokio::test]
    async fn test_from_config_wires_every_source() {
        let server = MockServer::start().await;
        mount_all(&server).await;

        let mut config = Config::default();
        config.sources.ensembl_url = format!("{}/ensembl", server.uri());
        config.sources.ols_url = format!("{}/ols", server.uri());
        config.sources.opentargets_url = format!("{}/opentargets", server.uri());
        config.sources.europe_pmc_url = format!("{}/europepmc", server.uri());
        config.sources.gwas_url = format!("{}/gwas", server.uri());
        let pipeline = Pipeline::from_config(&config).unwrap();

        let (result, _) = run_collecting(&pipeline, config.request("TP53", "lung cancer", false)).await;

        assert_eq!(result.status, PipelineStatus::Completed);
        assert_eq!(result.evidence.count(SourceStatus::Ok), 5);
    }
}
