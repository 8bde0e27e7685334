//! Evidence and resolution providers.
//!
//! Every provider sits behind [`SourceAdapter`]. Implementors only write a
//! single-attempt [`SourceAdapter::query`]; the provided
//! [`SourceAdapter::fetch`] applies the adapter's retry policy and turns
//! every outcome into a [`SourceResult`], so nothing escapes the adapter
//! boundary as an error.

pub mod ensembl;
pub mod europe_pmc;
pub mod gwas;
pub mod http;
pub mod ols;
pub mod opentargets;

use crate::error::FetchError;
use crate::models::{AnalysisRequest, ResolvedEntity, SourcePayload, SourceResult};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use tracing::{debug, warn};

pub use ensembl::EnsemblClient;
pub use europe_pmc::EuropePmcClient;
pub use gwas::GwasCatalogClient;
pub use http::HttpSource;
pub use ols::OlsClient;
pub use opentargets::OpenTargetsClient;

/// Bundle key of the gene resolution provider.
pub const ENSEMBL: &str = "ensembl";
/// Bundle key of the disease ontology provider.
pub const OLS: &str = "ols";
/// Bundle key of the association-score provider.
pub const OPEN_TARGETS: &str = "opentargets";
/// Bundle key of the literature provider.
pub const EUROPE_PMC: &str = "europe_pmc";
/// Bundle key of the genetic-association provider.
pub const GWAS_CATALOG: &str = "gwas_catalog";

/// Payload of one successful query, optionally flagged as incomplete.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub payload: SourcePayload,
    /// Set when part of the data could not be retrieved.
    pub incomplete: Option<String>,
}

impl Fetched {
    pub fn complete(payload: SourcePayload) -> Self {
        Self {
            payload,
            incomplete: None,
        }
    }

    pub fn incomplete(payload: SourcePayload, detail: impl Into<String>) -> Self {
        Self {
            payload,
            incomplete: Some(detail.into()),
        }
    }
}

/// Uniform contract of one external evidence provider.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable key of this provider in the evidence bundle.
    fn name(&self) -> &'static str;

    fn retry_policy(&self) -> &RetryPolicy;

    /// Whether the request asks for this provider at all.
    fn is_enabled(&self, _request: &AnalysisRequest) -> bool {
        true
    }

    /// One attempt against the provider.
    async fn query(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        request: &AnalysisRequest,
    ) -> Result<Fetched, FetchError>;

    /// Query with retries; never fails.
    async fn fetch(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        request: &AnalysisRequest,
    ) -> SourceResult {
        let name = self.name();
        let outcome = self
            .retry_policy()
            .run(name, move || self.query(gene, disease, request))
            .await;

        match outcome {
            Ok(Fetched {
                payload,
                incomplete: None,
            }) => {
                debug!("{}: ok", name);
                SourceResult::ok(name, payload)
            }
            Ok(Fetched {
                payload,
                incomplete: Some(detail),
            }) => {
                warn!("{}: partial result ({})", name, detail);
                SourceResult::partial(name, payload, detail)
            }
            Err(err) => {
                warn!("{}: unavailable ({})", name, err);
                SourceResult::unavailable(name, err.to_string())
            }
        }
    }
}
