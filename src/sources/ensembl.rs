//! Ensembl REST gene lookup.

use super::{Fetched, HttpSource, SourceAdapter, ENSEMBL};
use crate::error::FetchError;
use crate::models::{AnalysisRequest, GeneRecord, ResolvedEntity, SourcePayload};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;

pub const DEFAULT_URL: &str = "https://rest.ensembl.org";

#[derive(Debug, Deserialize)]
struct LookupResponse {
    id: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    synonyms: Vec<String>,
}

/// Whether `term` is already an Ensembl gene id (`ENSG…`, optionally versioned).
pub fn is_gene_id(term: &str) -> bool {
    let Some(rest) = term.strip_prefix("ENSG") else {
        return false;
    };
    let digits = rest.split('.').next().unwrap_or_default();
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

/// Gene symbol / identifier lookup against Ensembl.
pub struct EnsemblClient {
    http: HttpSource,
    policy: RetryPolicy,
}

impl EnsemblClient {
    pub fn new(http: HttpSource, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    /// Single lookup attempt by symbol or by `ENSG` identifier.
    pub async fn lookup(&self, term: &str) -> Result<GeneRecord, FetchError> {
        let term = term.trim();
        let path = if is_gene_id(term) {
            format!("lookup/id/{}", term)
        } else {
            format!("lookup/symbol/homo_sapiens/{}", term)
        };

        let response: LookupResponse = self
            .http
            .get_json(&path, &[("content-type", "application/json".to_string())])
            .await
            .map_err(|err| match err {
                // Ensembl answers 400 for unknown symbols
                FetchError::Status { status: 400, body } => FetchError::NotFound(body),
                other => other,
            })?;

        let id = response
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| FetchError::Decode(format!("no gene id in lookup for '{}'", term)))?;
        let display_name = response.display_name.unwrap_or_else(|| term.to_string());

        Ok(GeneRecord {
            id,
            display_name,
            synonyms: response.synonyms,
        })
    }

    /// Lookup with this client's retry policy.
    pub async fn lookup_with_retry(&self, term: &str) -> Result<GeneRecord, FetchError> {
        self.policy.run(ENSEMBL, || self.lookup(term)).await
    }
}

#[async_trait]
impl SourceAdapter for EnsemblClient {
    fn name(&self) -> &'static str {
        ENSEMBL
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn query(
        &self,
        gene: &ResolvedEntity,
        _disease: &ResolvedEntity,
        _request: &AnalysisRequest,
    ) -> Result<Fetched, FetchError> {
        let term = gene.canonical_id().unwrap_or(&gene.raw);
        let record = self.lookup(term).await?;
        Ok(Fetched::complete(SourcePayload::Gene(record)))
    }
}
