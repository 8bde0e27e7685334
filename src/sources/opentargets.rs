//! Open Targets Platform association scores.
//!
//! The GraphQL API lists the targets associated with a disease page by page;
//! we scan the pages until the resolved gene shows up.

use super::{Fetched, HttpSource, SourceAdapter, OPEN_TARGETS};
use crate::error::FetchError;
use crate::models::{
    AnalysisRequest, AssociationEvidence, AssociationScore, ResolvedEntity, SourcePayload,
};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

pub const DEFAULT_URL: &str = "https://api.platform.opentargets.org/api/v4/graphql";

const ASSOCIATED_TARGETS_QUERY: &str = r#"
query DiseaseTargets($efoId: String!, $index: Int!, $size: Int!) {
  disease(efoId: $efoId) {
    id
    name
    associatedTargets(page: {index: $index, size: $size}) {
      count
      rows {
        score
        target { id approvedSymbol }
        datatypeScores { id score }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<GraphQlData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlData {
    disease: Option<Disease>,
}

#[derive(Debug, Deserialize)]
struct Disease {
    id: String,
    name: String,
    #[serde(rename = "associatedTargets")]
    associated_targets: AssociatedTargets,
}

#[derive(Debug, Deserialize)]
struct AssociatedTargets {
    count: usize,
    #[serde(default)]
    rows: Vec<AssociationRow>,
}

#[derive(Debug, Deserialize)]
struct AssociationRow {
    score: f64,
    target: Target,
    #[serde(rename = "datatypeScores", default)]
    datatype_scores: Vec<DatatypeScore>,
}

#[derive(Debug, Deserialize)]
struct Target {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DatatypeScore {
    id: String,
    score: f64,
}

/// Association-score provider.
pub struct OpenTargetsClient {
    http: HttpSource,
    policy: RetryPolicy,
    page_size: usize,
    max_pages: usize,
}

impl OpenTargetsClient {
    pub fn new(http: HttpSource, policy: RetryPolicy) -> Self {
        Self {
            http,
            policy,
            page_size: 50,
            max_pages: 20,
        }
    }

    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    async fn page(&self, disease_id: &str, index: usize) -> Result<Disease, FetchError> {
        let body = json!({
            "query": ASSOCIATED_TARGETS_QUERY,
            "variables": {"efoId": disease_id, "index": index, "size": self.page_size},
        });
        let response: GraphQlResponse = self.http.post_json("", &body).await?;

        if let Some(err) = response.errors.first() {
            return Err(FetchError::Decode(format!("GraphQL error: {}", err.message)));
        }
        response
            .data
            .and_then(|d| d.disease)
            .ok_or_else(|| FetchError::NotFound(format!("disease {} not in Open Targets", disease_id)))
    }

    /// Scan association pages for `gene_id`.
    ///
    /// A failure on the first page is an error; a failure on a later page
    /// returns what was scanned so far flagged as incomplete.
    pub async fn find_association(
        &self,
        gene_id: &str,
        disease_id: &str,
    ) -> Result<Fetched, FetchError> {
        let mut evidence = AssociationEvidence {
            association: None,
            pages_scanned: 0,
            total_targets: 0,
        };

        for index in 0..self.max_pages {
            let disease = match self.page(disease_id, index).await {
                Ok(disease) => disease,
                Err(err) if index == 0 => return Err(err),
                Err(err) => {
                    let detail = format!("stopped after {} page(s): {}", index, err);
                    return Ok(Fetched::incomplete(SourcePayload::Association(evidence), detail));
                }
            };

            evidence.pages_scanned += 1;
            evidence.total_targets = disease.associated_targets.count;

            if let Some(row) = disease
                .associated_targets
                .rows
                .into_iter()
                .find(|r| r.target.id == gene_id)
            {
                debug!("{} found on page {}", gene_id, index);
                evidence.association = Some(AssociationScore {
                    overall: row.score,
                    datatype_scores: row
                        .datatype_scores
                        .into_iter()
                        .map(|d| (d.id, d.score))
                        .collect::<BTreeMap<_, _>>(),
                    disease_id: disease.id,
                    disease_name: disease.name,
                    target_id: row.target.id,
                });
                return Ok(Fetched::complete(SourcePayload::Association(evidence)));
            }

            if (index + 1) * self.page_size >= evidence.total_targets {
                return Ok(Fetched::complete(SourcePayload::Association(evidence)));
            }
        }

        let detail = format!(
            "scanned {} of {} associated targets",
            self.max_pages * self.page_size,
            evidence.total_targets
        );
        Ok(Fetched::incomplete(SourcePayload::Association(evidence), detail))
    }
}

#[async_trait]
impl SourceAdapter for OpenTargetsClient {
    fn name(&self) -> &'static str {
        OPEN_TARGETS
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn query(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        _request: &AnalysisRequest,
    ) -> Result<Fetched, FetchError> {
        let gene_id = gene
            .canonical_id()
            .ok_or_else(|| FetchError::MissingIdentifier(format!("gene '{}' is unresolved", gene.raw)))?;
        let disease_id = disease.canonical_id().ok_or_else(|| {
            FetchError::MissingIdentifier(format!("disease '{}' is unresolved", disease.raw))
        })?;

        self.find_association(gene_id, disease_id).await
    }
}
