//! GWAS Catalog associations for a trait, filtered to the resolved gene.

use super::{Fetched, HttpSource, SourceAdapter, GWAS_CATALOG};
use crate::error::FetchError;
use crate::models::{AnalysisRequest, GwasEvidence, GwasHit, ResolvedEntity, SourcePayload};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashSet;

pub const DEFAULT_URL: &str = "https://www.ebi.ac.uk/gwas/rest/api";

const MAX_PAGE_SIZE: usize = 1000;

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Genes named by a locus: author-reported genes (list of names, list of
/// `{geneName}` objects, or a comma-separated string) plus the Ensembl genes
/// mapped to the strongest risk alleles.
fn locus_genes(locus: &Value) -> Vec<String> {
    let mut genes = Vec::new();

    match locus.get("authorReportedGenes") {
        Some(Value::Array(items)) => {
            for item in items {
                if let Some(name) = item.as_str() {
                    genes.push(name.trim().to_string());
                } else if let Some(name) = item.get("geneName").and_then(Value::as_str) {
                    genes.push(name.trim().to_string());
                }
            }
        }
        Some(Value::String(list)) => {
            genes.extend(list.split(',').map(|g| g.trim().to_string()));
        }
        _ => {}
    }

    if let Some(alleles) = locus.get("strongestRiskAlleles").and_then(Value::as_array) {
        for allele in alleles {
            let ensembl = allele.get("ensemblGenes").and_then(Value::as_array);
            for gene in ensembl.into_iter().flatten() {
                if let Some(name) = gene.get("geneName").and_then(Value::as_str) {
                    genes.push(name.trim().to_string());
                }
            }
        }
    }

    genes.retain(|g| !g.is_empty());
    genes
}

fn risk_allele(association: &Value) -> Option<String> {
    association
        .get("loci")?
        .as_array()?
        .iter()
        .filter_map(|l| l.get("strongestRiskAlleles").and_then(Value::as_array))
        .flatten()
        .find_map(|a| a.get("riskAlleleName").and_then(as_string))
}

fn trait_name(association: &Value) -> Option<String> {
    match association.get("trait")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let names: Vec<String> = items
                .iter()
                .filter_map(|t| t.get("trait").and_then(Value::as_str).or_else(|| t.as_str()))
                .map(String::from)
                .collect();
            (!names.is_empty()).then(|| names.join("; "))
        }
        _ => None,
    }
}

/// Parse one association; `None` when it does not mention any gene term.
fn parse_association(association: &Value, gene_terms: &HashSet<String>) -> Option<GwasHit> {
    let loci = association.get("loci")?.as_array()?;
    let mapped_genes: Vec<String> = loci.iter().flat_map(locus_genes).collect();
    if !mapped_genes.iter().any(|g| gene_terms.contains(&g.to_lowercase())) {
        return None;
    }

    let mantissa = association.get("pvalueMantissa").and_then(as_f64);
    let exponent = association.get("pvalueExponent").and_then(as_f64);
    let p_value = match (mantissa, exponent) {
        (Some(m), Some(e)) => Some(m * 10f64.powf(e)),
        (Some(m), None) => Some(m),
        _ => None,
    };

    let effect_size = association
        .get("orPerCopyNum")
        .and_then(as_f64)
        .or_else(|| association.get("betaNum").and_then(as_f64));

    Some(GwasHit {
        snp: risk_allele(association),
        trait_name: trait_name(association),
        p_value,
        mapped_genes,
        effect_size,
        pmid: association.get("pubmedId").and_then(as_string),
        study_accession: association.get("studyAccession").and_then(as_string),
        uri: association
            .pointer("/_links/self/href")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// Genetic-association provider.
pub struct GwasCatalogClient {
    http: HttpSource,
    policy: RetryPolicy,
    max_records: usize,
}

impl GwasCatalogClient {
    pub fn new(http: HttpSource, policy: RetryPolicy) -> Self {
        Self {
            http,
            policy,
            max_records: 15,
        }
    }

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records.max(1);
        self
    }

    /// Associations for `trait_query` that map to any of `gene_terms`.
    pub async fn search(&self, trait_query: &str, gene_terms: &[String]) -> Result<Fetched, FetchError> {
        let params = [
            ("efoTrait", trait_query.to_string()),
            ("size", self.max_records.min(MAX_PAGE_SIZE).to_string()),
        ];
        let body: Value = self.http.get_json("associations/search", &params).await?;

        let associations = body
            .pointer("/_embedded/associations")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let wanted: HashSet<String> = gene_terms.iter().map(|g| g.to_lowercase()).collect();
        let malformed = associations
            .iter()
            .filter(|a| a.get("loci").and_then(Value::as_array).is_none())
            .count();
        let hits: Vec<GwasHit> = associations
            .iter()
            .filter_map(|a| parse_association(a, &wanted))
            .take(self.max_records)
            .collect();

        let payload = SourcePayload::Gwas(GwasEvidence {
            trait_query: trait_query.to_string(),
            hits,
        });
        if malformed > 0 {
            Ok(Fetched::incomplete(
                payload,
                format!("skipped {} association(s) without loci", malformed),
            ))
        } else {
            Ok(Fetched::complete(payload))
        }
    }
}

#[async_trait]
impl SourceAdapter for GwasCatalogClient {
    fn name(&self) -> &'static str {
        GWAS_CATALOG
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    fn is_enabled(&self, request: &AnalysisRequest) -> bool {
        request.include_gwas
    }

    async fn query(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        _request: &AnalysisRequest,
    ) -> Result<Fetched, FetchError> {
        self.search(&disease.label, &gene.synonyms).await
    }
}
