//! Gene and disease resolution.
//!
//! Resolution never fails the pipeline: a lookup that cannot be completed
//! degrades the entity to `unresolved`, carrying the raw input as identifier.

use crate::models::{EntityKind, ResolvedEntity};
use crate::sources::ensembl::{self, EnsemblClient};
use crate::sources::ols::{self, OlsClient};
use std::sync::Arc;
use tracing::{info, warn};

/// Maps free-text gene symbols and disease names to canonical identifiers.
#[derive(Clone)]
pub struct EntityResolver {
    genes: Arc<EnsemblClient>,
    diseases: Arc<OlsClient>,
}

impl EntityResolver {
    pub fn new(genes: Arc<EnsemblClient>, diseases: Arc<OlsClient>) -> Self {
        Self { genes, diseases }
    }

    /// Resolve both entities concurrently; each side fails independently.
    pub async fn resolve(&self, raw_gene: &str, raw_disease: &str) -> (ResolvedEntity, ResolvedEntity) {
        tokio::join!(self.resolve_gene(raw_gene), self.resolve_disease(raw_disease))
    }

    pub async fn resolve_gene(&self, raw: &str) -> ResolvedEntity {
        let raw = raw.trim();
        match self.genes.lookup_with_retry(raw).await {
            Ok(record) => {
                let identifier = if ensembl::is_gene_id(raw) {
                    raw.to_string()
                } else {
                    record.id
                };
                info!("Resolved gene {} -> {}", raw, identifier);
                ResolvedEntity::resolved(
                    EntityKind::Gene,
                    raw,
                    identifier,
                    record.display_name,
                    record.synonyms,
                )
            }
            Err(err) => {
                warn!("Could not resolve gene '{}': {}", raw, err);
                ResolvedEntity::unresolved(EntityKind::Gene, raw)
            }
        }
    }

    pub async fn resolve_disease(&self, raw: &str) -> ResolvedEntity {
        let raw = raw.trim();
        match self.diseases.search_with_retry(raw).await {
            Ok(concept) => {
                let identifier = if ols::is_ontology_id(raw) {
                    ols::normalize_ontology_id(raw)
                } else {
                    concept.id
                };
                info!("Resolved disease '{}' -> {}", raw, identifier);
                let mut entity = ResolvedEntity::resolved(
                    EntityKind::Disease,
                    raw,
                    identifier,
                    concept.label,
                    concept.synonyms,
                );
                entity.alternate_ids = concept.mondo_id.into_iter().collect();
                entity
            }
            Err(err) => {
                warn!("Could not resolve disease '{}': {}", raw, err);
                ResolvedEntity::unresolved(EntityKind::Disease, raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResolutionStatus;
    use crate::sources::HttpSource;
    use crate::testing::fast_policy;
    use serde_json::json;
    use wiremock::matchers::{method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver(server: &MockServer) -> EntityResolver {
        let client = reqwest::Client::new();
        EntityResolver::new(
            Arc::new(EnsemblClient::new(
                HttpSource::new(client.clone(), format!("{}/ensembl", server.uri())),
                fast_policy(),
            )),
            Arc::new(OlsClient::new(
                HttpSource::new(client, format!("{}/ols", server.uri())),
                fast_policy(),
            )),
        )
    }

    async fn mount_lung_cancer(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/ols/search"))
            .and(query_param("q", "lung cancer"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"docs": [{
                    "ontology_name": "efo", "short_form": "EFO_0001071",
                    "label": "lung carcinoma", "synonym": ["lung cancer"]
                }]}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_gene_failure_does_not_block_disease() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex("^/ensembl/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        mount_lung_cancer(&server).await;

        let (gene, disease) = resolver(&server).resolve("TP53", "lung cancer").await;

        assert_eq!(gene.status, ResolutionStatus::Unresolved);
        assert_eq!(gene.identifier, "TP53");
        assert_eq!(disease.status, ResolutionStatus::Resolved);
        assert_eq!(disease.identifier, "EFO_0001071");
        assert_eq!(disease.label, "lung carcinoma");
        assert!(disease.synonyms.contains(&"lung cancer".to_string()));
    }

    #[tokio::test]
    async fn test_unresolvable_disease_keeps_raw_identifier() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ols/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": {"docs": []}})))
            .mount(&server)
            .await;

        let disease = resolver(&server).resolve_disease("  xyzzy syndrome ").await;
        assert_eq!(disease.status, ResolutionStatus::Unresolved);
        assert_eq!(disease.identifier, "xyzzy syndrome");
        assert_eq!(disease.synonyms, vec!["xyzzy syndrome".to_string()]);
    }

    #[tokio::test]
    async fn test_resolving_canonical_gene_id_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ensembl/lookup/symbol/homo_sapiens/TP53"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ENSG00000141510", "display_name": "TP53"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ensembl/lookup/id/ENSG00000141510"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "ENSG00000141510", "display_name": "TP53"
            })))
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        let first = resolver.resolve_gene("TP53").await;
        let second = resolver.resolve_gene(&first.identifier).await;

        assert_eq!(first.identifier, "ENSG00000141510");
        assert_eq!(second.identifier, first.identifier);
        assert_eq!(second.label, "TP53");
        assert!(second.synonyms.contains(&"TP53".to_string()));
    }

    #[tokio::test]
    async fn test_resolving_canonical_disease_id_is_idempotent() {
        let server = MockServer::start().await;
        mount_lung_cancer(&server).await;
        Mock::given(method("GET"))
            .and(path("/ols/search"))
            .and(query_param("q", "EFO_0001071"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "response": {"docs": [{
                    "ontology_name": "efo", "short_form": "EFO_0001071", "label": "lung carcinoma"
                }]}
            })))
            .mount(&server)
            .await;

        let resolver = resolver(&server);
        let first = resolver.resolve_disease("lung cancer").await;
        let second = resolver.resolve_disease(&first.identifier).await;
        assert_eq!(second.identifier, first.identifier);
        assert_eq!(second.status, ResolutionStatus::Resolved);
    }

    #[tokio::test]
    async fn test_canonical_id_survives_provider_outage() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let gene = resolver(&server).resolve_gene("ENSG00000141510").await;
        assert_eq!(gene.identifier, "ENSG00000141510");
    }
}
