//! Europe PMC literature search.
//!
//! Hits are kept only when the abstract (or, failing that, the title) has a
//! sentence mentioning both a gene term and a disease term.

use super::{Fetched, HttpSource, SourceAdapter, EUROPE_PMC};
use crate::error::FetchError;
use crate::models::{AnalysisRequest, LiteratureEvidence, LiteratureHit, ResolvedEntity, SourcePayload};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;

pub const DEFAULT_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

const MAX_GENE_TERMS: usize = 5;
const MAX_DISEASE_TERMS: usize = 8;
const MAX_PAGE_SIZE: usize = 25;
const MAX_SENTENCES: usize = 3;
const FUTURE_YEAR: i32 = 3000;

const PROTECTED_ABBREVIATIONS: [(&str, &str); 5] = [
    ("e.g.", "e\u{1}g\u{1}"),
    ("i.e.", "i\u{1}e\u{1}"),
    ("et al.", "et al\u{1}"),
    ("Fig.", "Fig\u{1}"),
    ("Dr.", "Dr\u{1}"),
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "resultList")]
    result_list: Option<ResultList>,
}

#[derive(Debug, Deserialize)]
struct ResultList {
    #[serde(default)]
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    pmid: Option<String>,
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(rename = "pubYear")]
    pub_year: Option<String>,
    #[serde(default)]
    source: String,
    #[serde(rename = "authorString", default)]
    author_string: String,
    #[serde(rename = "abstractText")]
    abstract_text: Option<String>,
}

fn query_term(term: &str) -> String {
    if term.contains(' ') {
        format!("\"{}\"", term)
    } else {
        term.to_string()
    }
}

/// Build the boolean Europe PMC query for the two synonym sets.
pub fn build_query(gene_terms: &[String], disease_terms: &[String], since_year: i32) -> String {
    let gene_q: Vec<String> = gene_terms.iter().take(MAX_GENE_TERMS).map(|t| query_term(t)).collect();
    let disease_q: Vec<String> = disease_terms
        .iter()
        .take(MAX_DISEASE_TERMS)
        .map(|t| query_term(t))
        .collect();
    format!(
        "({}) AND ({}) AND (PUB_YEAR:[{} TO {}])",
        gene_q.join(" OR "),
        disease_q.join(" OR "),
        since_year,
        FUTURE_YEAR
    )
}

/// Split prose into sentences at `.`, `?` or `!` followed by whitespace and
/// an uppercase letter or digit. Common abbreviations never end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized.is_empty() {
        return Vec::new();
    }
    for (abbreviation, placeholder) in PROTECTED_ABBREVIATIONS {
        normalized = normalized.replace(abbreviation, placeholder);
    }

    let chars: Vec<char> = normalized.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        let ends = matches!(c, '.' | '?' | '!')
            && chars.get(i + 1) == Some(&' ')
            && chars
                .get(i + 2)
                .map(|n| n.is_uppercase() || n.is_ascii_digit())
                .unwrap_or(false);
        if ends {
            sentences.push(std::mem::take(&mut current));
            i += 2;
            continue;
        }
        i += 1;
    }
    sentences.push(current);

    sentences
        .into_iter()
        .map(|s| {
            let mut restored = s;
            for (abbreviation, placeholder) in PROTECTED_ABBREVIATIONS {
                restored = restored.replace(placeholder, abbreviation);
            }
            restored.trim().to_string()
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Case-insensitive alternation over literal terms.
fn term_matcher(terms: &[String]) -> Option<Regex> {
    let alternatives: Vec<String> = terms
        .iter()
        .filter(|t| !t.trim().is_empty())
        .map(|t| regex::escape(t.trim()))
        .collect();
    if alternatives.is_empty() {
        return None;
    }
    RegexBuilder::new(&alternatives.join("|"))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Sentences of `abstract_text` (else the title) mentioning both entities.
fn evidence_sentences(title: &str, abstract_text: &str, gene: &Regex, disease: &Regex) -> Vec<String> {
    let mentions_both = |s: &str| gene.is_match(s) && disease.is_match(s);
    let mut sentences: Vec<String> = split_sentences(abstract_text)
        .into_iter()
        .filter(|s| mentions_both(s))
        .take(MAX_SENTENCES)
        .collect();
    if sentences.is_empty() && !title.is_empty() && mentions_both(title) {
        sentences.push(title.to_string());
    }
    sentences
}

/// Literature-search provider.
pub struct EuropePmcClient {
    http: HttpSource,
    policy: RetryPolicy,
}

impl EuropePmcClient {
    pub fn new(http: HttpSource, policy: RetryPolicy) -> Self {
        Self { http, policy }
    }

    pub async fn search(
        &self,
        gene_terms: &[String],
        disease_terms: &[String],
        since_year: i32,
        max_records: usize,
    ) -> Result<LiteratureEvidence, FetchError> {
        let query = build_query(gene_terms, disease_terms, since_year);
        let params = [
            ("query", query.clone()),
            ("resultType", "core".to_string()),
            ("pageSize", max_records.clamp(1, MAX_PAGE_SIZE).to_string()),
            ("format", "json".to_string()),
        ];
        let response: SearchResponse = self.http.get_json("search", &params).await?;
        let results = response.result_list.map(|l| l.result).unwrap_or_default();

        let (Some(gene_re), Some(disease_re)) = (term_matcher(gene_terms), term_matcher(disease_terms))
        else {
            return Ok(LiteratureEvidence { query, hits: Vec::new() });
        };

        let hits = results
            .into_iter()
            .take(max_records)
            .filter_map(|hit| {
                let abstract_text = hit.abstract_text.as_deref().unwrap_or_default();
                let sentences = evidence_sentences(&hit.title, abstract_text, &gene_re, &disease_re);
                if sentences.is_empty() {
                    return None;
                }
                let pmid = hit.pmid.or(hit.id);
                Some(LiteratureHit {
                    uri: pmid
                        .as_ref()
                        .map(|p| format!("https://europepmc.org/abstract/MED/{}", p)),
                    pmid,
                    title: hit.title,
                    year: hit.pub_year.and_then(|y| y.trim().parse().ok()),
                    source: hit.source,
                    authors: hit.author_string,
                    sentences,
                })
            })
            .collect();

        Ok(LiteratureEvidence { query, hits })
    }
}

#[async_trait]
impl SourceAdapter for EuropePmcClient {
    fn name(&self) -> &'static str {
        EUROPE_PMC
    }

    fn retry_policy(&self) -> &RetryPolicy {
        &self.policy
    }

    async fn query(
        &self,
        gene: &ResolvedEntity,
        disease: &ResolvedEntity,
        request: &AnalysisRequest,
    ) -> Result<Fetched, FetchError> {
        let evidence = self
            .search(&gene.synonyms, &disease.synonyms, request.since_year, request.max_abstracts)
            .await?;
        Ok(Fetched::complete(SourcePayload::Literature(evidence)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fast_policy;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn terms(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_build_query_quotes_and_limits_terms() {
        let genes = terms(&["TP53", "P53", "a", "b", "c", "dropped"]);
        let diseases = terms(&["lung cancer", "NSCLC"]);
        let query = build_query(&genes, &diseases, 2015);
        assert_eq!(
            query,
            "(TP53 OR P53 OR a OR b OR c) AND (\"lung cancer\" OR NSCLC) AND (PUB_YEAR:[2015 TO 3000])"
        );
    }

    #[test]
    fn test_split_sentences_protects_abbreviations() {
        let text = "Mutations in TP53, e.g. R273H, drive tumours. Smith et al. Showed this.  2019 data agree! lower case. stays";
        let sentences = split_sentences(text);
        assert_eq!(
            sentences,
            vec![
                "Mutations in TP53, e.g. R273H, drive tumours.",
                "Smith et al. Showed this.",
                "2019 data agree! lower case. stays",
            ]
        );
    }

    #[test]
    fn test_split_sentences_empty() {
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_evidence_sentences_fall_back_to_title() {
        let gene = term_matcher(&terms(&["TP53"])).unwrap();
        let disease = term_matcher(&terms(&["lung cancer"])).unwrap();

        let found = evidence_sentences(
            "Unrelated title",
            "TP53 is mutated in Lung Cancer. Nothing else here.",
            &gene,
            &disease,
        );
        assert_eq!(found, vec!["TP53 is mutated in Lung Cancer."]);

        let from_title = evidence_sentences("TP53 in lung cancer", "No mentions.", &gene, &disease);
        assert_eq!(from_title, vec!["TP53 in lung cancer"]);

        assert!(evidence_sentences("Other", "Nope.", &gene, &disease).is_empty());
    }

    #[test]
    fn test_term_matcher_escapes_metacharacters() {
        let matcher = term_matcher(&terms(&["IL-2 (human)"])).unwrap();
        assert!(matcher.is_match("levels of il-2 (human) rose"));
        assert!(term_matcher(&terms(&[" "])).is_none());
    }

    #[tokio::test]
    async fn test_search_keeps_only_hits_with_evidence() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("format", "json"))
            .and(query_param("pageSize", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultList": {"result": [
                    {"pmid": "111", "title": "TP53 and lung cancer", "pubYear": "2020",
                     "abstractText": "We show TP53 loss promotes lung cancer. Other text."},
                    {"id": "PPR2", "title": "Unrelated", "pubYear": "2021",
                     "abstractText": "Nothing relevant."},
                    {"pmid": "333", "title": "Beyond max", "pubYear": "2022",
                     "abstractText": "TP53 lung cancer."}
                ]}
            })))
            .mount(&server)
            .await;

        let client = EuropePmcClient::new(
            HttpSource::new(reqwest::Client::new(), server.uri()),
            fast_policy(),
        );
        let evidence = client
            .search(&terms(&["TP53"]), &terms(&["lung cancer"]), 2015, 2)
            .await
            .unwrap();

        assert_eq!(evidence.hits.len(), 1);
        let hit = &evidence.hits[0];
        assert_eq!(hit.pmid.as_deref(), Some("111"));
        assert_eq!(hit.year, Some(2020));
        assert_eq!(hit.uri.as_deref(), Some("https://europepmc.org/abstract/MED/111"));
        assert_eq!(hit.sentences, vec!["We show TP53 loss promotes lung cancer."]);
    }
}
