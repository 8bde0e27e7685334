//! Markdown and JSON report generation.
//!
//! This module renders a terminal [`AnalysisResult`] for people (Markdown)
//! or for other tools (JSON).

use crate::cli::OutputFormat;
use crate::models::{
    AnalysisResult, AssociationEvidence, GwasEvidence, LiteratureEvidence, LlmVerdict, ParseTier,
    PipelineStatus, ResolutionStatus, ResolvedEntity, SourcePayload, SourceStatus, Verdict,
};
use anyhow::Result;

/// Render `result` in the requested format.
pub fn render(result: &AnalysisResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => generate_json_report(result),
        OutputFormat::Markdown => Ok(generate_markdown_report(result)),
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(result: &AnalysisResult) -> String {
    let mut output = String::new();

    // Title
    output.push_str(&format!(
        "# GeneLink Report: {} / {}\n\n",
        result.request.gene, result.request.disease
    ));

    output.push_str(&generate_metadata_section(result));
    output.push_str(&generate_error_section(result));
    output.push_str(&generate_entities_section(&result.gene, &result.disease));
    output.push_str(&generate_sources_section(result));

    for source in result.evidence.sources.values() {
        match &source.payload {
            Some(SourcePayload::Association(evidence)) => {
                output.push_str(&generate_association_section(evidence))
            }
            Some(SourcePayload::Literature(evidence)) => {
                output.push_str(&generate_literature_section(evidence))
            }
            Some(SourcePayload::Gwas(evidence)) => output.push_str(&generate_gwas_section(evidence)),
            _ => {}
        }
    }

    if let Some(ref verdict) = result.verdict {
        output.push_str(&generate_verdict_section(verdict));
    }

    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(result: &AnalysisResult) -> String {
    let mut section = String::new();
    let request = &result.request;

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Analysis ID:** `{}`\n", result.analysis_id));
    section.push_str(&format!("- **Status:** {}\n", status_badge(result.status)));
    section.push_str(&format!(
        "- **Started:** {}\n",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Duration:** {:.1}s\n", result.duration_seconds()));
    match request.llm {
        Some(ref llm) => section.push_str(&format!("- **LLM:** {} `{}`\n", llm.provider, llm.model)),
        None => section.push_str("- **LLM:** not requested\n"),
    }
    section.push_str(&format!(
        "- **Literature:** since {}, up to {} records\n",
        request.since_year, request.max_abstracts
    ));
    section.push_str(&format!(
        "- **GWAS Catalog:** {}\n\n",
        if request.include_gwas { "included" } else { "skipped" }
    ));

    section
}

fn status_badge(status: PipelineStatus) -> String {
    match status {
        PipelineStatus::Completed => "✅ completed".to_string(),
        PipelineStatus::Failed => "❌ failed".to_string(),
        other => other.to_string(),
    }
}

fn generate_error_section(result: &AnalysisResult) -> String {
    match result.error {
        Some(ref error) => format!("## Error\n\n> {}\n\n", error),
        None => String::new(),
    }
}

/// Generate the resolved-entities table.
fn generate_entities_section(gene: &ResolvedEntity, disease: &ResolvedEntity) -> String {
    let mut section = String::new();

    section.push_str("## Entities\n\n");
    section.push_str("| Kind | Input | Identifier | Label | Resolution |\n");
    section.push_str("|:---|:---|:---|:---|:---:|\n");
    for entity in [gene, disease] {
        let resolution = match entity.status {
            ResolutionStatus::Resolved => "resolved",
            ResolutionStatus::Unresolved => "⚠️ unresolved",
        };
        section.push_str(&format!(
            "| {} | {} | `{}` | {} | {} |\n",
            entity.kind, entity.raw, entity.identifier, entity.label, resolution
        ));
    }
    section.push('\n');

    for entity in [gene, disease] {
        if entity.synonyms.len() > 1 {
            section.push_str(&format!(
                "*{} synonyms:* {}\n\n",
                entity.kind,
                entity.synonyms.join(", ")
            ));
        }
    }

    section
}

/// Generate the per-source status table.
fn generate_sources_section(result: &AnalysisResult) -> String {
    let mut section = String::new();
    let evidence = &result.evidence;

    section.push_str("## Evidence Sources\n\n");
    if evidence.is_empty() {
        section.push_str("No evidence was collected.\n\n");
        return section;
    }

    section.push_str(&format!(
        "{} ok, {} partial, {} unavailable\n\n",
        evidence.count(SourceStatus::Ok),
        evidence.count(SourceStatus::Partial),
        evidence.count(SourceStatus::Unavailable)
    ));
    section.push_str("| Source | Status | Note |\n");
    section.push_str("|:---|:---:|:---|\n");

    for (name, source) in &evidence.sources {
        let badge = match source.status {
            SourceStatus::Ok => "🟢 ok",
            SourceStatus::Partial => "🟡 partial",
            SourceStatus::Unavailable => "🔴 unavailable",
        };
        let note = source.error.as_deref().unwrap_or("").replace('|', "\\|");
        section.push_str(&format!("| {} | {} | {} |\n", name, badge, note));
    }
    section.push('\n');

    section
}

/// Generate the association-score section.
fn generate_association_section(evidence: &AssociationEvidence) -> String {
    let mut section = String::new();

    section.push_str("## Association Scores\n\n");
    let Some(ref score) = evidence.association else {
        section.push_str(&format!(
            "No association found ({} page(s) scanned, {} associated targets).\n\n",
            evidence.pages_scanned, evidence.total_targets
        ));
        return section;
    };

    section.push_str(&format!(
        "**Overall:** {:.3} for `{}` in {} (`{}`)\n\n",
        score.overall, score.target_id, score.disease_name, score.disease_id
    ));

    if !score.datatype_scores.is_empty() {
        section.push_str("| Evidence type | Score |\n");
        section.push_str("|:---|:---:|\n");

        let mut scores: Vec<_> = score.datatype_scores.iter().collect();
        scores.sort_by(|a, b| b.1.total_cmp(a.1));

        for (datatype, value) in scores {
            section.push_str(&format!("| {} | {:.3} |\n", datatype, value));
        }
        section.push('\n');
    }

    section
}

/// Generate the literature section.
fn generate_literature_section(evidence: &LiteratureEvidence) -> String {
    let mut section = String::new();

    section.push_str("## Literature\n\n");
    if evidence.hits.is_empty() {
        section.push_str("No abstracts mention both the gene and the disease.\n\n");
        return section;
    }

    for hit in &evidence.hits {
        let year = hit.year.map(|y| format!(" ({})", y)).unwrap_or_default();
        match (&hit.pmid, &hit.uri) {
            (Some(pmid), Some(uri)) => {
                section.push_str(&format!("### {}{}\n\n[PMID {}]({})", hit.title, year, pmid, uri))
            }
            (Some(pmid), None) => section.push_str(&format!("### {}{}\n\nPMID {}", hit.title, year, pmid)),
            _ => section.push_str(&format!("### {}{}\n\n", hit.title, year)),
        }
        if !hit.authors.is_empty() {
            section.push_str(&format!(" · {}", hit.authors));
        }
        section.push_str("\n\n");

        for sentence in &hit.sentences {
            section.push_str(&format!("> {}\n", sentence));
        }
        section.push('\n');
    }

    section
}

fn format_p_value(p: Option<f64>) -> String {
    match p {
        Some(p) if p < 1e-3 => format!("{:.1e}", p),
        Some(p) => format!("{:.4}", p),
        None => "n/a".to_string(),
    }
}

/// Generate the GWAS section.
fn generate_gwas_section(evidence: &GwasEvidence) -> String {
    let mut section = String::new();

    section.push_str("## GWAS Associations\n\n");
    if evidence.hits.is_empty() {
        section.push_str(&format!(
            "No associations for trait \"{}\" map to the gene.\n\n",
            evidence.trait_query
        ));
        return section;
    }

    section.push_str("| SNP | Trait | p-value | Genes | Effect | PMID |\n");
    section.push_str("|:---|:---|:---:|:---|:---:|:---|\n");

    for hit in &evidence.hits {
        section.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            hit.snp.as_deref().unwrap_or("n/a"),
            hit.trait_name.as_deref().unwrap_or("n/a"),
            format_p_value(hit.p_value),
            hit.mapped_genes.join(", "),
            hit.effect_size.map(|e| format!("{:.2}", e)).unwrap_or_else(|| "n/a".to_string()),
            hit.pmid.as_deref().unwrap_or("n/a"),
        ));
    }
    section.push('\n');

    section
}

/// Generate the verdict section.
fn generate_verdict_section(verdict: &LlmVerdict) -> String {
    let mut section = String::new();

    let badge = match verdict.verdict {
        Verdict::Strong => "🟢 **STRONG**",
        Verdict::Moderate => "🟡 **MODERATE**",
        Verdict::Weak => "🟠 **WEAK**",
        Verdict::NoEvidence => "⚪ **NO EVIDENCE**",
        Verdict::Inconclusive => "❔ **INCONCLUSIVE**",
    };

    section.push_str("## Verdict\n\n");
    section.push_str(&format!(
        "{} · confidence {:.0}%\n\n",
        badge,
        verdict.confidence * 100.0
    ));
    if verdict.tier == ParseTier::Fallback {
        section.push_str(
            "> ⚠️ The model's answer did not match the expected schema; fields were recovered on a best-effort basis.\n\n",
        );
    }

    if !verdict.key_points.is_empty() {
        section.push_str("### Key Points\n\n");
        for (i, point) in verdict.key_points.iter().enumerate() {
            match point.citation {
                Some(ref citation) => {
                    section.push_str(&format!("{}. {} *[{}]*\n", i + 1, point.statement, citation))
                }
                None => section.push_str(&format!("{}. {}\n", i + 1, point.statement)),
            }
        }
        section.push('\n');
    }

    if !verdict.drivers.is_empty() {
        section.push_str("### Drivers\n\n");
        section.push_str("| Driver | Present | Summary |\n");
        section.push_str("|:---|:---:|:---|\n");
        for (name, driver) in &verdict.drivers {
            section.push_str(&format!(
                "| {} | {} | {} |\n",
                name,
                if driver.present { "yes" } else { "no" },
                driver.summary
            ));
        }
        section.push('\n');
    }

    if !verdict.recommended_next_steps.is_empty() {
        section.push_str("### Recommended Next Steps\n\n");
        for step in &verdict.recommended_next_steps {
            section.push_str(&format!("- {}\n", step));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by GeneLink v{}. Verdicts are model-generated summaries of public evidence, not clinical advice.*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}
