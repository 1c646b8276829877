//! Opinion assembly and the top-level analysis entry points.
//!
//! `run_analysis` is the single produced interface: validate inputs, run the
//! staged pipeline, merge the stage outputs into an `OpinionDocument`. The
//! assembler renders sections in fixed order with the deterministic row
//! filter, then issues one LLM reformat pass and re-applies the same filter
//! to the result, since the reformat stage can reintroduce dropped rows.
//! A reformat failure keeps the unformatted draft; the document always
//! renders.

pub mod tables;

use markcounsel_analysis::orchestrator::AnalysisOutcome;
use markcounsel_analysis::stage::run_text_stage;
use markcounsel_analysis::web::WebOutcome;
use markcounsel_analysis::{run_pipeline, run_web_pipeline};
use markcounsel_backend_azure::LlmBackend;
use markcounsel_model::{
    AnalysisError, CandidateConflict, CitationRecord, OpinionDocument, OpinionSection,
    ProposedMark,
};
use tables::{
    filter_table_rows, render_cited_term_section, render_component_section, render_hit_section,
    render_risk_section, render_web_component_section,
};

fn document_header(proposed: &ProposedMark) -> String {
    format!(
        "REFINED TRADEMARK OPINION: {}\nClass: {}\nGoods and Services: {}",
        proposed.name,
        proposed
            .classes
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        proposed.goods_services
    )
}

fn join_document(header: &str, sections: &[OpinionSection], footer: &str) -> String {
    let mut text = String::from(header);
    for section in sections {
        text.push_str("\n\n");
        text.push_str(&section.body);
    }
    if !footer.is_empty() {
        text.push_str("\n\n");
        text.push_str(footer);
    }
    text
}

/// Merge register pipeline outputs into the final opinion document.
pub async fn assemble<B: LlmBackend>(
    backend: &B,
    proposed: &ProposedMark,
    outcome: &AnalysisOutcome,
) -> OpinionDocument {
    let sections = vec![
        OpinionSection {
            title: "Section I: Comprehensive Trademark Hit Analysis".to_string(),
            body: render_hit_section(&outcome.hits),
        },
        OpinionSection {
            title: "Section II: Component Analysis".to_string(),
            body: render_component_section(
                outcome.component.as_ref(),
                outcome.component_skip_reason.as_deref(),
                outcome.crowded.as_ref(),
            ),
        },
        OpinionSection {
            title: "Section III: Risk Assessment and Summary".to_string(),
            body: render_risk_section(&outcome.risk),
        },
    ];

    let footer = format!(
        "Note: {} trademarks with unrelated goods/services were excluded from this analysis.",
        outcome.excluded_count
    );
    let draft = join_document(&document_header(proposed), &sections, &footer);

    let request =
        markcounsel_prompt::reformat_opinion(proposed, outcome.excluded_count, &draft);
    let reformatted = run_text_stage(backend, "reformat_opinion", &request, draft).await;
    let text = filter_table_rows(&reformatted);

    OpinionDocument {
        proposed: proposed.clone(),
        excluded_count: outcome.excluded_count,
        sections,
        text,
    }
}

/// Merge web common-law outputs into an opinion document.
///
/// The web sections are assembled deterministically; no reformat pass is
/// issued, only the row filter.
pub fn assemble_web(proposed_name: &str, outcome: &WebOutcome) -> OpinionDocument {
    let risk_body = format!(
        "Section VI: Web Common Law Risk Assessment\n\n\
         Market Presence:\n{market}\n\n\
         Enforcement Patterns:\n{enforcement}\n\n\
         Risk Category for Use:\n- **{level}**\n- {explanation}",
        market = outcome
            .narrative
            .market_presence
            .iter()
            .map(|p| format!("- {p}"))
            .collect::<Vec<_>>()
            .join("\n"),
        enforcement = if outcome.narrative.enforcement_patterns.is_empty() {
            "- None".to_string()
        } else {
            outcome
                .narrative
                .enforcement_patterns
                .iter()
                .map(|p| format!("- {p}"))
                .collect::<Vec<_>>()
                .join("\n")
        },
        level = outcome.risk_level,
        explanation = outcome.risk_explanation,
    );

    let sections = vec![
        OpinionSection {
            title: "Section IV: Comprehensive Cited Term Analysis".to_string(),
            body: render_cited_term_section(&outcome.cited),
        },
        OpinionSection {
            title: "Section V: Component Analysis".to_string(),
            body: render_web_component_section(outcome.component.as_ref(), outcome.crowded.as_ref()),
        },
        OpinionSection {
            title: "Section VI: Web Common Law Risk Assessment".to_string(),
            body: risk_body,
        },
    ];

    let header = format!("WEB COMMON LAW OPINION: {proposed_name}");
    let text = filter_table_rows(&join_document(&header, &sections, ""));

    OpinionDocument {
        proposed: ProposedMark::new(proposed_name, Vec::new(), String::new()),
        excluded_count: 0,
        sections,
        text,
    }
}

/// Run the full register analysis and assemble the opinion.
///
/// Only input errors abort; every stage-level failure degrades to its typed
/// empty default and a partial opinion with explicit placeholders is
/// produced instead.
pub async fn run_analysis<B: LlmBackend>(
    backend: &B,
    proposed: &ProposedMark,
    candidates: &[CandidateConflict],
) -> Result<OpinionDocument, AnalysisError> {
    let outcome = run_pipeline(backend, proposed, candidates).await?;
    tracing::debug!(
        mark = %proposed.name,
        identical = outcome.hits.identical_marks.len(),
        similar = outcome.hits.similar_marks.len(),
        "Assembling opinion"
    );
    Ok(assemble(backend, proposed, &outcome).await)
}

/// Run the web common-law analysis and assemble its opinion.
pub async fn run_web_common_law<B: LlmBackend>(
    backend: &B,
    proposed_name: &str,
    records: &[CitationRecord],
) -> Result<OpinionDocument, AnalysisError> {
    let outcome = run_web_pipeline(backend, proposed_name, records).await?;
    Ok(assemble_web(proposed_name, &outcome))
}
