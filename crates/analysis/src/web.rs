//! Web common-law pipeline.
//!
//! Citation records extracted from web evidence pages run through the same
//! stage pattern with a stricter skip rule: an identical cited term ends the
//! inquiry. Section V (component and crowded-field analysis) only runs when
//! no identical cited term exists, and the final risk level is binary.

use crate::crowd::crowded_field_stats;
use crate::repair::{repair_cited_terms, repair_web_components};
use crate::risk::web_risk;
use crate::stage::run_stage;
use markcounsel_backend_azure::LlmBackend;
use markcounsel_model::{
    AnalysisError, CitationRecord, CitedTermAnalysis, CrowdedFieldStats, RiskLevel,
    WebComponentAnalysis, WebRiskNarrative,
};

/// Result of the web common-law pipeline.
#[derive(Debug)]
pub struct WebOutcome {
    /// Corrected Section IV classification
    pub cited: CitedTermAnalysis,

    /// Section V, absent when an identical cited term exists
    pub component: Option<WebComponentAnalysis>,

    /// Recomputed crowded-field numbers, when component hits exist
    pub crowded: Option<CrowdedFieldStats>,

    /// Section VI narrative bullets
    pub narrative: WebRiskNarrative,

    /// Rule-derived risk level (MEDIUM-HIGH or MEDIUM-LOW only)
    pub risk_level: RiskLevel,

    /// Rule-derived justification for the level
    pub risk_explanation: String,
}

impl WebOutcome {
    pub fn component_skipped(&self) -> bool {
        self.component.is_none()
    }
}

fn recompute_crowded(component: &WebComponentAnalysis) -> Option<CrowdedFieldStats> {
    let owners: Vec<&str> = component
        .components
        .iter()
        .flat_map(|c| c.terms.iter())
        .map(|t| t.owner.as_str())
        .collect();
    if owners.is_empty() {
        return None;
    }
    Some(crowded_field_stats(owners.into_iter()))
}

/// Run the web common-law analysis for one proposed mark.
pub async fn run_web_pipeline<B: LlmBackend>(
    backend: &B,
    proposed_name: &str,
    records: &[CitationRecord],
) -> Result<WebOutcome, AnalysisError> {
    if proposed_name.trim().is_empty() {
        return Err(AnalysisError::MissingProposedMarkInfo("name"));
    }
    if records.is_empty() {
        return Err(AnalysisError::NoCandidateData);
    }

    let raw: CitedTermAnalysis = run_stage(
        backend,
        "cited_term_analysis",
        &markcounsel_prompt::cited_term_analysis(proposed_name, records),
    )
    .await;
    let cited = repair_cited_terms(proposed_name, raw);

    // Skip rule: identical cited terms take precedence over everything;
    // crowded-field logic only runs when none exist.
    let (component, crowded) = if cited.has_identical() {
        tracing::debug!(mark = %proposed_name, "Section V skipped: identical cited term");
        (None, None)
    } else {
        let raw: WebComponentAnalysis = run_stage(
            backend,
            "web_component_analysis",
            &markcounsel_prompt::web_component_analysis(proposed_name, records),
        )
        .await;
        let component = repair_web_components(raw);
        let crowded = recompute_crowded(&component);
        (Some(component), crowded)
    };

    let narrative: WebRiskNarrative = run_stage(
        backend,
        "web_risk_narrative",
        &markcounsel_prompt::web_risk_narrative(proposed_name, &cited, component.as_ref()),
    )
    .await;

    let (risk_level, risk_explanation) = web_risk(cited.has_identical(), crowded.as_ref());

    Ok(WebOutcome {
        cited,
        component,
        crowded,
        narrative,
        risk_level,
        risk_explanation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use markcounsel_backend_azure::BackendError;
    use markcounsel_model::CompletionRequest;
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedBackend {
        responses: Mutex<VecDeque<String>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().map(String::from).collect()),
            }
        }
    }

    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or(BackendError::Unavailable)
        }

        async fn health_check(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn records() -> Vec<CitationRecord> {
        vec![CitationRecord {
            cited_term: "ColorGrip".to_string(),
            owner: "Matrix".to_string(),
            goods_services: "Hair color products".to_string(),
        }]
    }

    const NARRATIVE_RESPONSE: &str = r#"```json
{"market_presence": ["Single established brand uses the term."], "enforcement_patterns": []}
```"#;

    #[tokio::test]
    async fn test_identical_cited_term_skips_section_five() {
        let cited_response = r#"```json
{
  "identical_terms": [
    {"cited_term": "ColorGrip", "owner": "Matrix", "goods_services": "Hair color products", "goods_services_match": true}
  ],
  "letter_difference_terms": [],
  "similar_terms": []
}
```"#;

        // Two responses only: cited-term stage and narrative stage.
        let backend = ScriptedBackend::new(vec![cited_response, NARRATIVE_RESPONSE]);

        let outcome = run_web_pipeline(&backend, "COLORGRIP", &records())
            .await
            .unwrap();

        assert!(outcome.component_skipped());
        assert!(outcome.crowded.is_none());
        assert_eq!(outcome.risk_level, RiskLevel::MediumHigh);
        assert!(outcome.risk_explanation.contains("not performed"));
        assert!(backend.responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crowded_web_field_lowers_risk() {
        let cited_response = r#"```json
{
  "identical_terms": [],
  "letter_difference_terms": [],
  "similar_terms": [
    {"cited_term": "Grip Colour", "owner": "A", "goods_services": "hair dye", "similarity_type": "Semantic", "goods_services_match": true}
  ]
}
```"#;
        let component_response = r#"```json
{
  "components": [
    {"component": "GRIP", "terms": [
      {"cited_term": "StrongGrip", "owner": "A", "goods_services": "hair wax", "goods_services_match": true},
      {"cited_term": "EasyGrip", "owner": "B", "goods_services": "hair gel", "goods_services_match": true},
      {"cited_term": "GripPro", "owner": "C", "goods_services": "hair spray", "goods_services_match": false}
    ]}
  ],
  "crowded_field": {"total_hits": 3, "distinct_owner_percentage": 100, "is_crowded": true, "explanation": "Different owners."}
}
```"#;

        let backend =
            ScriptedBackend::new(vec![cited_response, component_response, NARRATIVE_RESPONSE]);

        let outcome = run_web_pipeline(&backend, "COLORGRIP", &records())
            .await
            .unwrap();

        let crowded = outcome.crowded.unwrap();
        assert_eq!(crowded.total_hits, 3);
        assert!(crowded.is_crowded);
        assert_eq!(outcome.risk_level, RiskLevel::MediumLow);
        assert!(outcome.risk_explanation.contains("100"));
    }

    #[tokio::test]
    async fn test_web_pipeline_total_on_failure() {
        let backend = ScriptedBackend::new(vec![]);

        let outcome = run_web_pipeline(&backend, "COLORGRIP", &records())
            .await
            .unwrap();

        assert!(outcome.cited.identical_terms.is_empty());
        assert_eq!(outcome.risk_level, RiskLevel::MediumLow);
        assert_eq!(
            outcome.narrative.market_presence,
            vec!["Unable to determine market presence.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_web_input_validation() {
        let backend = ScriptedBackend::new(vec![]);
        assert!(matches!(
            run_web_pipeline(&backend, " ", &records()).await,
            Err(AnalysisError::MissingProposedMarkInfo("name"))
        ));
        assert!(matches!(
            run_web_pipeline(&backend, "COLORGRIP", &[]).await,
            Err(AnalysisError::NoCandidateData)
        ));
    }
}
