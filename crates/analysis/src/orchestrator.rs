//! Register pipeline orchestration.
//!
//! One mark's analysis moves through a fixed stage sequence:
//!
//! `Filtered -> HitAnalyzed -> (ComponentAnalyzed | ComponentSkipped) -> RiskAssessed`
//!
//! Stages are independent model calls; every deterministic decision between
//! them (the component skip rule, crowded-field arithmetic, the risk rule
//! layer) happens here in code. A degraded stage yields its empty default
//! and the pipeline proceeds.

use crate::crowd::crowded_field_stats;
use crate::filter::filter_relevant;
use crate::repair::{repair_component_analysis, repair_hit_analysis};
use crate::risk::{apply_risk_rules, RiskContext};
use crate::stage::run_stage;
use markcounsel_backend_azure::LlmBackend;
use markcounsel_model::{
    AnalysisError, CandidateConflict, ComponentAnalysis, CrowdedFieldStats, HitAnalysis,
    ProposedMark, RiskAssessment, SimilarityType,
};

/// Everything the assembler needs to render one opinion.
#[derive(Debug)]
pub struct AnalysisOutcome {
    /// Candidates that survived the relevance pre-filter
    pub relevant: Vec<CandidateConflict>,

    /// Candidates dropped by the pre-filter
    pub excluded_count: usize,

    /// Corrected Section I classification
    pub hits: HitAnalysis,

    /// Section II, absent when the skip rule fired
    pub component: Option<ComponentAnalysis>,

    /// Rationale recorded when the component stage was skipped
    pub component_skip_reason: Option<String>,

    /// Recomputed crowded-field numbers, when component hits exist
    pub crowded: Option<CrowdedFieldStats>,

    /// Section III after the deterministic rule layer
    pub risk: RiskAssessment,
}

fn validate(
    proposed: &ProposedMark,
    candidates: &[CandidateConflict],
) -> Result<(), AnalysisError> {
    if proposed.name.trim().is_empty() {
        return Err(AnalysisError::MissingProposedMarkInfo("name"));
    }
    if proposed.classes.is_empty() {
        return Err(AnalysisError::MissingProposedMarkInfo("class"));
    }
    if proposed.goods_services.trim().is_empty() {
        return Err(AnalysisError::MissingProposedMarkInfo("goods_services"));
    }
    if candidates.is_empty() {
        return Err(AnalysisError::NoCandidateData);
    }
    Ok(())
}

/// Component-stage skip rule: a phonetic or semantic hit in the same or a
/// coordinated class already establishes enough risk that component
/// decomposition cannot lower it.
fn component_skip_reason(hits: &HitAnalysis) -> Option<String> {
    for entry in &hits.similar_marks {
        let phonetic_or_semantic = matches!(
            entry.similarity_type,
            Some(SimilarityType::Phonetic) | Some(SimilarityType::Semantic)
        );
        if phonetic_or_semantic && entry.class_match {
            return Some(if entry.goods_services_match {
                "Found a Phonetic or Semantic similar mark with both class match and \
                 goods/services match"
                    .to_string()
            } else {
                "Found a Phonetic or Semantic similar mark with coordinated class match"
                    .to_string()
            });
        }
    }
    None
}

/// Crowded-field numbers over similar and component hits.
///
/// Requires at least one component hit: a skipped or degraded component
/// stage leaves nothing to measure owner diversity against, and the
/// step-down rule must not fire on guesswork.
fn recompute_crowded(
    hits: &HitAnalysis,
    component: Option<&ComponentAnalysis>,
) -> Option<CrowdedFieldStats> {
    let component = component?;
    let component_owners: Vec<&str> = component.all_entries().map(|e| e.owner.as_str()).collect();
    if component_owners.is_empty() {
        return None;
    }
    let similar_owners = hits.similar_marks.iter().map(|e| e.owner.as_str());
    Some(crowded_field_stats(
        component_owners.into_iter().chain(similar_owners),
    ))
}

/// Run the full register analysis for one proposed mark.
///
/// Only input validation can fail; stage-level failures degrade to empty
/// defaults and the pipeline always completes.
pub async fn run_pipeline<B: LlmBackend>(
    backend: &B,
    proposed: &ProposedMark,
    candidates: &[CandidateConflict],
) -> Result<AnalysisOutcome, AnalysisError> {
    validate(proposed, candidates)?;

    let (relevant, excluded_count) = filter_relevant(candidates, &proposed.goods_services);
    tracing::debug!(
        mark = %proposed.name,
        relevant = relevant.len(),
        excluded = excluded_count,
        "Relevance filter applied"
    );

    let raw_hits: HitAnalysis = run_stage(
        backend,
        "hit_analysis",
        &markcounsel_prompt::hit_analysis(proposed, &relevant),
    )
    .await;
    let hits = repair_hit_analysis(&proposed.name, raw_hits);

    let component_skip = component_skip_reason(&hits);
    let component = match &component_skip {
        Some(reason) => {
            tracing::debug!(mark = %proposed.name, reason = %reason, "Component stage skipped");
            None
        }
        None => {
            let raw: ComponentAnalysis = run_stage(
                backend,
                "component_analysis",
                &markcounsel_prompt::component_analysis(proposed, &relevant),
            )
            .await;
            Some(repair_component_analysis(raw))
        }
    };

    let crowded = recompute_crowded(&hits, component.as_ref());

    let raw_risk: RiskAssessment = run_stage(
        backend,
        "risk_assessment",
        &markcounsel_prompt::risk_assessment(
            proposed,
            &hits,
            component.as_ref(),
            component_skip.as_deref(),
        ),
    )
    .await;

    let risk = apply_risk_rules(
        raw_risk,
        &RiskContext {
            has_identical: hits.has_identical(),
            component_skip_reason: component_skip.as_deref(),
            crowded: crowded.as_ref(),
        },
    );

    Ok(AnalysisOutcome {
        relevant,
        excluded_count,
        hits,
        component,
        component_skip_reason: component_skip,
        crowded,
        risk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use markcounsel_backend_azure::BackendError;
    use markcounsel_model::{CompletionRequest, RiskLevel};
    use pretty_assertions::assert_eq;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Deterministic backend stub: pops one scripted response per call.
    struct ScriptedBackend {
        responses: Mutex<VecDeque<Result<String, String>>>,
    }

    impl ScriptedBackend {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: Mutex::new(
                    responses
                        .into_iter()
                        .map(|r| r.map(String::from).map_err(String::from))
                        .collect(),
                ),
            }
        }

        fn failing() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
            }
        }
    }

    impl LlmBackend for ScriptedBackend {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String, BackendError> {
            match self.responses.lock().unwrap().pop_front() {
                Some(Ok(text)) => Ok(text),
                Some(Err(cause)) => Err(BackendError::RequestFailed(cause)),
                None => Err(BackendError::RequestFailed(
                    "HTTP 500: internal server error".to_string(),
                )),
            }
        }

        async fn health_check(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn proposed() -> ProposedMark {
        ProposedMark::new("AQUASHINE", vec![3], "shampoo")
    }

    fn candidates() -> Vec<CandidateConflict> {
        vec![CandidateConflict::new("AQUASHINE", "X")
            .with_goods_services("hair shampoo")
            .with_classes(vec![3])]
    }

    const IDENTICAL_HIT_RESPONSE: &str = r#"```json
{
  "identified_coordinated_classes": [3, 5],
  "coordinated_classes_explanation": "Cosmetics and related preparations.",
  "identical_marks": [
    {"mark": "AQUASHINE", "owner": "X", "goods_services": "hair shampoo",
     "status": "LIVE", "class": "3", "class_match": true, "goods_services_match": true}
  ],
  "similar_marks": [],
  "crowded_field": {"is_crowded": false, "percentage": 0, "explanation": "Single owner."}
}
```"#;

    const EMPTY_COMPONENT_RESPONSE: &str = r#"```json
{"components": [], "crowded_field": {"total_hits": 0, "distinct_owner_percentage": 0, "is_crowded": false, "explanation": "No component hits."}}
```"#;

    const HIGH_RISK_RESPONSE: &str = r#"```json
{
  "likelihood_of_confusion": ["Direct conflict with an identical registered mark."],
  "descriptiveness": ["AQUASHINE is suggestive for hair care."],
  "aggressive_enforcement": {"owners": [], "enforcement_landscape": ["No litigation history found."]},
  "overall_risk": {
    "level_registration": "HIGH", "explanation_registration": "Identical mark.",
    "level_use": "HIGH", "explanation_use": "Identical mark.",
    "crowded_field_percentage": 0, "crowded_field_impact": ""
  }
}
```"#;

    #[tokio::test]
    async fn test_identical_mark_floors_risk_at_medium_high() {
        let backend = ScriptedBackend::new(vec![
            Ok(IDENTICAL_HIT_RESPONSE),
            Ok(EMPTY_COMPONENT_RESPONSE),
            Ok(HIGH_RISK_RESPONSE),
        ]);

        let outcome = run_pipeline(&backend, &proposed(), &candidates())
            .await
            .unwrap();

        assert!(outcome.hits.has_identical());
        assert!(outcome.component.is_some());
        // The model proposed HIGH; the rule layer never goes above MEDIUM-HIGH.
        assert_eq!(
            outcome.risk.overall_risk.level_registration,
            RiskLevel::MediumHigh
        );
        assert_eq!(outcome.risk.overall_risk.level_use, RiskLevel::MediumHigh);
    }

    #[tokio::test]
    async fn test_all_stages_degrade_on_backend_failure() {
        let backend = ScriptedBackend::failing();

        let outcome = run_pipeline(&backend, &proposed(), &candidates())
            .await
            .unwrap();

        assert!(outcome.hits.identical_marks.is_empty());
        assert_eq!(
            outcome.hits.crowded_field.explanation,
            "Unable to determine crowded field status"
        );
        let component = outcome.component.expect("component stage still runs");
        assert!(component.components.is_empty());
        assert!(outcome.crowded.is_none());
        // Degraded risk stage falls to the scale floor, clamped.
        assert_eq!(
            outcome.risk.overall_risk.level_registration,
            RiskLevel::MediumLow
        );
        assert_eq!(
            outcome.risk.likelihood_of_confusion,
            vec!["Unable to determine likelihood of confusion.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_phonetic_class_match_skips_component_stage() {
        let hit_response = r#"```json
{
  "identical_marks": [],
  "similar_marks": [
    {"mark": "AQUASHEEN", "owner": "Y", "goods_services": "shampoo",
     "status": "LIVE", "class": "3", "similarity_type": "Phonetic",
     "class_match": true, "goods_services_match": true}
  ],
  "crowded_field": {"is_crowded": false, "percentage": 0, "explanation": "n/a"}
}
```"#;

        // Only two responses: hit analysis and risk. Component must not call.
        let backend = ScriptedBackend::new(vec![Ok(hit_response), Ok(HIGH_RISK_RESPONSE)]);

        let outcome = run_pipeline(&backend, &proposed(), &candidates())
            .await
            .unwrap();

        assert!(outcome.component.is_none());
        let reason = outcome.component_skip_reason.unwrap();
        assert!(reason.contains("Phonetic or Semantic"));
        assert_eq!(
            outcome.risk.overall_risk.level_registration,
            RiskLevel::MediumHigh
        );
        assert_eq!(outcome.risk.overall_risk.level_use, RiskLevel::MediumHigh);
        // The scripted queue is drained: exactly two calls were made.
        assert!(backend.responses.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_crowded_field_steps_risk_down() {
        let hit_response = r#"```json
{
  "identical_marks": [],
  "similar_marks": [
    {"mark": "AQUAGLOW", "owner": "Alpha", "goods_services": "shampoo",
     "status": "LIVE", "class": "3", "similarity_type": "Functional",
     "class_match": true, "goods_services_match": true}
  ],
  "crowded_field": {"is_crowded": false, "percentage": 0, "explanation": "n/a"}
}
```"#;
        let component_response = r#"```json
{
  "components": [
    {"component": "AQUA", "distinctiveness": "DESCRIPTIVE", "marks": [
      {"mark": "AQUAFRESH", "owner": "Beta", "goods_services": "toothpaste and shampoo",
       "status": "LIVE", "class": "3", "class_match": true, "goods_services_match": true},
      {"mark": "AQUACARE", "owner": "Gamma", "goods_services": "shampoo",
       "status": "LIVE", "class": "3", "class_match": true, "goods_services_match": true}
    ]}
  ],
  "crowded_field": {"total_hits": 2, "distinct_owner_percentage": 100, "is_crowded": true, "explanation": "All owners differ."}
}
```"#;
        let risk_response = r#"```json
{
  "overall_risk": {
    "level_registration": "MEDIUM-HIGH", "explanation_registration": "Similar marks.",
    "level_use": "MEDIUM-HIGH", "explanation_use": "Similar marks.",
    "crowded_field_percentage": 100, "crowded_field_impact": ""
  }
}
```"#;

        let backend = ScriptedBackend::new(vec![
            Ok(hit_response),
            Ok(component_response),
            Ok(risk_response),
        ]);

        let outcome = run_pipeline(&backend, &proposed(), &candidates())
            .await
            .unwrap();

        let crowded = outcome.crowded.unwrap();
        assert_eq!(crowded.total_hits, 3);
        assert!(crowded.is_crowded);
        // MEDIUM-HIGH stepped down exactly once, never LOW.
        assert_eq!(
            outcome.risk.overall_risk.level_registration,
            RiskLevel::MediumLow
        );
        assert_eq!(outcome.risk.overall_risk.level_use, RiskLevel::MediumLow);
    }

    #[tokio::test]
    async fn test_input_validation() {
        let backend = ScriptedBackend::failing();

        let no_name = ProposedMark::new("", vec![3], "shampoo");
        assert!(matches!(
            run_pipeline(&backend, &no_name, &candidates()).await,
            Err(AnalysisError::MissingProposedMarkInfo("name"))
        ));

        let no_goods = ProposedMark::new("AQUASHINE", vec![3], "  ");
        assert!(matches!(
            run_pipeline(&backend, &no_goods, &candidates()).await,
            Err(AnalysisError::MissingProposedMarkInfo("goods_services"))
        ));

        assert!(matches!(
            run_pipeline(&backend, &proposed(), &[]).await,
            Err(AnalysisError::NoCandidateData)
        ));
    }
}
