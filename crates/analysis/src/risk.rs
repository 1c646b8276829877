//! Deterministic risk-adjustment rules.
//!
//! The risk stage proposes levels, but the final conclusion follows fixed
//! business rules layered on top of whatever the model said:
//!
//! - an identical mark forces registration and use risk to exactly
//!   MEDIUM-HIGH (never escalated to HIGH, never lowered)
//! - a phonetic/semantic hit with class overlap presets MEDIUM-HIGH
//! - a crowded field steps the MEDIUM-HIGH starting point down once to
//!   MEDIUM-LOW, never lower
//! - otherwise the model's proposal is kept, clamped into
//!   [MEDIUM-LOW, MEDIUM-HIGH]

use markcounsel_model::{CrowdedFieldStats, RiskAssessment, RiskLevel};

/// Deterministic facts the rules run on, all recomputed in code.
#[derive(Debug, Default)]
pub struct RiskContext<'a> {
    /// Any identical mark survived consistency repair
    pub has_identical: bool,

    /// Skip rule rationale when the component stage was bypassed because of
    /// a phonetic/semantic hit with class overlap
    pub component_skip_reason: Option<&'a str>,

    /// Recomputed crowded-field numbers over similar and component hits
    pub crowded: Option<&'a CrowdedFieldStats>,
}

fn is_crowded(ctx: &RiskContext) -> bool {
    ctx.crowded.map(|c| c.is_crowded).unwrap_or(false)
}

/// Apply the rule layer to a model-proposed assessment.
pub fn apply_risk_rules(mut assessment: RiskAssessment, ctx: &RiskContext) -> RiskAssessment {
    let risk = &mut assessment.overall_risk;

    if let Some(stats) = ctx.crowded {
        risk.crowded_field_percentage = stats.distinct_owner_percentage;
    }

    if ctx.has_identical {
        risk.level_registration = RiskLevel::MediumHigh;
        risk.level_use = RiskLevel::MediumHigh;
        risk.crowded_field_impact =
            "Identical mark present; crowded field percentage does not lower the risk level."
                .to_string();
    } else if let Some(reason) = ctx.component_skip_reason {
        risk.level_registration = RiskLevel::MediumHigh;
        risk.level_use = RiskLevel::MediumHigh;
        risk.explanation_registration = format!("Risk level set to MEDIUM-HIGH: {reason}.");
        risk.explanation_use = format!("Risk level set to MEDIUM-HIGH: {reason}.");
    } else if is_crowded(ctx) {
        let discounted = RiskLevel::MediumHigh.crowded_field_discount();
        risk.level_registration = discounted;
        risk.level_use = discounted;
        risk.crowded_field_impact = format!(
            "No identical marks; crowded field ({:.0}% different owners) reduces risk to {}.",
            risk.crowded_field_percentage, discounted
        );
    } else {
        risk.level_registration = risk.level_registration.clamp_to_policy();
        risk.level_use = risk.level_use.clamp_to_policy();
    }

    assessment
}

/// Web common-law risk is binary: MEDIUM-HIGH on an identical cited term,
/// MEDIUM-LOW otherwise.
pub fn web_risk(has_identical: bool, crowded: Option<&CrowdedFieldStats>) -> (RiskLevel, String) {
    if has_identical {
        return (
            RiskLevel::MediumHigh,
            "Identical cited term(s) found, elevating risk to MEDIUM-HIGH. \
             Crowded field analysis not performed."
                .to_string(),
        );
    }

    match crowded {
        Some(stats) if stats.is_crowded => (
            RiskLevel::MediumLow,
            format!(
                "No identical terms found. Crowded field ({:.0}% different owners) \
                 reduces risk to MEDIUM-LOW.",
                stats.distinct_owner_percentage
            ),
        ),
        _ => (
            RiskLevel::MediumLow,
            "No identical terms and no crowded field, maintaining MEDIUM-LOW risk.".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use markcounsel_model::OverallRisk;
    use pretty_assertions::assert_eq;

    fn proposed(level: RiskLevel) -> RiskAssessment {
        RiskAssessment {
            overall_risk: OverallRisk {
                level_registration: level,
                level_use: level,
                ..OverallRisk::default()
            },
            ..RiskAssessment::default()
        }
    }

    fn crowded_stats(percentage: f32) -> CrowdedFieldStats {
        CrowdedFieldStats {
            total_hits: 10,
            distinct_owners: (percentage / 10.0) as usize,
            distinct_owner_percentage: percentage,
            is_crowded: percentage > 50.0,
        }
    }

    #[test]
    fn test_identical_forces_medium_high_from_above() {
        let ctx = RiskContext {
            has_identical: true,
            ..RiskContext::default()
        };
        let adjusted = apply_risk_rules(proposed(RiskLevel::High), &ctx);
        assert_eq!(
            adjusted.overall_risk.level_registration,
            RiskLevel::MediumHigh
        );
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::MediumHigh);
    }

    #[test]
    fn test_identical_forces_medium_high_from_below() {
        let ctx = RiskContext {
            has_identical: true,
            ..RiskContext::default()
        };
        let adjusted = apply_risk_rules(proposed(RiskLevel::Low), &ctx);
        assert_eq!(
            adjusted.overall_risk.level_registration,
            RiskLevel::MediumHigh
        );
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::MediumHigh);
    }

    #[test]
    fn test_identical_ignores_crowded_field() {
        let stats = crowded_stats(80.0);
        let ctx = RiskContext {
            has_identical: true,
            crowded: Some(&stats),
            ..RiskContext::default()
        };
        let adjusted = apply_risk_rules(proposed(RiskLevel::MediumHigh), &ctx);
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::MediumHigh);
        assert_eq!(adjusted.overall_risk.crowded_field_percentage, 80.0);
    }

    #[test]
    fn test_crowded_field_steps_down_once() {
        let stats = crowded_stats(75.0);
        let ctx = RiskContext {
            crowded: Some(&stats),
            ..RiskContext::default()
        };
        let adjusted = apply_risk_rules(proposed(RiskLevel::MediumHigh), &ctx);
        // One step from MEDIUM-HIGH, never LOW.
        assert_eq!(
            adjusted.overall_risk.level_registration,
            RiskLevel::MediumLow
        );
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::MediumLow);
    }

    #[test]
    fn test_uncrowded_proposal_clamped() {
        let stats = crowded_stats(30.0);
        let ctx = RiskContext {
            crowded: Some(&stats),
            ..RiskContext::default()
        };

        let adjusted = apply_risk_rules(proposed(RiskLevel::High), &ctx);
        assert_eq!(
            adjusted.overall_risk.level_registration,
            RiskLevel::MediumHigh
        );

        let adjusted = apply_risk_rules(proposed(RiskLevel::Low), &ctx);
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::MediumLow);

        let adjusted = apply_risk_rules(proposed(RiskLevel::Medium), &ctx);
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::Medium);
    }

    #[test]
    fn test_component_skip_presets_medium_high() {
        let ctx = RiskContext {
            component_skip_reason: Some("Found a Phonetic or Semantic similar mark with \
                                         coordinated class match"),
            ..RiskContext::default()
        };
        let adjusted = apply_risk_rules(proposed(RiskLevel::Low), &ctx);
        assert_eq!(adjusted.overall_risk.level_use, RiskLevel::MediumHigh);
        assert!(adjusted
            .overall_risk
            .explanation_use
            .contains("MEDIUM-HIGH"));
    }

    #[test]
    fn test_web_risk_rules() {
        let (level, note) = web_risk(true, None);
        assert_eq!(level, RiskLevel::MediumHigh);
        assert!(note.contains("not performed"));

        let stats = crowded_stats(66.0);
        let (level, note) = web_risk(false, Some(&stats));
        assert_eq!(level, RiskLevel::MediumLow);
        assert!(note.contains("66"));

        let stats = crowded_stats(20.0);
        let (level, _) = web_risk(false, Some(&stats));
        assert_eq!(level, RiskLevel::MediumLow);
    }
}
