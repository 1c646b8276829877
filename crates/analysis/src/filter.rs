//! Relevance pre-filter over candidate conflicts.
//!
//! A cheap, explainable substitute for model judgment: candidates whose
//! goods/services have no plausible relation to the proposed goods/services
//! are dropped (and counted) before any LLM stage runs. Deterministic and
//! order-preserving.

use markcounsel_features::{keyword_overlap_ratio, keywords};
use markcounsel_model::CandidateConflict;

/// Minimum keyword-overlap ratio for two goods/services texts to be
/// considered related.
const OVERLAP_THRESHOLD: f32 = 0.30;

/// Check similarity between an existing goods/services text and the
/// proposed one.
fn is_similar_goods_services(existing: &str, proposed: &str) -> bool {
    let existing_lower = existing.to_lowercase();
    let proposed_lower = proposed.to_lowercase();

    if existing_lower == proposed_lower {
        return true;
    }

    if existing_lower.contains(&proposed_lower) || proposed_lower.contains(&existing_lower) {
        return true;
    }

    let existing_keywords = keywords(&existing_lower);
    let proposed_keywords = keywords(&proposed_lower);
    keyword_overlap_ratio(&existing_keywords, &proposed_keywords) > OVERLAP_THRESHOLD
}

/// Partition candidates into the relevant subset and an excluded count.
///
/// Candidates without a goods/services field are always kept: missing data
/// must not silently suppress a potential conflict.
pub fn filter_relevant(
    candidates: &[CandidateConflict],
    proposed_goods_services: &str,
) -> (Vec<CandidateConflict>, usize) {
    let mut relevant = Vec::new();
    let mut excluded_count = 0;

    for candidate in candidates {
        match candidate.goods_services.as_deref() {
            Some(goods) if !is_similar_goods_services(goods, proposed_goods_services) => {
                excluded_count += 1;
            }
            _ => relevant.push(candidate.clone()),
        }
    }

    (relevant, excluded_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(mark: &str, goods: Option<&str>) -> CandidateConflict {
        let c = CandidateConflict::new(mark, "Owner");
        match goods {
            Some(g) => c.with_goods_services(g),
            None => c,
        }
    }

    #[test]
    fn test_exact_and_containment_kept() {
        let candidates = vec![
            candidate("A", Some("shampoo")),
            candidate("B", Some("Hair shampoo and conditioner")),
        ];
        let (relevant, excluded) = filter_relevant(&candidates, "shampoo");
        assert_eq!(relevant.len(), 2);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn test_keyword_overlap_kept() {
        let candidates = vec![candidate(
            "A",
            Some("shampoo, soaps and cleaning preparations"),
        )];
        let (relevant, excluded) =
            filter_relevant(&candidates, "shampoo and conditioner for hair");
        assert_eq!(relevant.len(), 1);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn test_unrelated_excluded() {
        let candidates = vec![
            candidate("A", Some("motor vehicles and engines")),
            candidate("B", Some("hair shampoo")),
        ];
        let (relevant, excluded) = filter_relevant(&candidates, "shampoo");
        assert_eq!(relevant.len(), 1);
        assert_eq!(relevant[0].mark, "B");
        assert_eq!(excluded, 1);
    }

    #[test]
    fn test_missing_goods_services_kept() {
        let candidates = vec![candidate("A", None)];
        let (relevant, excluded) = filter_relevant(&candidates, "shampoo");
        assert_eq!(relevant.len(), 1);
        assert_eq!(excluded, 0);
    }

    #[test]
    fn test_idempotent_on_filtered_set() {
        let candidates = vec![
            candidate("A", Some("hair shampoo")),
            candidate("B", Some("motor oil")),
            candidate("C", None),
        ];
        let (relevant, _) = filter_relevant(&candidates, "shampoo");
        let (again, excluded) = filter_relevant(&relevant, "shampoo");

        assert_eq!(excluded, 0);
        assert_eq!(
            again.iter().map(|c| &c.mark).collect::<Vec<_>>(),
            relevant.iter().map(|c| &c.mark).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_order_preserved() {
        let candidates = vec![
            candidate("Z", Some("shampoo")),
            candidate("A", Some("shampoo")),
            candidate("M", Some("shampoo")),
        ];
        let (relevant, _) = filter_relevant(&candidates, "shampoo");
        let marks: Vec<_> = relevant.iter().map(|c| c.mark.as_str()).collect();
        assert_eq!(marks, vec!["Z", "A", "M"]);
    }
}
