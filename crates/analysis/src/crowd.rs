//! Deterministic crowded-field arithmetic.
//!
//! Models are unreliable at counting, so the hit totals and distinct-owner
//! percentage are always recomputed in code from the classified entries.
//! Only the explanation prose in a stage's crowded-field block is taken from
//! the model.

use markcounsel_model::CrowdedFieldStats;

/// Percentage of distinct owners above which a field counts as crowded.
const CROWDED_THRESHOLD: f32 = 50.0;

/// Recompute crowded-field statistics from the owners of a hit set.
///
/// Owner names are compared case-insensitively; missing owners collapse into
/// a single "unknown" bucket so they cannot inflate diversity.
pub fn crowded_field_stats<'a>(owners: impl Iterator<Item = &'a str>) -> CrowdedFieldStats {
    let mut total_hits = 0usize;
    let mut distinct = std::collections::HashSet::new();

    for owner in owners {
        total_hits += 1;
        let key = owner.trim().to_lowercase();
        if key.is_empty() || key == "unknown" {
            distinct.insert("unknown".to_string());
        } else {
            distinct.insert(key);
        }
    }

    let distinct_owners = distinct.len();
    let distinct_owner_percentage = if total_hits == 0 {
        0.0
    } else {
        distinct_owners as f32 / total_hits as f32 * 100.0
    };

    CrowdedFieldStats {
        total_hits,
        distinct_owners,
        distinct_owner_percentage,
        is_crowded: total_hits > 0 && distinct_owner_percentage > CROWDED_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_field_not_crowded() {
        let stats = crowded_field_stats(std::iter::empty());
        assert_eq!(stats.total_hits, 0);
        assert!(!stats.is_crowded);
    }

    #[test]
    fn test_majority_distinct_owners_crowded() {
        let owners = ["Acme", "Beta LLC", "Gamma Co", "Acme"];
        let stats = crowded_field_stats(owners.iter().copied());
        assert_eq!(stats.total_hits, 4);
        assert_eq!(stats.distinct_owners, 3);
        assert_eq!(stats.distinct_owner_percentage, 75.0);
        assert!(stats.is_crowded);
    }

    #[test]
    fn test_single_owner_not_crowded() {
        let owners = ["Acme", "ACME", "acme "];
        let stats = crowded_field_stats(owners.iter().copied());
        assert_eq!(stats.distinct_owners, 1);
        assert!(!stats.is_crowded);
    }

    #[test]
    fn test_exactly_half_not_crowded() {
        let owners = ["A", "A", "B", "B"];
        let stats = crowded_field_stats(owners.iter().copied());
        assert_eq!(stats.distinct_owner_percentage, 50.0);
        assert!(!stats.is_crowded);
    }

    #[test]
    fn test_unknown_owners_collapse() {
        let owners = ["", "Unknown", "  ", "Acme"];
        let stats = crowded_field_stats(owners.iter().copied());
        assert_eq!(stats.distinct_owners, 2);
    }
}
