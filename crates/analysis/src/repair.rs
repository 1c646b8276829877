//! Post-hoc consistency repair of stage classifications.
//!
//! Models are unreliable at exact character counting, so every bucket whose
//! membership is defined by edit distance (identical, one-letter, two-letter,
//! and the merged one_two_letter bucket some responses emit) is rebucketed by
//! the recomputed case-insensitive Levenshtein distance. Judgment calls the
//! model is actually suited for (phonetic/semantic/functional similarity)
//! pass through unchanged.
//!
//! This module is the single source of truth for bucket correctness; no
//! downstream stage may trust bucket membership that has not passed through
//! it.

use markcounsel_features::{mark_distance, phonetic_match};
use markcounsel_model::{
    CitedTermAnalysis, CitedTermEntry, ComponentAnalysis, CrowdedField, DifferenceType, HitAnalysis,
    MarkEntry, SimilarityType, WebComponentAnalysis,
};
use std::collections::HashSet;

const UNKNOWN: &str = "Unknown";

fn backfill_entry(entry: &mut MarkEntry) {
    if entry.mark.trim().is_empty() {
        entry.mark = UNKNOWN.to_string();
    }
    if entry.owner.trim().is_empty() {
        entry.owner = UNKNOWN.to_string();
    }
    if entry.goods_services.trim().is_empty() {
        entry.goods_services = UNKNOWN.to_string();
    }
    if entry.class.trim().is_empty() {
        entry.class = UNKNOWN.to_string();
    }
}

/// Similarity tag for an entry demoted out of the edit-distance tiers.
/// The model's own tag wins; otherwise phonetic codes break the tie.
fn demoted_similarity(proposed: &str, entry: &MarkEntry) -> SimilarityType {
    entry.similarity_type.unwrap_or_else(|| {
        if phonetic_match(proposed, &entry.mark) {
            SimilarityType::Phonetic
        } else {
            SimilarityType::Semantic
        }
    })
}

/// Rebucket every edit-distance claim in a hit analysis and backfill
/// missing fields.
///
/// Distance 0 goes to identical, 1 to one-letter, 2 to two-letter, anything
/// further is demoted to similar. Entries the model already marked similar
/// are passed through (their typing is not second-guessed). A mark name
/// appears in at most one bucket; the first placement in tier order wins.
pub fn repair_hit_analysis(proposed_name: &str, raw: HitAnalysis) -> HitAnalysis {
    let mut corrected = HitAnalysis {
        identified_coordinated_classes: raw.identified_coordinated_classes,
        coordinated_classes_explanation: raw.coordinated_classes_explanation,
        crowded_field: raw.crowded_field,
        ..HitAnalysis::default()
    };

    // Distance-claim buckets are drained and reassigned; the similar bucket
    // keeps its entries as-is.
    let claimed: Vec<MarkEntry> = raw
        .identical_marks
        .into_iter()
        .chain(raw.one_two_letter_marks)
        .chain(raw.one_letter_marks)
        .chain(raw.two_letter_marks)
        .collect();

    for mut entry in claimed {
        backfill_entry(&mut entry);
        match mark_distance(proposed_name, &entry.mark) {
            0 => {
                entry.difference_type = None;
                corrected.identical_marks.push(entry);
            }
            1 => {
                entry.difference_type = Some(DifferenceType::OneLetter);
                corrected.one_letter_marks.push(entry);
            }
            2 => {
                entry.difference_type = Some(DifferenceType::TwoLetter);
                corrected.two_letter_marks.push(entry);
            }
            _ => {
                entry.difference_type = None;
                entry.similarity_type = Some(demoted_similarity(proposed_name, &entry));
                corrected.similar_marks.push(entry);
            }
        }
    }

    for mut entry in raw.similar_marks {
        backfill_entry(&mut entry);
        corrected.similar_marks.push(entry);
    }

    dedupe_buckets(&mut corrected);
    corrected
}

/// Drop repeated mark names across buckets, keeping the first placement in
/// tier order identical > one-letter > two-letter > similar.
fn dedupe_buckets(hits: &mut HitAnalysis) {
    let mut seen: HashSet<String> = HashSet::new();
    for bucket in [
        &mut hits.identical_marks,
        &mut hits.one_letter_marks,
        &mut hits.two_letter_marks,
        &mut hits.similar_marks,
    ] {
        bucket.retain(|entry| seen.insert(entry.mark.trim().to_lowercase()));
    }
}

fn backfill_crowded_field(crowded: &mut CrowdedField) {
    if crowded.explanation.trim().is_empty() {
        crowded.explanation = "Unable to determine crowded field status".to_string();
    }
}

/// Backfill a component analysis: component names, mark fields, and the
/// crowded-field block. Component membership itself is the model's judgment
/// and is left alone.
pub fn repair_component_analysis(mut raw: ComponentAnalysis) -> ComponentAnalysis {
    for (i, component) in raw.components.iter_mut().enumerate() {
        if component.component.trim().is_empty() {
            component.component = format!("Component {}", i + 1);
        }
        for entry in &mut component.marks {
            backfill_entry(entry);
        }
    }
    backfill_crowded_field(&mut raw.crowded_field);
    raw
}

/// Backfill a web component analysis: component names, term fields, and the
/// crowded-field block.
pub fn repair_web_components(mut raw: WebComponentAnalysis) -> WebComponentAnalysis {
    for (i, component) in raw.components.iter_mut().enumerate() {
        if component.component.trim().is_empty() {
            component.component = format!("Component {}", i + 1);
        }
        for entry in &mut component.terms {
            backfill_cited_term(entry);
        }
    }
    backfill_crowded_field(&mut raw.crowded_field);
    raw
}

fn backfill_cited_term(entry: &mut CitedTermEntry) {
    if entry.cited_term.trim().is_empty() {
        entry.cited_term = UNKNOWN.to_string();
    }
    if entry.owner.trim().is_empty() {
        entry.owner = UNKNOWN.to_string();
    }
    if entry.goods_services.trim().is_empty() {
        entry.goods_services = UNKNOWN.to_string();
    }
}

/// Rebucket a cited-term analysis the same way: identical claims and letter
/// difference claims are verified against recomputed distance.
pub fn repair_cited_terms(proposed_name: &str, raw: CitedTermAnalysis) -> CitedTermAnalysis {
    let mut corrected = CitedTermAnalysis::default();

    let claimed: Vec<CitedTermEntry> = raw
        .identical_terms
        .into_iter()
        .chain(raw.letter_difference_terms)
        .collect();

    for mut entry in claimed {
        backfill_cited_term(&mut entry);
        match mark_distance(proposed_name, &entry.cited_term) {
            0 => {
                entry.difference_type = None;
                corrected.identical_terms.push(entry);
            }
            1 => {
                entry.difference_type = Some(DifferenceType::OneLetter);
                corrected.letter_difference_terms.push(entry);
            }
            2 => {
                entry.difference_type = Some(DifferenceType::TwoLetter);
                corrected.letter_difference_terms.push(entry);
            }
            _ => {
                entry.difference_type = None;
                if entry.similarity_type.is_none() {
                    entry.similarity_type = Some(if phonetic_match(proposed_name, &entry.cited_term)
                    {
                        SimilarityType::Phonetic
                    } else {
                        SimilarityType::Semantic
                    });
                }
                corrected.similar_terms.push(entry);
            }
        }
    }

    for mut entry in raw.similar_terms {
        backfill_cited_term(&mut entry);
        corrected.similar_terms.push(entry);
    }

    let mut seen: HashSet<String> = HashSet::new();
    for bucket in [
        &mut corrected.identical_terms,
        &mut corrected.letter_difference_terms,
        &mut corrected.similar_terms,
    ] {
        bucket.retain(|entry| seen.insert(entry.cited_term.trim().to_lowercase()));
    }

    corrected
}
