//! String primitives for trademark analysis.
//!
//! Pure functions with no I/O:
//! - Levenshtein edit distance and the one-/two-letter predicates
//! - Text normalization and keyword extraction
//! - Phonetic encodings (Soundex, Metaphone)
//!
//! Edit distance is the truth source that overrides the model's self-reported
//! identical/one-letter/two-letter claims; phonetic codes break the tie when
//! a demoted entry needs a similarity tag.

use rphonetic::{Encoder, Metaphone, Soundex};
use std::collections::HashSet;

/// Compute Levenshtein edit distance between two strings.
///
/// Case-sensitive by contract; callers normalize case first. Total over any
/// two finite strings, including empty ones.
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    let s1: Vec<char> = s1.chars().collect();
    let s2: Vec<char> = s2.chars().collect();
    let len1 = s1.len();
    let len2 = s2.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];

    for i in 0..=len1 {
        matrix[i][0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1[i - 1] == s2[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}

/// Case-insensitive edit distance between two mark names.
pub fn mark_distance(a: &str, b: &str) -> usize {
    edit_distance(&a.to_lowercase(), &b.to_lowercase())
}

/// True iff the marks differ by exactly one letter (case-insensitive).
pub fn one_letter_difference(a: &str, b: &str) -> bool {
    mark_distance(a, b) == 1
}

/// True iff the marks differ by exactly two letters (case-insensitive).
///
/// Exactly two, not "at most": distance-0 and distance-1 pairs belong to the
/// more specific tiers and must not be double-counted here.
pub fn two_letter_difference(a: &str, b: &str) -> bool {
    mark_distance(a, b) == 2
}

/// Normalize text for comparison: uppercase, strip punctuation, collapse
/// whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Stop words removed before keyword-overlap comparison of goods/services.
const STOP_WORDS: &[&str] = &[
    "and", "or", "the", "a", "an", "in", "on", "for", "of", "to", "with",
];

/// Extract the significant keyword set from a goods/services description.
pub fn keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

/// Overlap ratio between two keyword sets: intersection size divided by the
/// smaller set's size. Zero when either set is empty.
pub fn keyword_overlap_ratio(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let overlap = a.intersection(b).count();
    overlap as f32 / a.len().min(b.len()) as f32
}

/// Phonetic encoding results for a mark.
#[derive(Debug, Clone, Default)]
pub struct PhoneticCodes {
    pub soundex: Option<String>,
    pub metaphone: Option<String>,
}

/// Compute phonetic encodings for a mark text.
pub fn compute_phonetics(text: &str) -> PhoneticCodes {
    let soundex = Soundex::default();
    let metaphone = Metaphone::default();

    let soundex_code = soundex.encode(text);
    let metaphone_code = metaphone.encode(text);

    PhoneticCodes {
        soundex: if soundex_code.is_empty() {
            None
        } else {
            Some(soundex_code)
        },
        metaphone: if metaphone_code.is_empty() {
            None
        } else {
            Some(metaphone_code)
        },
    }
}

/// Check if two texts are phonetically similar under Soundex or Metaphone.
pub fn phonetic_match(text1: &str, text2: &str) -> bool {
    let codes1 = compute_phonetics(text1);
    let codes2 = compute_phonetics(text2);

    if let (Some(s1), Some(s2)) = (&codes1.soundex, &codes2.soundex) {
        if s1 == s2 {
            return true;
        }
    }

    if let (Some(m1), Some(m2)) = (&codes1.metaphone, &codes2.metaphone) {
        if m1 == m2 {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_basics() {
        assert_eq!(edit_distance("CAT", "CAT"), 0);
        assert_eq!(edit_distance("CAT", "CAR"), 1);
        assert_eq!(edit_distance("CAT", "DOG"), 3);
        assert_eq!(edit_distance("", "NIKE"), 4);
        assert_eq!(edit_distance("", ""), 0);
    }

    #[test]
    fn test_edit_distance_symmetric() {
        for (a, b) in [("AQUASHINE", "AQUASHIN"), ("FRESH", "FLESH"), ("", "X")] {
            assert_eq!(edit_distance(a, b), edit_distance(b, a));
        }
    }

    #[test]
    fn test_letter_difference_predicates() {
        assert!(one_letter_difference("NIKE", "NYKE"));
        assert!(one_letter_difference("Nike", "NIKES"));
        assert!(!one_letter_difference("NIKE", "NIKE"));

        assert!(two_letter_difference("NIKE", "MIKES"));
        assert!(!two_letter_difference("NIKE", "NYKE"));
        assert!(!two_letter_difference("NIKE", "ADIDAS"));
    }

    #[test]
    fn test_mark_distance_case_insensitive() {
        assert_eq!(mark_distance("AquaShine", "AQUASHINE"), 0);
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello,  World!  "), "HELLO WORLD");
        assert_eq!(normalize_text("ACME Inc."), "ACME INC");
    }

    #[test]
    fn test_keywords_drop_stop_words() {
        let kw = keywords("Shampoo and conditioner for the hair");
        assert!(kw.contains("shampoo"));
        assert!(kw.contains("conditioner"));
        assert!(kw.contains("hair"));
        assert!(!kw.contains("and"));
        assert!(!kw.contains("the"));
        assert!(!kw.contains("for"));
    }

    #[test]
    fn test_keyword_overlap_ratio() {
        let a = keywords("hair shampoo");
        let b = keywords("shampoo");
        assert_eq!(keyword_overlap_ratio(&a, &b), 1.0);

        let c = keywords("motor oil");
        assert_eq!(keyword_overlap_ratio(&a, &c), 0.0);
        assert_eq!(keyword_overlap_ratio(&a, &HashSet::new()), 0.0);
    }

    #[test]
    fn test_phonetic_match() {
        assert!(phonetic_match("SMITH", "SMYTH"));
        assert!(phonetic_match("NIKE", "NYKE"));
        assert!(!phonetic_match("NIKE", "ADIDAS"));
    }
}
