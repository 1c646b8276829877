//! Stage instruction building and response payload extraction.
//!
//! Each analysis stage sends a system + user message pair that spells out the
//! exact JSON contract expected back. Builders here translate stage inputs
//! into `CompletionRequest`s; `extract_json_block` recovers the JSON payload
//! from the free-form text that comes back.
//!
//! Payloads are always parsed strictly with `serde_json`. Responses that do
//! not contain a parseable object are dropped by the caller, never evaluated
//! or repaired by hand.

use markcounsel_model::{
    CandidateConflict, CitationRecord, CitedTermAnalysis, CompletionRequest, ComponentAnalysis,
    HitAnalysis, ProposedMark, WebComponentAnalysis,
};

/// Locate the JSON object embedded in a model response.
///
/// Two-pattern search: a fenced ```json code block wins; otherwise the first
/// brace-matched object found by a depth-aware scan (string literals and
/// escapes are honored, so braces inside values do not confuse the match).
pub fn extract_json_block(text: &str) -> Option<&str> {
    if let Some(fenced) = extract_fenced(text) {
        return Some(fenced);
    }
    extract_braced(text)
}

fn extract_fenced(text: &str) -> Option<&str> {
    for fence in ["```json", "```JSON"] {
        if let Some(start) = text.find(fence) {
            let body = &text[start + fence.len()..];
            if let Some(end) = body.find("```") {
                let candidate = body[..end].trim();
                if !candidate.is_empty() {
                    return Some(candidate);
                }
            }
        }
    }
    None
}

fn extract_braced(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn class_list(proposed: &ProposedMark) -> String {
    proposed
        .classes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn conflicts_json(conflicts: &[CandidateConflict]) -> String {
    serde_json::to_string_pretty(conflicts).unwrap_or_else(|_| "[]".to_string())
}

fn citations_text(records: &[CitationRecord]) -> String {
    records
        .iter()
        .map(|r| {
            format!(
                "Cited_term: {}, Owner_name: {}, Goods_&_services: {}",
                r.cited_term, r.owner, r.goods_services
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

const HIT_ANALYSIS_SYSTEM: &str = r#"You are a highly experienced trademark attorney specializing in trademark conflict analysis and opinion writing. Assess potential conflicts against the proposed mark step by step:

STEP 1 - COORDINATED CLASS ANALYSIS: from the proposed goods/services, determine which additional trademark classes are coordinated or related to the primary class, with justification, and produce the final class list for the conflict assessment.

STEP 2 - IDENTICAL MARK ANALYSIS: identify trademarks that EXACTLY match the proposed mark (case-insensitive). For each, assess same-class registration, coordinated-class registration, and goods/services overlap.

STEP 3 - ONE LETTER DIFFERENCE ANALYSIS: identify marks that differ by exactly ONE letter (substitution, addition, or deletion).

STEP 4 - TWO LETTER DIFFERENCE ANALYSIS: identify marks that differ by exactly TWO letters (substitutions, additions, deletions, or a combination).

STEP 5 - SIMILAR MARK ANALYSIS: identify marks similar to the proposed mark phonetically (sound when spoken), semantically (meaning and mental associations), or functionally (overall commercial impression), considering dominant elements consumers remember.

STEP 6 - CROWDED FIELD ANALYSIS: count the potentially conflicting marks, calculate the percentage with different owners, and determine whether the field is crowded (more than 50% different owners).

For each conflicting mark include: exact mark name, owner name, FULL goods/services description, registration status (LIVE/DEAD), class number, class_match (true/false), goods_services_match (true/false). class_match is true for the same class OR any coordinated class from Step 1.

FORMAT YOUR RESPONSE STRICTLY IN JSON:

{
  "identified_coordinated_classes": [CLASS NUMBERS],
  "coordinated_classes_explanation": "[EXPLANATION]",
  "identical_marks": [
    {"mark": "", "owner": "", "goods_services": "", "status": "LIVE|DEAD", "class": "", "class_match": true, "goods_services_match": true}
  ],
  "one_letter_marks": [
    {"mark": "", "owner": "", "goods_services": "", "status": "LIVE|DEAD", "class": "", "difference_type": "One Letter", "class_match": true, "goods_services_match": true}
  ],
  "two_letter_marks": [
    {"mark": "", "owner": "", "goods_services": "", "status": "LIVE|DEAD", "class": "", "difference_type": "Two Letter", "class_match": true, "goods_services_match": true}
  ],
  "similar_marks": [
    {"mark": "", "owner": "", "goods_services": "", "status": "LIVE|DEAD", "class": "", "similarity_type": "Phonetic|Semantic|Functional", "class_match": true, "goods_services_match": true}
  ],
  "crowded_field": {"is_crowded": false, "percentage": 0, "explanation": ""}
}"#;

/// Section I: coordinated-class discovery and hit classification.
pub fn hit_analysis(proposed: &ProposedMark, conflicts: &[CandidateConflict]) -> CompletionRequest {
    let user = format!(
        "Proposed Trademark: {name}\n\
         Class: {classes}\n\
         Goods/Services: {goods}\n\n\
         Trademark Conflicts:\n{conflicts}\n\n\
         Analyze ONLY Section I: Comprehensive Trademark Hit Analysis, step by step.\n\n\
         IMPORTANT REMINDERS:\n\
         - Focus on the full trademark, not just partial or component words.\n\
         - Always include full owner names and full goods/services descriptions.\n\
         - class_match is true for class {classes} OR any coordinated class from Step 1.\n\
         - Letter difference analysis must be exact: exactly one or exactly two letters.\n\
         - Label each similar mark with its similarity type: Phonetic, Semantic, or Functional.",
        name = proposed.name,
        classes = class_list(proposed),
        goods = proposed.goods_services,
        conflicts = conflicts_json(conflicts),
    );
    CompletionRequest::new(HIT_ANALYSIS_SYSTEM, user)
}

const COMPONENT_ANALYSIS_SYSTEM: &str = r#"You are a trademark attorney and expert in trademark opinion writing, conducting a component (formative) analysis for a proposed trademark.

Requirements:
(a) Break the proposed trademark into individual components (if compound).
(b) For each component, identify conflict marks that incorporate that component.
(c) For each conflict provide: full mark, owner name, FULL goods/services description, class number, registration status (LIVE/DEAD), class_match (same or coordinated class), goods_services_match (similar or overlapping goods/services).
(d) Rate each component's distinctiveness: GENERIC, DESCRIPTIVE, SUGGESTIVE, ARBITRARY, or FANCIFUL.

Coordinated class analysis is mandatory: identify related classes beyond exact matches (for example Food & Beverage: 29, 30, 31, 32, 35, 43; Fashion: 18, 25, 35; Technology/Software: 9, 38, 42; Health/Beauty: 3, 5, 44) and set class_match = true for marks in any of them.

Crowded field analysis: count the total component hits, the percentage owned by distinct owners, and whether the field is crowded (more than 50% different owners).

OUTPUT FORMAT (JSON ONLY):

{
  "identified_coordinated_classes": [CLASS NUMBERS],
  "coordinated_classes_explanation": "[EXPLANATION]",
  "components": [
    {
      "component": "",
      "distinctiveness": "GENERIC|DESCRIPTIVE|SUGGESTIVE|ARBITRARY|FANCIFUL",
      "marks": [
        {"mark": "", "owner": "", "goods_services": "", "status": "LIVE|DEAD", "class": "", "class_match": true, "goods_services_match": true}
      ]
    }
  ],
  "crowded_field": {"total_hits": 0, "distinct_owner_percentage": 0, "is_crowded": false, "explanation": ""}
}

Sort the conflicting marks alphabetically under each component."#;

/// Section II: formative component decomposition.
pub fn component_analysis(
    proposed: &ProposedMark,
    conflicts: &[CandidateConflict],
) -> CompletionRequest {
    let user = format!(
        "Proposed Trademark: {name}\n\
         Class: {classes}\n\
         Goods/Services: {goods}\n\n\
         Trademark Conflicts:\n{conflicts}\n\n\
         Analyze ONLY Section II: Component Analysis.\n\n\
         Set class_match = true when the conflicting mark is in class {classes} or in a \
         coordinated class for the proposed goods/services. Set goods_services_match = true \
         when its goods/services are similar or overlapping. Include the full goods/services \
         text for every mark; never summarize it away.",
        name = proposed.name,
        classes = class_list(proposed),
        goods = proposed.goods_services,
        conflicts = conflicts_json(conflicts),
    );
    CompletionRequest::new(COMPONENT_ANALYSIS_SYSTEM, user)
}

const RISK_ASSESSMENT_SYSTEM: &str = r#"You are a trademark expert attorney specializing in trademark opinion writing. Analyze the Section I and Section II results to produce the risk assessment and summary covering:

1. Likelihood of confusion: consumer confusion potential, exact and coordinated class conflicts, phonetic/visual/conceptual similarity, overlapping goods/services.
2. Descriptiveness: whether the proposed mark is descriptive for its goods/services, and whether conflicts suggest a common industry term.
3. Aggressive enforcement: owners with a history of oppositions, cease-and-desist activity, or broad portfolios, plus the overall enforcement landscape.
4. Overall risk, rated separately for Registration and Use:
   - Identical marks present: MEDIUM-HIGH for both, regardless of crowded field percentage.
   - No identical marks but similar marks found: start at MEDIUM-HIGH; in a crowded field (more than 50% different owners) reduce by one level (MEDIUM-HIGH to MEDIUM-LOW), never below MEDIUM-LOW.
   - Never increase risk to HIGH, even with identical marks present.

Your output MUST be returned in the following JSON format:

{
  "likelihood_of_confusion": ["[KEY POINT]"],
  "descriptiveness": ["[KEY POINT]"],
  "aggressive_enforcement": {
    "owners": [{"name": "", "enforcement_patterns": [""]}],
    "enforcement_landscape": [""]
  },
  "overall_risk": {
    "level_registration": "MEDIUM-HIGH",
    "explanation_registration": "",
    "level_use": "MEDIUM-HIGH",
    "explanation_use": "",
    "crowded_field_percentage": 0,
    "crowded_field_impact": ""
  }
}"#;

/// Section III: risk assessment over the prior stages' corrected output.
///
/// `component` is absent when the component stage was skipped; `skip_reason`
/// carries the rationale recorded by the orchestrator in that case.
pub fn risk_assessment(
    proposed: &ProposedMark,
    hits: &HitAnalysis,
    component: Option<&ComponentAnalysis>,
    skip_reason: Option<&str>,
) -> CompletionRequest {
    let hits_json = serde_json::to_string_pretty(hits).unwrap_or_else(|_| "{}".to_string());
    let mut user = format!(
        "Proposed Trademark: {name}\n\
         Class: {classes}\n\
         Goods and Services: {goods}\n\n\
         Section I Results:\n{hits_json}\n",
        name = proposed.name,
        classes = class_list(proposed),
        goods = proposed.goods_services,
    );

    match (component, skip_reason) {
        (Some(component), _) => {
            let component_json =
                serde_json::to_string_pretty(component).unwrap_or_else(|_| "{}".to_string());
            user.push_str(&format!(
                "\nSection II Results:\n{component_json}\n\n\
                 Create Section III: Risk Assessment and Summary. Focus the discussion on \
                 crowded field analysis and identical marks, and include the crowded field \
                 percentage in the overall risk block."
            ));
        }
        (None, reason) => {
            user.push_str(&format!(
                "\nSPECIAL INSTRUCTION: Section II analysis was skipped because: {}. \
                 Set the risk level to MEDIUM-HIGH for both Registration and Use and explain \
                 that the level follows from the similar mark identified in Section I.",
                reason.unwrap_or("component analysis was unavailable")
            ));
        }
    }

    CompletionRequest::new(RISK_ASSESSMENT_SYSTEM, user)
}

const CITED_TERM_SYSTEM: &str = r#"You are a trademark attorney analyzing web common law trademark data. Classify every cited term against the proposed trademark:

1. Identical cited terms (exact match, case-insensitive)
2. One and two letter differences (exactly one or exactly two characters changed, added, or removed)
3. Phonetically, semantically, or functionally similar terms

For each term determine goods_services_match: whether its goods/services overlap with the proposed trademark's intended use.

FORMAT YOUR RESPONSE STRICTLY IN JSON:

{
  "identical_terms": [
    {"cited_term": "", "owner": "", "goods_services": "", "goods_services_match": true}
  ],
  "letter_difference_terms": [
    {"cited_term": "", "owner": "", "goods_services": "", "difference_type": "One Letter|Two Letter", "goods_services_match": true}
  ],
  "similar_terms": [
    {"cited_term": "", "owner": "", "goods_services": "", "similarity_type": "Phonetic|Semantic|Functional", "goods_services_match": true}
  ]
}"#;

/// Section IV: cited-term classification for the web common-law variant.
pub fn cited_term_analysis(proposed_name: &str, records: &[CitationRecord]) -> CompletionRequest {
    let user = format!(
        "Proposed Trademark: {proposed_name}\n\n\
         Extracted Web Common Law Data:\n{data}\n\n\
         Perform the comprehensive cited term analysis against the proposed trademark.",
        data = citations_text(records),
    );
    CompletionRequest::new(CITED_TERM_SYSTEM, user)
        .with_temperature(0.1)
        .with_max_tokens(2000)
}

const WEB_COMPONENT_SYSTEM: &str = r#"You are a trademark attorney analyzing web common law components. Break the proposed trademark into components (if compound) and, for each component, list the cited terms that incorporate it, with owner, FULL goods/services text, and goods_services_match. Then provide a crowded field overview: total component hits, percentage of terms with different owners, and whether the field is crowded (more than 50% different owners).

FORMAT YOUR RESPONSE STRICTLY IN JSON:

{
  "components": [
    {
      "component": "",
      "terms": [
        {"cited_term": "", "owner": "", "goods_services": "", "goods_services_match": true}
      ]
    }
  ],
  "crowded_field": {"total_hits": 0, "distinct_owner_percentage": 0, "is_crowded": false, "explanation": ""}
}"#;

/// Section V: web component analysis. Only issued when no identical cited
/// term exists; the orchestrator enforces the skip.
pub fn web_component_analysis(
    proposed_name: &str,
    records: &[CitationRecord],
) -> CompletionRequest {
    let user = format!(
        "Proposed Trademark: {proposed_name}\n\n\
         Extracted Web Common Law Data:\n{data}\n\n\
         Perform the component analysis and crowded field assessment.",
        data = citations_text(records),
    );
    CompletionRequest::new(WEB_COMPONENT_SYSTEM, user)
        .with_temperature(0.1)
        .with_max_tokens(2000)
}

const WEB_RISK_SYSTEM: &str = r#"You are a senior trademark attorney preparing a final web common law risk assessment. Summarize the market presence of the cited terms and any concerning enforcement patterns among their owners. Do not assign a risk level; the level is determined separately by fixed rules.

FORMAT YOUR RESPONSE STRICTLY IN JSON:

{
  "market_presence": ["[KEY POINT]"],
  "enforcement_patterns": ["[KEY POINT]"]
}"#;

/// Section VI narrative bullets over the corrected Sections IV and V.
pub fn web_risk_narrative(
    proposed_name: &str,
    cited: &CitedTermAnalysis,
    component: Option<&WebComponentAnalysis>,
) -> CompletionRequest {
    let cited_json = serde_json::to_string_pretty(cited).unwrap_or_else(|_| "{}".to_string());
    let component_json = component
        .and_then(|c| serde_json::to_string_pretty(c).ok())
        .unwrap_or_else(|| "Section V omitted due to identical cited terms".to_string());
    let user = format!(
        "Proposed Trademark: {proposed_name}\n\n\
         Cited Term Analysis:\n{cited_json}\n\n\
         Component Analysis:\n{component_json}",
    );
    CompletionRequest::new(WEB_RISK_SYSTEM, user)
        .with_temperature(0.1)
        .with_max_tokens(1500)
}

const REFORMAT_SYSTEM: &str = r#"You are a trademark attorney specializing in clear, comprehensive trademark opinions. Reformat the provided opinion using exactly this structure:

REFINED TRADEMARK OPINION: [MARK NAME]
Class: [Class Number]
Goods and Services: [Goods/Services Description]

Section I: Comprehensive Trademark Hit Analysis
(a) Identical Marks:
| Trademark | Owner | Goods & Services | Status | Class | Class Match | Goods & Services Match |
(b) One Letter and Two Letter Analysis:
| Trademark | Owner | Goods & Services | Status | Class | Difference Type | Class Match | Goods & Services Match |
(c) Phonetically, Semantically & Functionally Similar Analysis:
| Trademark | Owner | Goods & Services | Status | Class | Similarity Type | Class Match | Goods & Services Match |

Section II: Component Analysis
(a) Component Analysis (one table per component)
(b) Crowded Field Analysis (counts, percentage, status, analysis)

Section III: Risk Assessment and Summary
Descriptiveness, Aggressive Enforcement and Litigious Behavior, Risk Category for Registration, Risk Category for Use.

RULES:
1. Maintain ALL unique trademark references; avoid redundancy.
2. Keep full goods/services text in the tables; never replace it with class numbers.
3. State "None" when a subsection has no results.
4. Do NOT include recommendations.
5. Keep the risk category lines exactly as given in the original opinion."#;

/// Final reformat pass. Plain text in, plain text out; the caller re-applies
/// the table row-filter to whatever comes back.
pub fn reformat_opinion(
    proposed: &ProposedMark,
    excluded_count: usize,
    opinion_text: &str,
) -> CompletionRequest {
    let user = format!(
        "Please reformat the following comprehensive trademark opinion according to the refined structure:\n\n\
         Proposed Trademark: {name}\n\
         Class: {classes}\n\
         Goods and Services: {goods}\n\n\
         Note: {excluded_count} trademarks with unrelated goods/services were excluded from this analysis.\n\n\
         Original Opinion:\n{opinion_text}",
        name = proposed.name,
        classes = class_list(proposed),
        goods = proposed.goods_services,
    );
    CompletionRequest::new(REFORMAT_SYSTEM, user)
}
