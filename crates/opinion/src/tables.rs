//! Opinion section rendering and table row-filtering.
//!
//! Sections render as markdown pipe tables in a fixed order. The row filter
//! is deterministic: a data row survives only when its class-match or
//! goods/services-match column is true; header and separator rows always
//! pass. Subsections with no qualifying rows render the literal "None".

use markcounsel_model::{
    CitedTermAnalysis, CitedTermEntry, ComponentAnalysis, CrowdedField, CrowdedFieldStats,
    HitAnalysis, MarkEntry, RiskAssessment, WebComponentAnalysis,
};
use std::collections::HashSet;

fn bool_cell(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "None".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!("| {} |\n", headers.join(" | ")));
    out.push_str(&format!(
        "|{}\n",
        headers.iter().map(|_| "---|").collect::<String>()
    ));
    for row in rows {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out.trim_end().to_string()
}

/// Entries that qualify for rendering: class match or goods/services match,
/// and a mark name not already rendered in this section.
fn qualifying<'a>(
    entries: &'a [MarkEntry],
    seen: &mut HashSet<String>,
) -> Vec<&'a MarkEntry> {
    entries
        .iter()
        .filter(|e| e.class_match || e.goods_services_match)
        .filter(|e| seen.insert(e.mark.trim().to_lowercase()))
        .collect()
}

fn base_cells(entry: &MarkEntry) -> Vec<String> {
    vec![
        entry.mark.clone(),
        entry.owner.clone(),
        entry.goods_services.clone(),
        format!("{:?}", entry.status).to_uppercase(),
        entry.class.clone(),
    ]
}

fn render_crowded_block(stats: Option<&CrowdedFieldStats>, reported: &CrowdedField) -> String {
    let (total, distinct, percentage, crowded) = match stats {
        Some(s) => (
            s.total_hits,
            s.distinct_owners,
            s.distinct_owner_percentage,
            s.is_crowded,
        ),
        None => (
            reported.total_hits,
            0,
            reported.distinct_owner_percentage,
            reported.is_crowded,
        ),
    };

    let mut out = String::new();
    out.push_str(&format!("- **Total hits found**: {total}\n"));
    if distinct > 0 {
        out.push_str(&format!(
            "- **Marks with different owners**: {distinct} ({percentage:.0}%)\n"
        ));
    } else {
        out.push_str(&format!(
            "- **Marks with different owners**: {percentage:.0}%\n"
        ));
    }
    out.push_str(&format!(
        "- **Crowded Field Status**: {}\n",
        if crowded { "YES" } else { "NO" }
    ));
    out.push_str(&format!("- **Analysis**: {}", reported.explanation));
    out
}

/// Section I: identical marks, letter-difference marks, similar marks, and
/// the crowded-field overview.
pub fn render_hit_section(hits: &HitAnalysis) -> String {
    let mut seen = HashSet::new();

    let identical: Vec<Vec<String>> = qualifying(&hits.identical_marks, &mut seen)
        .into_iter()
        .map(|e| {
            let mut cells = base_cells(e);
            cells.push(bool_cell(e.class_match).to_string());
            cells.push(bool_cell(e.goods_services_match).to_string());
            cells
        })
        .collect();

    let letters: Vec<Vec<String>> = qualifying(&hits.one_letter_marks, &mut seen)
        .into_iter()
        .chain(qualifying(&hits.two_letter_marks, &mut seen))
        .map(|e| {
            let mut cells = base_cells(e);
            cells.push(
                e.difference_type
                    .map(|d| d.label().to_string())
                    .unwrap_or_default(),
            );
            cells.push(bool_cell(e.class_match).to_string());
            cells.push(bool_cell(e.goods_services_match).to_string());
            cells
        })
        .collect();

    let similar: Vec<Vec<String>> = qualifying(&hits.similar_marks, &mut seen)
        .into_iter()
        .map(|e| {
            let mut cells = base_cells(e);
            cells.push(
                e.similarity_type
                    .map(|s| s.label().to_string())
                    .unwrap_or_default(),
            );
            cells.push(bool_cell(e.class_match).to_string());
            cells.push(bool_cell(e.goods_services_match).to_string());
            cells
        })
        .collect();

    format!(
        "Section I: Comprehensive Trademark Hit Analysis\n\n\
         Coordinated classes: {classes}\n{class_explanation}\n\n\
         (a) Identical Marks:\n{identical}\n\n\
         (b) One Letter and Two Letter Analysis:\n{letters}\n\n\
         (c) Phonetically, Semantically & Functionally Similar Analysis:\n{similar}\n\n\
         (d) Crowded Field Analysis:\n{crowded}",
        classes = if hits.identified_coordinated_classes.is_empty() {
            "None".to_string()
        } else {
            hits.identified_coordinated_classes
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        },
        class_explanation = hits.coordinated_classes_explanation,
        identical = render_table(
            &[
                "Trademark",
                "Owner",
                "Goods & Services",
                "Status",
                "Class",
                "Class Match",
                "Goods & Services Match"
            ],
            &identical
        ),
        letters = render_table(
            &[
                "Trademark",
                "Owner",
                "Goods & Services",
                "Status",
                "Class",
                "Difference Type",
                "Class Match",
                "Goods & Services Match"
            ],
            &letters
        ),
        similar = render_table(
            &[
                "Trademark",
                "Owner",
                "Goods & Services",
                "Status",
                "Class",
                "Similarity Type",
                "Class Match",
                "Goods & Services Match"
            ],
            &similar
        ),
        crowded = render_crowded_block(None, &hits.crowded_field),
    )
}

/// Section II: per-component tables plus the crowded-field overview, or the
/// skip rationale when the stage was bypassed.
pub fn render_component_section(
    component: Option<&ComponentAnalysis>,
    skip_reason: Option<&str>,
    crowded: Option<&CrowdedFieldStats>,
) -> String {
    let Some(component) = component else {
        let reason = skip_reason.unwrap_or("Component analysis unavailable");
        return format!(
            "Section II: Component Analysis\n\n\
             Component analysis skipped: {reason}."
        );
    };

    let mut seen = HashSet::new();
    let mut out = String::from("Section II: Component Analysis\n\n(a) Component Analysis:\n");

    if component.components.is_empty() {
        out.push_str("None\n");
    } else {
        for breakdown in &component.components {
            let rows: Vec<Vec<String>> = qualifying(&breakdown.marks, &mut seen)
                .into_iter()
                .map(|e| {
                    let mut cells = base_cells(e);
                    cells.push(bool_cell(e.class_match).to_string());
                    cells.push(bool_cell(e.goods_services_match).to_string());
                    cells
                })
                .collect();
            out.push_str(&format!(
                "\nComponent: {} ({})\n{}\n",
                breakdown.component,
                breakdown.distinctiveness.label(),
                render_table(
                    &[
                        "Trademark",
                        "Owner",
                        "Goods & Services",
                        "Status",
                        "Class",
                        "Class Match",
                        "Goods & Services Match"
                    ],
                    &rows
                )
            ));
        }
    }

    out.push_str(&format!(
        "\n(b) Crowded Field Analysis:\n{}",
        render_crowded_block(crowded, &component.crowded_field)
    ));
    out
}

/// Section III: risk assessment bullets and the dual risk categories.
pub fn render_risk_section(risk: &RiskAssessment) -> String {
    let bullets = |items: &[String]| -> String {
        if items.is_empty() {
            "- None".to_string()
        } else {
            items
                .iter()
                .map(|i| format!("- {i}"))
                .collect::<Vec<_>>()
                .join("\n")
        }
    };

    let mut enforcement = String::new();
    if risk.aggressive_enforcement.owners.is_empty() {
        enforcement.push_str("- **Known Aggressive Owners**: None\n");
    } else {
        enforcement.push_str("- **Known Aggressive Owners**:\n");
        for owner in &risk.aggressive_enforcement.owners {
            enforcement.push_str(&format!(
                "  * {}: {}\n",
                owner.name,
                owner.enforcement_patterns.join("; ")
            ));
        }
    }
    enforcement.push_str("- **Enforcement Landscape**:\n");
    for point in &risk.aggressive_enforcement.enforcement_landscape {
        enforcement.push_str(&format!("  * {point}\n"));
    }

    let overall = &risk.overall_risk;
    format!(
        "Section III: Risk Assessment and Summary\n\n\
         Likelihood of Confusion:\n{confusion}\n\n\
         Descriptiveness:\n{descriptiveness}\n\n\
         Aggressive Enforcement and Litigious Behavior:\n{enforcement}\n\
         Risk Category for Registration:\n- **{registration}**\n- {registration_explanation}\n\n\
         Risk Category for Use:\n- **{use_level}**\n- {use_explanation}\n\n\
         Crowded Field Impact:\n- {crowded_impact}",
        confusion = bullets(&risk.likelihood_of_confusion),
        descriptiveness = bullets(&risk.descriptiveness),
        enforcement = enforcement,
        registration = overall.level_registration,
        registration_explanation = overall.explanation_registration,
        use_level = overall.level_use,
        use_explanation = overall.explanation_use,
        crowded_impact = if overall.crowded_field_impact.is_empty() {
            "None".to_string()
        } else {
            overall.crowded_field_impact.clone()
        },
    )
}

fn cited_cells(entry: &CitedTermEntry, extra: Option<String>) -> Vec<String> {
    let mut cells = vec![
        entry.cited_term.clone(),
        entry.owner.clone(),
        entry.goods_services.clone(),
    ];
    if let Some(extra) = extra {
        cells.push(extra);
    }
    cells.push(bool_cell(entry.goods_services_match).to_string());
    cells
}

/// Qualifying cited-term rows: goods/services match only, since web records
/// carry no class information.
fn qualifying_terms<'a>(
    entries: &'a [CitedTermEntry],
    seen: &mut HashSet<String>,
) -> Vec<&'a CitedTermEntry> {
    entries
        .iter()
        .filter(|e| e.goods_services_match)
        .filter(|e| seen.insert(e.cited_term.trim().to_lowercase()))
        .collect()
}

/// Section IV: cited-term classification tables.
pub fn render_cited_term_section(cited: &CitedTermAnalysis) -> String {
    let mut seen = HashSet::new();

    let identical: Vec<Vec<String>> = qualifying_terms(&cited.identical_terms, &mut seen)
        .into_iter()
        .map(|e| cited_cells(e, None))
        .collect();

    let letters: Vec<Vec<String>> = qualifying_terms(&cited.letter_difference_terms, &mut seen)
        .into_iter()
        .map(|e| {
            cited_cells(
                e,
                Some(
                    e.difference_type
                        .map(|d| d.label().to_string())
                        .unwrap_or_default(),
                ),
            )
        })
        .collect();

    let similar: Vec<Vec<String>> = qualifying_terms(&cited.similar_terms, &mut seen)
        .into_iter()
        .map(|e| {
            cited_cells(
                e,
                Some(
                    e.similarity_type
                        .map(|s| s.label().to_string())
                        .unwrap_or_default(),
                ),
            )
        })
        .collect();

    format!(
        "Section IV: Comprehensive Cited Term Analysis\n\n\
         (a) Identical Cited Terms:\n{identical}\n\n\
         (b) One Letter and Two Letter Analysis:\n{letters}\n\n\
         (c) Phonetically, Semantically & Functionally Similar Analysis:\n{similar}",
        identical = render_table(
            &["Cited Term", "Owner", "Goods & Services", "Goods & Services Match"],
            &identical
        ),
        letters = render_table(
            &[
                "Cited Term",
                "Owner",
                "Goods & Services",
                "Difference Type",
                "Goods & Services Match"
            ],
            &letters
        ),
        similar = render_table(
            &[
                "Cited Term",
                "Owner",
                "Goods & Services",
                "Similarity Type",
                "Goods & Services Match"
            ],
            &similar
        ),
    )
}

/// Section V: web component tables, or the fixed omission note.
pub fn render_web_component_section(
    component: Option<&WebComponentAnalysis>,
    crowded: Option<&CrowdedFieldStats>,
) -> String {
    let Some(component) = component else {
        return "Section V omitted due to identical cited terms".to_string();
    };

    let mut seen = HashSet::new();
    let mut out = String::from("Section V: Component Analysis\n\n(a) Component Analysis:\n");

    if component.components.is_empty() {
        out.push_str("None\n");
    } else {
        for breakdown in &component.components {
            let rows: Vec<Vec<String>> = qualifying_terms(&breakdown.terms, &mut seen)
                .into_iter()
                .map(|e| cited_cells(e, None))
                .collect();
            out.push_str(&format!(
                "\nComponent: {}\n{}\n",
                breakdown.component,
                render_table(
                    &["Cited Term", "Owner", "Goods & Services", "Goods & Services Match"],
                    &rows
                )
            ));
        }
    }

    out.push_str(&format!(
        "\n(b) Crowded Field Analysis:\n{}",
        render_crowded_block(crowded, &component.crowded_field)
    ));
    out
}

/// Deterministic defensive row-filter over rendered (or reformatted) text.
///
/// Data rows whose match columns are both false are dropped; header rows,
/// separator rows, and non-table lines pass through. Applied again after the
/// reformat pass because that stage can reintroduce previously-dropped rows.
pub fn filter_table_rows(text: &str) -> String {
    let mut kept = Vec::new();

    for line in text.lines() {
        if !line.contains('|') {
            kept.push(line);
            continue;
        }

        let cells: Vec<&str> = line
            .split('|')
            .map(str::trim)
            .skip_while(|c| c.is_empty())
            .collect();
        let cells: Vec<&str> = cells
            .iter()
            .rev()
            .skip_while(|c| c.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        // Short fragments and separator rows pass through.
        if cells.len() < 4 || cells.iter().all(|c| c.chars().all(|ch| "-: ".contains(ch))) {
            kept.push(line);
            continue;
        }

        // Header rows pass through.
        if cells.iter().any(|c| {
            ["Trademark", "Cited Term", "Class Match", "Goods & Services Match"].contains(c)
        }) {
            kept.push(line);
            continue;
        }

        // Data rows: the match columns are the trailing cells.
        let tail = &cells[cells.len().saturating_sub(2)..];
        if tail.iter().any(|c| c.to_lowercase().contains("true")) {
            kept.push(line);
        }
    }

    kept.join("\n")
}
