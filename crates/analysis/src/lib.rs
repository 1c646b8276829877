//! Staged trademark conflict analysis.
//!
//! The pipeline combines deterministic pre-filtering with LLM-driven
//! classification stages and deterministic post-rules:
//!
//! - [`filter`]: keyword-overlap relevance pre-filter, run before any model
//!   call to bound cost
//! - [`stage`]: the reusable prompt-analysis stage runner; every stage is
//!   total and degrades to a typed empty default on failure
//! - [`repair`]: consistency repair that rebuckets edit-distance claims by
//!   recomputed Levenshtein distance and backfills missing fields
//! - [`crowd`]: deterministic crowded-field arithmetic
//! - [`risk`]: the rule layer applied on top of model-proposed risk levels
//! - [`orchestrator`]: the register pipeline state machine
//! - [`web`]: the web common-law variant with its own skip rule

pub mod crowd;
pub mod filter;
pub mod orchestrator;
pub mod repair;
pub mod risk;
pub mod stage;
pub mod web;

pub use crowd::crowded_field_stats;
pub use filter::filter_relevant;
pub use orchestrator::{run_pipeline, AnalysisOutcome};
pub use repair::{
    repair_cited_terms, repair_component_analysis, repair_hit_analysis, repair_web_components,
};
pub use risk::{apply_risk_rules, web_risk, RiskContext};
pub use stage::{run_stage, run_text_stage};
pub use web::{run_web_pipeline, WebOutcome};
