//! Core domain model for markcounsel trademark opinion generation.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `ProposedMark` / `CandidateConflict`: the inputs to one analysis run
//! - `MarkEntry` and the classification buckets produced by hit analysis
//! - `RiskLevel` and the deterministic adjustment rules layered on model output
//! - Stage result types (`HitAnalysis`, `ComponentAnalysis`, `RiskAssessment`)
//! - `CompletionRequest`, the message pair sent to the LLM backend
//! - `OpinionDocument`, the assembled artifact consumed by document export
//!
//! Stage result types deserialize from model-produced JSON, so every field is
//! lenient: missing keys take defaults and enum-like strings are parsed
//! case-insensitively instead of failing the whole payload.

use serde::de::{Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Status of a trademark registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrademarkStatus {
    /// Active registration
    Live,
    /// Cancelled, expired, or abandoned
    Dead,
    /// Application in progress
    Pending,
    /// Unknown status
    Unknown,
}

impl Default for TrademarkStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl From<&str> for TrademarkStatus {
    fn from(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "LIVE" => Self::Live,
            "DEAD" => Self::Dead,
            "PENDING" => Self::Pending,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for TrademarkStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer).unwrap_or_default();
        Ok(Self::from(s.as_str()))
    }
}

/// The applicant's mark. Immutable for the duration of one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedMark {
    /// The mark text as filed
    pub name: String,

    /// Nice classification number(s)
    #[serde(default)]
    pub classes: Vec<u16>,

    /// Goods and services description
    #[serde(default)]
    pub goods_services: String,
}

impl ProposedMark {
    pub fn new(
        name: impl Into<String>,
        classes: Vec<u16>,
        goods_services: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            classes,
            goods_services: goods_services.into(),
        }
    }
}

/// An existing third-party mark sourced from register extraction.
///
/// Read-only to the analysis core; the relevance filter partitions these
/// before any stage runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateConflict {
    /// The conflicting mark text
    pub mark: String,

    /// Owner/registrant name
    #[serde(default)]
    pub owner: String,

    /// Goods and services description. Candidates without one are always
    /// kept by the relevance filter: missing data must not suppress a hit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goods_services: Option<String>,

    /// Current status
    #[serde(default)]
    pub status: TrademarkStatus,

    /// Nice classification number(s)
    #[serde(default, deserialize_with = "de_class_list")]
    pub classes: Vec<u16>,

    /// Pre-existing similarity annotation from the register report, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_note: Option<String>,
}

impl CandidateConflict {
    /// Create a minimal candidate for testing.
    pub fn new(mark: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            mark: mark.into(),
            owner: owner.into(),
            goods_services: None,
            status: TrademarkStatus::Unknown,
            classes: Vec::new(),
            similarity_note: None,
        }
    }

    pub fn with_goods_services(mut self, goods_services: impl Into<String>) -> Self {
        self.goods_services = Some(goods_services.into());
        self
    }

    pub fn with_classes(mut self, classes: Vec<u16>) -> Self {
        self.classes = classes;
        self
    }

    pub fn with_status(mut self, status: TrademarkStatus) -> Self {
        self.status = status;
        self
    }
}

/// How a similar mark resembles the proposed mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SimilarityType {
    Phonetic,
    Semantic,
    /// Similar commercial impression / purpose
    Functional,
}

impl SimilarityType {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("phon") {
            Some(Self::Phonetic)
        } else if s.starts_with("sem") {
            Some(Self::Semantic)
        } else if s.starts_with("func") || s.starts_with("commercial") {
            Some(Self::Functional)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Phonetic => "Phonetic",
            Self::Semantic => "Semantic",
            Self::Functional => "Functional",
        }
    }
}

impl<'de> Deserialize<'de> for SimilarityType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| D::Error::custom(format!("unknown similarity type: {s}")))
    }
}

/// Letter-difference tier for near-identical marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DifferenceType {
    #[serde(rename = "One Letter")]
    OneLetter,
    #[serde(rename = "Two Letter")]
    TwoLetter,
}

impl DifferenceType {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if s.starts_with("one") || s == "1" {
            Some(Self::OneLetter)
        } else if s.starts_with("two") || s == "2" {
            Some(Self::TwoLetter)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OneLetter => "One Letter",
            Self::TwoLetter => "Two Letter",
        }
    }
}

impl<'de> Deserialize<'de> for DifferenceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).ok_or_else(|| D::Error::custom(format!("unknown difference type: {s}")))
    }
}

fn de_opt_similarity<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<SimilarityType>, D::Error> {
    let s = Option::<String>::deserialize(deserializer).unwrap_or_default();
    Ok(s.as_deref().and_then(SimilarityType::parse))
}

fn de_opt_difference<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DifferenceType>, D::Error> {
    let s = Option::<String>::deserialize(deserializer).unwrap_or_default();
    Ok(s.as_deref().and_then(DifferenceType::parse))
}

/// Lenient class label: the model writes `"3"`, `3`, or `["3", "5"]`.
fn de_class_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(class_label_from_value(&value))
}

fn class_label_from_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(class_label_from_value)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => String::new(),
    }
}

/// Lenient class-number list: numbers, numeric strings, or a comma-joined
/// string of either.
fn de_class_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u16>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(class_list_from_value(&value))
}

fn class_list_from_value(value: &serde_json::Value) -> Vec<u16> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as u16).into_iter().collect(),
        serde_json::Value::String(s) => s
            .split(|c: char| !c.is_ascii_digit())
            .filter(|s| !s.is_empty())
            .filter_map(|s| s.parse().ok())
            .collect(),
        serde_json::Value::Array(items) => {
            items.iter().flat_map(class_list_from_value).collect()
        }
        _ => Vec::new(),
    }
}

fn de_percentage<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0) as f32,
        serde_json::Value::String(s) => s.trim().trim_end_matches('%').trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn de_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        serde_json::Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// One classified conflict entry as reported by a hit-analysis stage.
///
/// Bucket membership (identical / one-letter / two-letter / similar) lives in
/// the containing `HitAnalysis` lists, not here. Entries are only trustworthy
/// after consistency repair has rebucketed them by recomputed edit distance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkEntry {
    #[serde(default)]
    pub mark: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub goods_services: String,

    #[serde(default)]
    pub status: TrademarkStatus,

    /// Class label as reported; kept verbatim for the opinion tables
    #[serde(default, deserialize_with = "de_class_label")]
    pub class: String,

    #[serde(default, deserialize_with = "de_opt_difference")]
    pub difference_type: Option<DifferenceType>,

    #[serde(default, deserialize_with = "de_opt_similarity")]
    pub similarity_type: Option<SimilarityType>,

    /// Exact or coordinated class overlap with the proposed mark
    #[serde(default)]
    pub class_match: bool,

    /// Goods/services similar enough to create confusion risk
    #[serde(default)]
    pub goods_services_match: bool,
}

/// Crowded-field block as reported by a stage.
///
/// The arithmetic is recomputed in code (`CrowdedFieldStats`); only the
/// explanation prose is taken from the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrowdedField {
    #[serde(default, deserialize_with = "de_count")]
    pub total_hits: usize,

    #[serde(
        default,
        alias = "percentage",
        deserialize_with = "de_percentage"
    )]
    pub distinct_owner_percentage: f32,

    #[serde(default)]
    pub is_crowded: bool,

    #[serde(default = "unable_crowded_field")]
    pub explanation: String,
}

fn unable_crowded_field() -> String {
    "Unable to determine crowded field status".to_string()
}

impl Default for CrowdedField {
    fn default() -> Self {
        Self {
            total_hits: 0,
            distinct_owner_percentage: 0.0,
            is_crowded: false,
            explanation: unable_crowded_field(),
        }
    }
}

/// Deterministically recomputed crowded-field numbers.
///
/// Derived per stage from the owners of the classified entries; never
/// persisted independently of the stage that produced it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrowdedFieldStats {
    pub total_hits: usize,
    pub distinct_owners: usize,
    pub distinct_owner_percentage: f32,
    pub is_crowded: bool,
}

/// Section I result: coordinated classes plus the four classification buckets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitAnalysis {
    #[serde(default, deserialize_with = "de_class_list")]
    pub identified_coordinated_classes: Vec<u16>,

    #[serde(default = "unable_coordinated")]
    pub coordinated_classes_explanation: String,

    #[serde(default)]
    pub identical_marks: Vec<MarkEntry>,

    #[serde(default)]
    pub one_letter_marks: Vec<MarkEntry>,

    #[serde(default)]
    pub two_letter_marks: Vec<MarkEntry>,

    /// Merged bucket some responses use instead of the two above; drained
    /// into the exact tiers by consistency repair.
    #[serde(default)]
    pub one_two_letter_marks: Vec<MarkEntry>,

    #[serde(default)]
    pub similar_marks: Vec<MarkEntry>,

    #[serde(default)]
    pub crowded_field: CrowdedField,
}

fn unable_coordinated() -> String {
    "Unable to identify coordinated classes".to_string()
}

impl Default for HitAnalysis {
    fn default() -> Self {
        Self {
            identified_coordinated_classes: Vec::new(),
            coordinated_classes_explanation: unable_coordinated(),
            identical_marks: Vec::new(),
            one_letter_marks: Vec::new(),
            two_letter_marks: Vec::new(),
            one_two_letter_marks: Vec::new(),
            similar_marks: Vec::new(),
            crowded_field: CrowdedField::default(),
        }
    }
}

impl HitAnalysis {
    /// All entries across buckets, in bucket order.
    pub fn all_entries(&self) -> impl Iterator<Item = &MarkEntry> {
        self.identical_marks
            .iter()
            .chain(&self.one_letter_marks)
            .chain(&self.two_letter_marks)
            .chain(&self.one_two_letter_marks)
            .chain(&self.similar_marks)
    }

    pub fn has_identical(&self) -> bool {
        !self.identical_marks.is_empty()
    }
}

/// Spectrum of inherent distinctiveness for a mark component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Distinctiveness {
    Generic,
    Descriptive,
    Suggestive,
    Arbitrary,
    Fanciful,
}

impl Default for Distinctiveness {
    fn default() -> Self {
        Self::Descriptive
    }
}

impl<'de> Deserialize<'de> for Distinctiveness {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer).unwrap_or_default();
        Ok(match s.trim().to_uppercase().as_str() {
            "GENERIC" => Self::Generic,
            "SUGGESTIVE" => Self::Suggestive,
            "ARBITRARY" => Self::Arbitrary,
            "FANCIFUL" => Self::Fanciful,
            _ => Self::Descriptive,
        })
    }
}

impl Distinctiveness {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Generic => "GENERIC",
            Self::Descriptive => "DESCRIPTIVE",
            Self::Suggestive => "SUGGESTIVE",
            Self::Arbitrary => "ARBITRARY",
            Self::Fanciful => "FANCIFUL",
        }
    }
}

/// One formative component of a compound mark and its conflict hits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    #[serde(default)]
    pub component: String,

    #[serde(default)]
    pub distinctiveness: Distinctiveness,

    #[serde(default)]
    pub marks: Vec<MarkEntry>,
}

/// Section II result: formative component decomposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentAnalysis {
    #[serde(default, deserialize_with = "de_class_list")]
    pub identified_coordinated_classes: Vec<u16>,

    #[serde(default = "unable_coordinated")]
    pub coordinated_classes_explanation: String,

    #[serde(default)]
    pub components: Vec<ComponentBreakdown>,

    #[serde(default)]
    pub crowded_field: CrowdedField,
}

impl Default for ComponentAnalysis {
    fn default() -> Self {
        Self {
            identified_coordinated_classes: Vec::new(),
            coordinated_classes_explanation: unable_coordinated(),
            components: Vec::new(),
            crowded_field: CrowdedField::default(),
        }
    }
}

impl ComponentAnalysis {
    pub fn all_entries(&self) -> impl Iterator<Item = &MarkEntry> {
        self.components.iter().flat_map(|c| c.marks.iter())
    }
}

/// Opinion risk scale, ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Low,
    MediumLow,
    Medium,
    MediumHigh,
    High,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::MediumLow => "MEDIUM-LOW",
            Self::Medium => "MEDIUM",
            Self::MediumHigh => "MEDIUM-HIGH",
            Self::High => "HIGH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s: String = s
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();
        match s.as_str() {
            "LOW" => Some(Self::Low),
            "MEDIUM-LOW" => Some(Self::MediumLow),
            "MEDIUM" => Some(Self::Medium),
            "MEDIUM-HIGH" => Some(Self::MediumHigh),
            "HIGH" => Some(Self::High),
            _ => None,
        }
    }

    /// Clamp into the opinion policy band: never HIGH, never below MEDIUM-LOW.
    pub fn clamp_to_policy(self) -> Self {
        match self {
            Self::High => Self::MediumHigh,
            Self::Low => Self::MediumLow,
            other => other,
        }
    }

    /// Crowded-field step-down. Drops one tier on the opinion scale,
    /// bottoming out at MEDIUM-LOW.
    pub fn crowded_field_discount(self) -> Self {
        match self {
            Self::High => Self::MediumHigh,
            Self::MediumHigh | Self::Medium | Self::MediumLow | Self::Low => Self::MediumLow,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for RiskLevel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Unrecognized levels fall to the scale floor rather than failing
        // the payload; the deterministic rules clamp afterwards anyway.
        let s = String::deserialize(deserializer).unwrap_or_default();
        Ok(Self::parse(&s).unwrap_or(Self::MediumLow))
    }
}

/// An owner with a history of enforcement activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnforcementOwner {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub enforcement_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggressiveEnforcement {
    #[serde(default)]
    pub owners: Vec<EnforcementOwner>,

    #[serde(default = "unable_enforcement")]
    pub enforcement_landscape: Vec<String>,
}

fn unable_enforcement() -> Vec<String> {
    vec!["Unable to determine enforcement patterns.".to_string()]
}

impl Default for AggressiveEnforcement {
    fn default() -> Self {
        Self {
            owners: Vec::new(),
            enforcement_landscape: unable_enforcement(),
        }
    }
}

/// The dual risk conclusion: registration and use are rated independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverallRisk {
    #[serde(default = "floor_level")]
    pub level_registration: RiskLevel,

    #[serde(default = "unable_risk")]
    pub explanation_registration: String,

    #[serde(default = "floor_level")]
    pub level_use: RiskLevel,

    #[serde(default = "unable_risk")]
    pub explanation_use: String,

    #[serde(default, deserialize_with = "de_percentage")]
    pub crowded_field_percentage: f32,

    #[serde(default)]
    pub crowded_field_impact: String,
}

fn floor_level() -> RiskLevel {
    RiskLevel::MediumLow
}

fn unable_risk() -> String {
    "Unable to determine precise risk level.".to_string()
}

impl Default for OverallRisk {
    fn default() -> Self {
        Self {
            level_registration: floor_level(),
            explanation_registration: unable_risk(),
            level_use: floor_level(),
            explanation_use: unable_risk(),
            crowded_field_percentage: 0.0,
            crowded_field_impact: String::new(),
        }
    }
}

/// Section III result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAssessment {
    #[serde(default = "unable_confusion")]
    pub likelihood_of_confusion: Vec<String>,

    #[serde(default = "unable_descriptiveness")]
    pub descriptiveness: Vec<String>,

    #[serde(default)]
    pub aggressive_enforcement: AggressiveEnforcement,

    #[serde(default)]
    pub overall_risk: OverallRisk,
}

fn unable_confusion() -> Vec<String> {
    vec!["Unable to determine likelihood of confusion.".to_string()]
}

fn unable_descriptiveness() -> Vec<String> {
    vec!["Unable to determine descriptiveness.".to_string()]
}

impl Default for RiskAssessment {
    fn default() -> Self {
        Self {
            likelihood_of_confusion: unable_confusion(),
            descriptiveness: unable_descriptiveness(),
            aggressive_enforcement: AggressiveEnforcement::default(),
            overall_risk: OverallRisk::default(),
        }
    }
}

/// A raw web citation record extracted upstream (page OCR is external to
/// this core; the CLI reads these from JSON fixtures).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitationRecord {
    #[serde(default, alias = "term")]
    pub cited_term: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub goods_services: String,
}

/// One cited-term hit from web common-law analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitedTermEntry {
    #[serde(default, alias = "term")]
    pub cited_term: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub goods_services: String,

    #[serde(default, deserialize_with = "de_opt_difference")]
    pub difference_type: Option<DifferenceType>,

    #[serde(default, deserialize_with = "de_opt_similarity")]
    pub similarity_type: Option<SimilarityType>,

    #[serde(default)]
    pub goods_services_match: bool,
}

/// Section IV result: cited-term classification for web common law.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CitedTermAnalysis {
    #[serde(default)]
    pub identical_terms: Vec<CitedTermEntry>,

    #[serde(default)]
    pub letter_difference_terms: Vec<CitedTermEntry>,

    #[serde(default)]
    pub similar_terms: Vec<CitedTermEntry>,
}

impl CitedTermAnalysis {
    pub fn has_identical(&self) -> bool {
        !self.identical_terms.is_empty()
    }
}

/// One component of the proposed mark and its web citation hits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebComponent {
    #[serde(default)]
    pub component: String,

    #[serde(default)]
    pub terms: Vec<CitedTermEntry>,
}

/// Section V result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebComponentAnalysis {
    #[serde(default)]
    pub components: Vec<WebComponent>,

    #[serde(default)]
    pub crowded_field: CrowdedField,
}

impl Default for WebComponentAnalysis {
    fn default() -> Self {
        Self {
            components: Vec::new(),
            crowded_field: CrowdedField::default(),
        }
    }
}

/// Section VI narrative bullets (the risk level itself is rule-derived).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebRiskNarrative {
    #[serde(default = "unable_market")]
    pub market_presence: Vec<String>,

    #[serde(default)]
    pub enforcement_patterns: Vec<String>,
}

fn unable_market() -> Vec<String> {
    vec!["Unable to determine market presence.".to_string()]
}

impl Default for WebRiskNarrative {
    fn default() -> Self {
        Self {
            market_presence: unable_market(),
            enforcement_patterns: Vec::new(),
        }
    }
}

/// A system + user message pair sent to the LLM backend.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    /// Deterministic sampling by default; stages that want variance opt in.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// One rendered opinion section.
#[derive(Debug, Clone, Serialize)]
pub struct OpinionSection {
    pub title: String,
    pub body: String,
}

/// The final composed artifact, immutable after assembly and consumed only
/// by the external document-export collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct OpinionDocument {
    pub proposed: ProposedMark,

    /// Candidates dropped by the relevance pre-filter
    pub excluded_count: usize,

    /// Ordered sections as rendered before the reformat pass
    pub sections: Vec<OpinionSection>,

    /// Final text after the reformat pass and defensive re-filtering
    pub text: String,
}

/// Errors surfaced to the caller of `run_analysis`.
///
/// Only input errors abort a run; stage-level failures degrade to typed
/// empty defaults inside the pipeline. `StageFailure` exists for callers
/// that drive stages individually.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("missing proposed mark information: {0}")]
    MissingProposedMarkInfo(&'static str),

    #[error("no candidate conflict data provided")]
    NoCandidateData,

    #[error("stage {stage} failed: {cause}")]
    StageFailure { stage: &'static str, cause: String },
}
