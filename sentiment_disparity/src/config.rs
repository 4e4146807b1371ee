// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

/// The direction in which an item expresses a favorable answer.
///
/// There is no default on purpose: every item must state how its numeric scale
/// should be read before "low" can mean "concerning".
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Polarity {
    /// A high value is a positive answer (e.g. "I feel I belong here").
    HigherIsBetter,
    /// A high value is a negative answer (reverse-coded, e.g. "I feel stressed").
    HigherIsWorse,
}

/// One survey question on an ordinal scale.
#[derive(PartialEq, Debug, Clone)]
pub struct SentimentItem {
    pub id: String,
    pub label: String,
    pub scale_min: f64,
    pub scale_max: f64,
    pub polarity: Polarity,
}

impl SentimentItem {
    pub fn new(id: &str, label: &str, scale: (f64, f64), polarity: Polarity) -> SentimentItem {
        SentimentItem {
            id: id.to_string(),
            label: label.to_string(),
            scale_min: scale.0,
            scale_max: scale.1,
            polarity,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.scale_min && value <= self.scale_max
    }
}

/// A categorical attribute of the respondents.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TraitDef {
    pub id: String,
    pub label: String,
    /// The recognized categories, in display order.
    pub categories: Vec<String>,
    /// If true, the order of the categories is meaningful (grade, tenure, ...).
    pub ordinal: bool,
}

impl TraitDef {
    pub fn new(id: &str, categories: &[&str]) -> TraitDef {
        TraitDef {
            id: id.to_string(),
            label: id.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            ordinal: false,
        }
    }

    pub fn ordinal(self) -> TraitDef {
        TraitDef {
            ordinal: true,
            ..self
        }
    }
}

/// The content of one cell, as handed over by a loader.
#[derive(PartialEq, Debug, Clone)]
pub enum RawValue {
    /// Empty or absent cell.
    Missing,
    Integer(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

/// One row of raw survey data, before validation.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RawRow {
    pub id: String,
    pub traits: BTreeMap<String, RawValue>,
    pub responses: BTreeMap<String, RawValue>,
}

// ******** Output data structures *********

/// Summary statistics of the valid responses to one item.
#[derive(PartialEq, Debug, Clone)]
pub struct ItemSummary {
    pub item_id: String,
    pub label: String,
    /// Raw mean on the item's own scale.
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator).
    pub std_dev: f64,
    pub valid_count: usize,
    pub scale_min: f64,
    pub scale_max: f64,
    pub polarity: Polarity,
}

/// An item that did not collect enough responses to be scored.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InsufficientData {
    pub item_id: String,
    pub label: String,
    pub valid_count: usize,
    pub required: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct LowScoreFinding {
    pub item_id: String,
    pub label: String,
    pub mean: f64,
    /// Position of the item relative to the other items, in standard deviations.
    /// Negative values are worse than average regardless of the item polarity.
    pub normalized_score: f64,
    pub valid_count: usize,
}

#[derive(PartialEq, Debug, Clone)]
pub struct LowScoreReport {
    /// All the scored items, worst first.
    pub ranked_items: Vec<LowScoreFinding>,
    /// The items below the threshold, worst first.
    pub flagged: Vec<LowScoreFinding>,
    pub policy: ThresholdPolicy,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TestKind {
    WelchT,
    OneWayAnova,
    KruskalWallis,
}

impl TestKind {
    pub fn name(&self) -> &'static str {
        match self {
            TestKind::WelchT => "welch_t",
            TestKind::OneWayAnova => "one_way_anova",
            TestKind::KruskalWallis => "kruskal_wallis",
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct CategoryMean {
    pub category: String,
    pub mean: f64,
    pub count: usize,
}

/// Monotonic association between an ordinal trait and the responses.
#[derive(PartialEq, Debug, Clone)]
pub struct RankTrend {
    /// Spearman rank correlation.
    pub rho: f64,
    pub p_value: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct DisparityResult {
    pub trait_id: String,
    pub item_id: String,
    pub test: TestKind,
    pub statistic: f64,
    /// Numerator and, for F tests, denominator degrees of freedom.
    pub degrees_of_freedom: (f64, Option<f64>),
    pub p_value: f64,
    /// Eta-squared, always within [0, 1].
    pub effect_size: f64,
    pub sample_size: usize,
    /// Per-category means, in the declared category order.
    pub category_means: Vec<CategoryMean>,
    pub trend: Option<RankTrend>,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InconclusiveReason {
    /// Fewer than two categories have any usable response.
    SingleCategory,
    /// At least one non-empty category is smaller than the configured minimum.
    InsufficientCategoryCount,
    /// All the usable responses are identical.
    NoVariance,
}

impl InconclusiveReason {
    pub fn describe(&self) -> &'static str {
        match self {
            InconclusiveReason::SingleCategory => "fewer than two non-empty categories",
            InconclusiveReason::InsufficientCategoryCount => "insufficient category count",
            InconclusiveReason::NoVariance => "no variance in responses",
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct InconclusiveResult {
    pub trait_id: String,
    pub item_id: String,
    pub reason: InconclusiveReason,
    /// Usable responses per non-empty category, in declared order.
    pub category_counts: Vec<(String, usize)>,
}

#[derive(PartialEq, Debug, Clone)]
pub enum DisparityOutcome {
    Conclusive(DisparityResult),
    Inconclusive(InconclusiveResult),
}

#[derive(PartialEq, Debug, Clone)]
pub struct DisparityRanking {
    /// Conclusive results, strongest effect first.
    pub ranked: Vec<DisparityResult>,
    pub inconclusive: Vec<InconclusiveResult>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisReport {
    pub low_scores: LowScoreReport,
    pub insufficient: Vec<InsufficientData>,
    pub disparities: DisparityRanking,
}

/// Errors that prevent the analysis from running.
#[derive(PartialEq, Debug, Clone)]
pub enum AnalysisError {
    /// A row does not fit the schema. The row number starts at 1.
    SchemaViolation {
        row: usize,
        respondent: String,
        column: String,
        reason: String,
    },
    /// The item or trait definitions are inconsistent.
    InvalidSchema(String),
    InvalidConfig(String),
}

impl Error for AnalysisError {}

impl Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::SchemaViolation {
                row,
                respondent,
                column,
                reason,
            } => write!(
                f,
                "schema violation at row {} (respondent {:?}), column {:?}: {}",
                row, respondent, column, reason
            ),
            AnalysisError::InvalidSchema(msg) => write!(f, "invalid schema: {}", msg),
            AnalysisError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

// ********* Configuration **********

/// How the low-score threshold is chosen.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ThresholdPolicy {
    /// Flag items whose normalized score is more than this many standard
    /// deviations below the cross-item mean.
    StdDevCutoff(f64),
    /// Flag items below the given decile (1 to 9) of the normalized scores.
    Decile(u32),
}

/// The family of group comparison tests.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum GroupTest {
    /// Welch t test for two categories, one-way ANOVA beyond.
    Parametric,
    /// Kruskal-Wallis test on ranks, for any number of categories.
    RankBased,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord)]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn name(&self) -> &'static str {
        match self {
            EffectMagnitude::Negligible => "negligible",
            EffectMagnitude::Small => "small",
            EffectMagnitude::Medium => "medium",
            EffectMagnitude::Large => "large",
        }
    }
}

/// Cutoffs for labelling eta-squared values. Only used for display.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct EffectSizeHints {
    pub small: f64,
    pub medium: f64,
    pub large: f64,
}

impl EffectSizeHints {
    pub const COHEN: EffectSizeHints = EffectSizeHints {
        small: 0.01,
        medium: 0.06,
        large: 0.14,
    };

    pub fn magnitude(&self, effect_size: f64) -> EffectMagnitude {
        if effect_size >= self.large {
            EffectMagnitude::Large
        } else if effect_size >= self.medium {
            EffectMagnitude::Medium
        } else if effect_size >= self.small {
            EffectMagnitude::Small
        } else {
            EffectMagnitude::Negligible
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct AnalysisConfig {
    pub low_score_threshold_policy: ThresholdPolicy,
    pub min_valid_responses: usize,
    pub min_category_count: usize,
    pub group_test: GroupTest,
    pub effect_size_hints: EffectSizeHints,
}

impl AnalysisConfig {
    pub const DEFAULT: AnalysisConfig = AnalysisConfig {
        low_score_threshold_policy: ThresholdPolicy::StdDevCutoff(1.0),
        min_valid_responses: 5,
        min_category_count: 3,
        group_test: GroupTest::Parametric,
        effect_size_hints: EffectSizeHints::COHEN,
    };

    pub fn validate(&self) -> Result<(), AnalysisError> {
        match self.low_score_threshold_policy {
            ThresholdPolicy::StdDevCutoff(k) if !k.is_finite() || k < 0.0 => {
                return Err(AnalysisError::InvalidConfig(format!(
                    "stddev cutoff must be a non-negative number, got {}",
                    k
                )));
            }
            ThresholdPolicy::Decile(d) if !(1..=9).contains(&d) => {
                return Err(AnalysisError::InvalidConfig(format!(
                    "decile must be between 1 and 9, got {}",
                    d
                )));
            }
            _ => {}
        }
        if self.min_valid_responses == 0 {
            return Err(AnalysisError::InvalidConfig(
                "min_valid_responses must be at least 1".to_string(),
            ));
        }
        // A group test needs within-group variance, hence two responses per category.
        if self.min_category_count < 2 {
            return Err(AnalysisError::InvalidConfig(format!(
                "min_category_count must be at least 2, got {}",
                self.min_category_count
            )));
        }
        let h = self.effect_size_hints;
        if !(0.0 <= h.small && h.small <= h.medium && h.medium <= h.large && h.large <= 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "effect size hints must be increasing within [0, 1], got {:?}",
                h
            )));
        }
        Ok(())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig::DEFAULT
    }
}
