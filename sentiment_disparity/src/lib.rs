//! Analysis of Likert-style survey responses.
//!
//! Two independent questions are answered from one [`ResponseMatrix`]:
//! - which items score unusually low compared to the other items ([`flagging`])
//! - which respondent traits go along with different answers to an item, and how
//!   strongly ([`disparity`], [`ranking`])
//!
//! ```
//! use sentiment_disparity::builder::MatrixBuilder;
//! use sentiment_disparity::*;
//!
//! let items = vec![SentimentItem::new("belong", "I feel I belong", (1.0, 6.0), Polarity::HigherIsBetter)];
//! let traits = vec![TraitDef::new("involvement", &["yes", "no"])];
//! let mut builder = MatrixBuilder::new(&items, &traits)?;
//! for (idx, (inv, v)) in [("yes", 5.0), ("yes", 6.0), ("yes", 5.0), ("no", 3.0), ("no", 4.0), ("no", 3.0)]
//!     .iter()
//!     .enumerate()
//! {
//!     builder.add_respondent(&format!("r{}", idx), &[("involvement", *inv)], &[("belong", Some(*v))])?;
//! }
//! let matrix = builder.build();
//!
//! let config = AnalysisConfig {
//!     min_valid_responses: 3,
//!     ..AnalysisConfig::DEFAULT
//! };
//! let report = run_analysis(&matrix, &config)?;
//! assert_eq!(report.disparities.ranked.len(), 1);
//! # Ok::<(), AnalysisError>(())
//! ```

mod config;
pub mod builder;
pub mod disparity;
pub mod distributions;
pub mod flagging;
pub mod manual;
pub mod matrix;
pub mod ranking;
pub mod scoring;

use log::info;

pub use crate::config::*;
pub use crate::matrix::{Respondent, ResponseMatrix, TraitValue};

/// Runs both analyses on the matrix.
///
/// The low-score track and the disparity track only read the matrix, and run
/// concurrently. The result only depends on the matrix and the configuration.
pub fn run_analysis(
    matrix: &ResponseMatrix,
    config: &AnalysisConfig,
) -> Result<AnalysisReport, AnalysisError> {
    config.validate()?;
    info!(
        "run_analysis: {} respondents, {} items, {} traits, config: {:?}",
        matrix.num_respondents(),
        matrix.items().len(),
        matrix.traits().len(),
        config
    );

    let ((low_scores, insufficient), disparities) = rayon::join(
        || {
            let scores = scoring::score(matrix, config);
            let low = flagging::low_score_report(&scores.summaries, config.low_score_threshold_policy);
            (low, scores.insufficient)
        },
        || ranking::rank(&disparity::analyze_all(matrix, config)),
    );

    Ok(AnalysisReport {
        low_scores,
        insufficient,
        disparities,
    })
}
