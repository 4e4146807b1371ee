use log::{debug, info};
use std::collections::BTreeMap;

use crate::config::*;
use crate::matrix::ResponseMatrix;

/// The scored items, and the items that could not be scored.
#[derive(PartialEq, Debug, Clone)]
pub struct ScoreReport {
    pub summaries: BTreeMap<String, ItemSummary>,
    pub insufficient: Vec<InsufficientData>,
}

/// Mean and sample standard deviation. Returns None for an empty slice.
pub(crate) fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = if values.len() > 1 {
        let ss: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
        (ss / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    Some((mean, std))
}

/// Computes the summary statistics of every item.
///
/// Missing answers are excluded from both the sum and the count. Items with fewer
/// than `min_valid_responses` answers are listed in `insufficient` instead.
pub fn score(matrix: &ResponseMatrix, config: &AnalysisConfig) -> ScoreReport {
    let mut summaries: BTreeMap<String, ItemSummary> = BTreeMap::new();
    let mut insufficient: Vec<InsufficientData> = Vec::new();

    for (idx, item) in matrix.items().iter().enumerate() {
        let values = matrix.valid_responses(idx);
        debug!("score: item {:?}: {} valid responses", item.id, values.len());
        match mean_and_std(&values) {
            Some((mean, std_dev)) if values.len() >= config.min_valid_responses => {
                summaries.insert(
                    item.id.clone(),
                    ItemSummary {
                        item_id: item.id.clone(),
                        label: item.label.clone(),
                        mean,
                        std_dev,
                        valid_count: values.len(),
                        scale_min: item.scale_min,
                        scale_max: item.scale_max,
                        polarity: item.polarity,
                    },
                );
            }
            _ => {
                insufficient.push(InsufficientData {
                    item_id: item.id.clone(),
                    label: item.label.clone(),
                    valid_count: values.len(),
                    required: config.min_valid_responses,
                });
            }
        }
    }

    info!(
        "score: {} items scored, {} with insufficient data",
        summaries.len(),
        insufficient.len()
    );
    ScoreReport {
        summaries,
        insufficient,
    }
}
