//! Cross-item normalization and low-score flagging.
//!
//! Items may use different scales and some are reverse-coded, so their raw means
//! cannot be compared directly. The normalization is done in two steps:
//!
//! 1. the mean is mapped to its position on the item scale, `(mean - min) / (max - min)`,
//!    and flipped (`1 - p`) for [`Polarity::HigherIsWorse`] items, so that 0 is always
//!    the most concerning answer and 1 the most favorable;
//! 2. these positions are turned into z-scores against their cross-item mean and
//!    sample standard deviation.
//!
//! When all the items share one scale and one polarity, this is the same as z-scoring
//! the raw means. If there is only one item, or if all the positions are equal, every
//! item gets a score of 0.

use log::{debug, info};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::*;
use crate::scoring::mean_and_std;

/// The position of the item mean on its scale, oriented so that low is concerning.
pub fn oriented_position(summary: &ItemSummary) -> f64 {
    let p = (summary.mean - summary.scale_min) / (summary.scale_max - summary.scale_min);
    match summary.polarity {
        Polarity::HigherIsBetter => p,
        Polarity::HigherIsWorse => 1.0 - p,
    }
}

/// Normalized score of every item, in item id order.
pub fn normalize(summaries: &BTreeMap<String, ItemSummary>) -> Vec<(String, f64)> {
    let positions: Vec<(String, f64)> = summaries
        .values()
        .map(|s| (s.item_id.clone(), oriented_position(s)))
        .collect();
    let values: Vec<f64> = positions.iter().map(|(_, p)| *p).collect();
    let (center, spread) = mean_and_std(&values).unwrap_or((0.0, 0.0));
    debug!(
        "normalize: {} items, center {:.4}, spread {:.4}",
        values.len(),
        center,
        spread
    );
    positions
        .into_iter()
        .map(|(id, p)| {
            let z = if spread > 0.0 { (p - center) / spread } else { 0.0 };
            (id, z)
        })
        .collect()
}

fn by_score_then_id(a: &LowScoreFinding, b: &LowScoreFinding) -> Ordering {
    a.normalized_score
        .total_cmp(&b.normalized_score)
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// All the items, from the most concerning to the most favorable.
/// Ties are broken by item id.
pub fn rank_items(summaries: &BTreeMap<String, ItemSummary>) -> Vec<LowScoreFinding> {
    let mut res: Vec<LowScoreFinding> = normalize(summaries)
        .into_iter()
        .filter_map(|(id, z)| {
            summaries.get(&id).map(|s| LowScoreFinding {
                item_id: s.item_id.clone(),
                label: s.label.clone(),
                mean: s.mean,
                normalized_score: z,
                valid_count: s.valid_count,
            })
        })
        .collect();
    res.sort_by(by_score_then_id);
    res
}

/// Linear interpolation between the closest ranks, on sorted values.
fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// The normalized score under which an item is flagged.
pub fn cutoff(ranked: &[LowScoreFinding], policy: ThresholdPolicy) -> Option<f64> {
    match policy {
        ThresholdPolicy::StdDevCutoff(k) => Some(-k),
        ThresholdPolicy::Decile(d) => {
            // The ranked findings are already sorted by score.
            let scores: Vec<f64> = ranked.iter().map(|f| f.normalized_score).collect();
            quantile(&scores, d as f64 / 10.0)
        }
    }
}

/// Returns the items that score unusually low, worst first.
pub fn flag_low(
    summaries: &BTreeMap<String, ItemSummary>,
    policy: ThresholdPolicy,
) -> Vec<LowScoreFinding> {
    let ranked = rank_items(summaries);
    let threshold = match cutoff(&ranked, policy) {
        Some(t) => t,
        None => return vec![],
    };
    let flagged: Vec<LowScoreFinding> = ranked
        .into_iter()
        .filter(|f| f.normalized_score < threshold)
        .collect();
    info!(
        "flag_low: {} items below normalized score {:.4} ({:?})",
        flagged.len(),
        threshold,
        policy
    );
    for f in flagged.iter() {
        info!("flag_low: [{:.2}] {}", f.mean, f.label);
    }
    flagged
}

pub fn low_score_report(
    summaries: &BTreeMap<String, ItemSummary>,
    policy: ThresholdPolicy,
) -> LowScoreReport {
    LowScoreReport {
        ranked_items: rank_items(summaries),
        flagged: flag_low(summaries, policy),
        policy,
    }
}
