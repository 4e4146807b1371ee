use log::info;
use std::cmp::Ordering;

use crate::config::*;

fn strongest_first(a: &DisparityResult, b: &DisparityResult) -> Ordering {
    b.effect_size
        .total_cmp(&a.effect_size)
        .then_with(|| a.p_value.total_cmp(&b.p_value))
        .then_with(|| a.trait_id.cmp(&b.trait_id))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

/// Orders the conclusive results by decreasing effect size.
///
/// Ties are broken by increasing p-value, then by trait and item ids. The inconclusive
/// results are kept apart, in their original order: they must not be read as an absence
/// of disparity.
pub fn rank(outcomes: &[DisparityOutcome]) -> DisparityRanking {
    let mut ranked: Vec<DisparityResult> = Vec::new();
    let mut inconclusive: Vec<InconclusiveResult> = Vec::new();
    for o in outcomes {
        match o {
            DisparityOutcome::Conclusive(r) => ranked.push(r.clone()),
            DisparityOutcome::Inconclusive(r) => inconclusive.push(r.clone()),
        }
    }
    ranked.sort_by(strongest_first);
    info!(
        "rank: {} conclusive results, {} inconclusive",
        ranked.len(),
        inconclusive.len()
    );
    for r in ranked.iter().take(20) {
        info!(
            "rank: {:.4} {} x {} (p = {:.3e})",
            r.effect_size, r.trait_id, r.item_id, r.p_value
        );
    }
    DisparityRanking {
        ranked,
        inconclusive,
    }
}
