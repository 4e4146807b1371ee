use log::{debug, info};
use rayon::prelude::*;

use crate::config::*;
use crate::distributions::{chi_squared_upper_tail, f_upper_tail, student_t_two_sided};
use crate::matrix::{ResponseMatrix, TraitValue};
use crate::scoring::mean_and_std;

// The usable responses of one category for one (trait, item) pair.
#[derive(PartialEq, Debug, Clone)]
struct CategoryGroup {
    // Position of the category in the trait definition.
    position: usize,
    values: Vec<f64>,
}

// Sum of squares decomposition: total = between + within.
#[derive(PartialEq, Debug, Clone, Copy)]
struct SumsOfSquares {
    between: f64,
    within: f64,
    n: usize,
    k: usize,
}

/// Splits the responses to one item by the categories of one trait.
///
/// Respondents with an unknown trait value or a missing answer are left out of
/// this pair only. All the categories are returned, in declared order, even if empty.
fn partition(matrix: &ResponseMatrix, trait_idx: usize, item_idx: usize) -> Vec<CategoryGroup> {
    let num_categories = matrix.traits()[trait_idx].categories.len();
    let mut groups: Vec<CategoryGroup> = (0..num_categories)
        .map(|position| CategoryGroup {
            position,
            values: Vec::new(),
        })
        .collect();
    for (tv, cell) in matrix
        .trait_values(trait_idx)
        .zip(matrix.responses(item_idx).iter())
    {
        if let (TraitValue::Category(c), Some(v)) = (tv, cell) {
            groups[c].values.push(*v);
        }
    }
    groups
}

fn sums_of_squares(groups: &[&CategoryGroup]) -> SumsOfSquares {
    let n: usize = groups.iter().map(|g| g.values.len()).sum();
    let grand_mean = groups.iter().flat_map(|g| g.values.iter()).sum::<f64>() / n as f64;
    let mut between = 0.0;
    let mut within = 0.0;
    for g in groups {
        let m = g.values.iter().sum::<f64>() / g.values.len() as f64;
        between += g.values.len() as f64 * (m - grand_mean) * (m - grand_mean);
        within += g.values.iter().map(|x| (x - m) * (x - m)).sum::<f64>();
    }
    SumsOfSquares {
        between,
        within,
        n,
        k: groups.len(),
    }
}

/// Proportion of the variance explained by the categories, within [0, 1].
fn eta_squared(ss: &SumsOfSquares) -> f64 {
    let total = ss.between + ss.within;
    if total <= 0.0 {
        return 0.0;
    }
    (ss.between / total).clamp(0.0, 1.0)
}

// (statistic, degrees of freedom, p-value)
type TestOutput = (f64, (f64, Option<f64>), f64);

fn welch_t_test(a: &[f64], b: &[f64]) -> TestOutput {
    let (n1, n2) = (a.len() as f64, b.len() as f64);
    let (m1, s1) = mean_and_std(a).unwrap_or((0.0, 0.0));
    let (m2, s2) = mean_and_std(b).unwrap_or((0.0, 0.0));
    let v1 = s1 * s1 / n1;
    let v2 = s2 * s2 / n2;
    let se2 = v1 + v2;
    if se2 <= 0.0 {
        // Both groups are constant but differ: perfect separation.
        let t = if m1 >= m2 { f64::INFINITY } else { f64::NEG_INFINITY };
        return (t, (n1 + n2 - 2.0, None), 0.0);
    }
    let t = (m1 - m2) / se2.sqrt();
    // Welch-Satterthwaite approximation
    let df = se2 * se2 / (v1 * v1 / (n1 - 1.0) + v2 * v2 / (n2 - 1.0));
    (t, (df, None), student_t_two_sided(t, df))
}

fn one_way_anova(ss: &SumsOfSquares) -> TestOutput {
    let df1 = (ss.k - 1) as f64;
    let df2 = (ss.n - ss.k) as f64;
    if ss.within <= 0.0 {
        return (f64::INFINITY, (df1, Some(df2)), 0.0);
    }
    let f = (ss.between / df1) / (ss.within / df2);
    (f, (df1, Some(df2)), f_upper_tail(f, df1, df2))
}

/// Average ranks (starting at 1) of the values, and the sizes of the groups of ties.
pub(crate) fn average_ranks(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
    let mut ranks = vec![0.0; values.len()];
    let mut ties: Vec<usize> = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end share the average of ranks start+1..=end.
        let rank = (start + end + 1) as f64 / 2.0;
        for &i in order[start..end].iter() {
            ranks[i] = rank;
        }
        ties.push(end - start);
        start = end;
    }
    (ranks, ties)
}

fn kruskal_wallis(groups: &[&CategoryGroup]) -> TestOutput {
    let pooled: Vec<f64> = groups
        .iter()
        .flat_map(|g| g.values.iter().cloned())
        .collect();
    let n = pooled.len() as f64;
    let (ranks, ties) = average_ranks(&pooled);
    let mut offset = 0;
    let mut sum_term = 0.0;
    for g in groups {
        let r: f64 = ranks[offset..offset + g.values.len()].iter().sum();
        sum_term += r * r / g.values.len() as f64;
        offset += g.values.len();
    }
    let h = 12.0 / (n * (n + 1.0)) * sum_term - 3.0 * (n + 1.0);
    let tie_term: f64 = ties.iter().map(|&t| (t * t * t - t) as f64).sum();
    let correction = 1.0 - tie_term / (n * n * n - n);
    let h = if correction > 0.0 {
        (h / correction).max(0.0)
    } else {
        0.0
    };
    let df = (groups.len() - 1) as f64;
    (h, (df, None), chi_squared_upper_tail(h, df))
}

/// Spearman correlation between the position of the category and the response.
fn rank_trend(groups: &[&CategoryGroup]) -> Option<RankTrend> {
    let xs: Vec<f64> = groups
        .iter()
        .flat_map(|g| g.values.iter().map(move |_| g.position as f64))
        .collect();
    let ys: Vec<f64> = groups
        .iter()
        .flat_map(|g| g.values.iter().cloned())
        .collect();
    if xs.len() < 3 {
        return None;
    }
    let (rx, _) = average_ranks(&xs);
    let (ry, _) = average_ranks(&ys);
    let n = rx.len() as f64;
    let mx = rx.iter().sum::<f64>() / n;
    let my = ry.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in rx.iter().zip(ry.iter()) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let rho = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let p_value = if rho.abs() >= 1.0 {
        0.0
    } else {
        let t = rho * ((n - 2.0) / (1.0 - rho * rho)).sqrt();
        student_t_two_sided(t, n - 2.0)
    };
    Some(RankTrend { rho, p_value })
}

/// Tests whether the responses to one item differ across the categories of one trait.
///
/// The pair is inconclusive when fewer than two categories have responses, when a
/// non-empty category has fewer than `min_category_count` responses, or when all the
/// responses are identical. Otherwise the test is chosen by `config.group_test` and the
/// number of categories, and the effect size is eta-squared.
///
/// # Panics
///
/// If `trait_idx` or `item_idx` is out of the range of the matrix. Use [`analyze_named`]
/// for unchecked input.
pub fn analyze(
    matrix: &ResponseMatrix,
    trait_idx: usize,
    item_idx: usize,
    config: &AnalysisConfig,
) -> DisparityOutcome {
    let tdef = &matrix.traits()[trait_idx];
    let item = &matrix.items()[item_idx];
    let groups = partition(matrix, trait_idx, item_idx);
    let non_empty: Vec<&CategoryGroup> = groups.iter().filter(|g| !g.values.is_empty()).collect();
    let category_counts: Vec<(String, usize)> = non_empty
        .iter()
        .map(|g| (tdef.categories[g.position].clone(), g.values.len()))
        .collect();

    let inconclusive = |reason: InconclusiveReason| {
        debug!(
            "analyze: {:?} x {:?}: inconclusive ({}): {:?}",
            tdef.id,
            item.id,
            reason.describe(),
            category_counts
        );
        DisparityOutcome::Inconclusive(InconclusiveResult {
            trait_id: tdef.id.clone(),
            item_id: item.id.clone(),
            reason,
            category_counts: category_counts.clone(),
        })
    };

    if non_empty.len() < 2 {
        return inconclusive(InconclusiveReason::SingleCategory);
    }
    if non_empty
        .iter()
        .any(|g| g.values.len() < config.min_category_count)
    {
        return inconclusive(InconclusiveReason::InsufficientCategoryCount);
    }
    let first = non_empty[0].values[0];
    if non_empty
        .iter()
        .all(|g| g.values.iter().all(|v| *v == first))
    {
        return inconclusive(InconclusiveReason::NoVariance);
    }

    let ss = sums_of_squares(&non_empty);
    let (test, (statistic, degrees_of_freedom, p_value)) = match (config.group_test, non_empty.as_slice()) {
        (GroupTest::Parametric, [a, b]) => (TestKind::WelchT, welch_t_test(&a.values, &b.values)),
        (GroupTest::Parametric, _) => (TestKind::OneWayAnova, one_way_anova(&ss)),
        (GroupTest::RankBased, _) => (TestKind::KruskalWallis, kruskal_wallis(&non_empty)),
    };
    let effect_size = eta_squared(&ss);

    let category_means: Vec<CategoryMean> = non_empty
        .iter()
        .map(|g| CategoryMean {
            category: tdef.categories[g.position].clone(),
            mean: g.values.iter().sum::<f64>() / g.values.len() as f64,
            count: g.values.len(),
        })
        .collect();

    let trend = if tdef.ordinal {
        rank_trend(&non_empty)
    } else {
        None
    };

    debug!(
        "analyze: {:?} x {:?}: {:?} statistic {:.4} p {:.4e} eta2 {:.4} ss {:?}",
        tdef.id, item.id, test, statistic, p_value, effect_size, ss
    );

    DisparityOutcome::Conclusive(DisparityResult {
        trait_id: tdef.id.clone(),
        item_id: item.id.clone(),
        test,
        statistic,
        degrees_of_freedom,
        p_value,
        effect_size,
        sample_size: ss.n,
        category_means,
        trend,
    })
}

/// Same as [`analyze`], with the trait and the item designated by their ids.
pub fn analyze_named(
    matrix: &ResponseMatrix,
    trait_id: &str,
    item_id: &str,
    config: &AnalysisConfig,
) -> Result<DisparityOutcome, AnalysisError> {
    let trait_idx = matrix
        .trait_index(trait_id)
        .ok_or_else(|| AnalysisError::InvalidConfig(format!("unknown trait {:?}", trait_id)))?;
    let item_idx = matrix
        .item_index(item_id)
        .ok_or_else(|| AnalysisError::InvalidConfig(format!("unknown item {:?}", item_id)))?;
    Ok(analyze(matrix, trait_idx, item_idx, config))
}

/// Runs [`analyze`] over every (trait, item) pair.
///
/// The pairs are independent and processed in parallel. The outcomes are returned in
/// trait order, then item order, whatever the scheduling.
pub fn analyze_all(matrix: &ResponseMatrix, config: &AnalysisConfig) -> Vec<DisparityOutcome> {
    let pairs: Vec<(usize, usize)> = (0..matrix.traits().len())
        .flat_map(|t| (0..matrix.items().len()).map(move |i| (t, i)))
        .collect();
    info!(
        "analyze_all: {} traits x {} items = {} pairs",
        matrix.traits().len(),
        matrix.items().len(),
        pairs.len()
    );
    pairs
        .par_iter()
        .map(|&(t, i)| analyze(matrix, t, i, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MatrixBuilder;

    // One respondent per answer, all in the trait `t` of the given categories.
    fn matrix_of(categories: &[&str], groups: Vec<(&str, Vec<f64>)>, ordinal: bool) -> ResponseMatrix {
        let items = vec![SentimentItem::new(
            "belong",
            "I feel I belong",
            (1.0, 6.0),
            Polarity::HigherIsBetter,
        )];
        let mut tdef = TraitDef::new("t", categories);
        tdef.ordinal = ordinal;
        let mut b = MatrixBuilder::new(&items, &[tdef]).unwrap();
        let mut idx = 0;
        for (cat, values) in groups {
            for v in values {
                b.add_respondent(&format!("r{}", idx), &[("t", cat)], &[("belong", Some(v))])
                    .unwrap();
                idx += 1;
            }
        }
        b.build()
    }

    fn conclusive(o: DisparityOutcome) -> DisparityResult {
        match o {
            DisparityOutcome::Conclusive(r) => r,
            x => panic!("expected a conclusive result, got {:?}", x),
        }
    }

    fn inconclusive(o: DisparityOutcome) -> InconclusiveResult {
        match o {
            DisparityOutcome::Inconclusive(r) => r,
            x => panic!("expected an inconclusive result, got {:?}", x),
        }
    }

    #[test]
    fn involvement_scenario() {
        let m = matrix_of(
            &["yes", "no"],
            vec![("yes", vec![5.0, 6.0, 5.0, 6.0, 5.0]), ("no", vec![3.0, 4.0, 3.0, 4.0, 3.0])],
            false,
        );
        let r = conclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.test, TestKind::WelchT);
        assert!(r.effect_size > 0.6);
        assert!((r.effect_size - 10.0 / 12.4).abs() < 1e-12);
        assert_eq!(r.category_means[0].category, "yes");
        assert!((r.category_means[0].mean - 5.4).abs() < 1e-12);
        assert!((r.category_means[1].mean - 3.4).abs() < 1e-12);
        // t = 2 / sqrt(0.12), df = 8
        assert!((r.statistic - 2.0 / 0.12f64.sqrt()).abs() < 1e-9);
        assert!((r.degrees_of_freedom.0 - 8.0).abs() < 1e-9);
        assert!(r.p_value < 0.001);
        assert_eq!(r.sample_size, 10);
        assert_eq!(r.trend, None);
    }

    #[test]
    fn single_respondent_categories_are_inconclusive() {
        let m = matrix_of(&["M", "F"], vec![("M", vec![4.0]), ("F", vec![4.0])], false);
        let r = inconclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.reason, InconclusiveReason::InsufficientCategoryCount);
        assert_eq!(r.reason.describe(), "insufficient category count");
        assert_eq!(r.category_counts, vec![("M".to_string(), 1), ("F".to_string(), 1)]);
    }

    #[test]
    fn single_category_is_inconclusive() {
        let m = matrix_of(&["M", "F"], vec![("M", vec![1.0, 2.0, 3.0, 4.0])], false);
        let r = inconclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.reason, InconclusiveReason::SingleCategory);
    }

    #[test]
    fn constant_answers_are_inconclusive() {
        let m = matrix_of(&["M", "F"], vec![("M", vec![4.0; 4]), ("F", vec![4.0; 3])], false);
        let r = inconclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.reason, InconclusiveReason::NoVariance);
    }

    #[test]
    fn anova_for_three_categories() {
        let m = matrix_of(
            &["9", "10", "11"],
            vec![
                ("9", vec![2.0, 3.0, 4.0]),
                ("10", vec![3.0, 4.0, 5.0]),
                ("11", vec![4.0, 5.0, 6.0]),
            ],
            true,
        );
        let r = conclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.test, TestKind::OneWayAnova);
        // SSB = 6, SSW = 6, F = (6/2) / (6/6) = 3
        assert!((r.statistic - 3.0).abs() < 1e-9);
        assert_eq!(r.degrees_of_freedom, (2.0, Some(6.0)));
        assert!((r.effect_size - 0.5).abs() < 1e-12);
        // P(F(2, 6) > 3) = 0.125
        assert!((r.p_value - 0.125).abs() < 1e-6);
        let trend = r.trend.unwrap();
        assert!(trend.rho > 0.5);
    }

    #[test]
    fn equal_means_give_zero_effect() {
        let m = matrix_of(
            &["a", "b"],
            vec![("a", vec![1.0, 2.0, 3.0]), ("b", vec![3.0, 2.0, 1.0])],
            false,
        );
        let r = conclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.effect_size, 0.0);
        assert!((r.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn perfect_separation() {
        let m = matrix_of(
            &["a", "b", "c"],
            vec![("a", vec![1.0; 3]), ("b", vec![6.0; 3]), ("c", vec![3.0; 3])],
            false,
        );
        let r = conclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(r.effect_size, 1.0);
        assert_eq!(r.p_value, 0.0);
        assert!(r.statistic.is_infinite());
    }

    #[test]
    fn rank_based_test() {
        let m = matrix_of(
            &["yes", "no"],
            vec![("yes", vec![5.0, 6.0, 5.0, 6.0, 5.0]), ("no", vec![3.0, 4.0, 3.0, 4.0, 3.0])],
            false,
        );
        let config = AnalysisConfig {
            group_test: GroupTest::RankBased,
            ..AnalysisConfig::DEFAULT
        };
        let r = conclusive(analyze(&m, 0, 0, &config));
        assert_eq!(r.test, TestKind::KruskalWallis);
        assert!(r.statistic > 6.0);
        assert!(r.p_value < 0.02);
        // The effect size does not depend on the test.
        assert!((r.effect_size - 10.0 / 12.4).abs() < 1e-12);
    }

    #[test]
    fn unknown_and_missing_are_excluded_per_pair() {
        let items = vec![
            SentimentItem::new("a", "a", (1.0, 6.0), Polarity::HigherIsBetter),
            SentimentItem::new("b", "b", (1.0, 6.0), Polarity::HigherIsBetter),
        ];
        let traits = vec![TraitDef::new("t", &["x", "y"])];
        let mut b = MatrixBuilder::new(&items, &traits).unwrap();
        let rows: [(&str, Option<f64>, Option<f64>); 8] = [
            ("x", Some(1.0), Some(2.0)),
            ("x", Some(2.0), Some(2.0)),
            ("x", Some(3.0), None),
            ("y", Some(4.0), Some(5.0)),
            ("y", Some(5.0), Some(5.0)),
            ("y", Some(6.0), Some(6.0)),
            ("", Some(6.0), Some(6.0)),
            ("y", None, Some(4.0)),
        ];
        for (idx, (t, va, vb)) in rows.iter().enumerate() {
            b.add_respondent(&format!("r{}", idx), &[("t", *t)], &[("a", *va), ("b", *vb)])
                .unwrap();
        }
        let m = b.build();
        let ra = conclusive(analyze(&m, 0, 0, &AnalysisConfig::DEFAULT));
        assert_eq!(ra.sample_size, 6);
        // Item b only has two answers in category x.
        let rb = inconclusive(analyze(&m, 0, 1, &AnalysisConfig::DEFAULT));
        assert_eq!(rb.category_counts, vec![("x".to_string(), 2), ("y".to_string(), 4)]);
    }

    #[test]
    fn analyze_all_preserves_order() {
        let m = matrix_of(
            &["yes", "no"],
            vec![("yes", vec![5.0, 6.0, 5.0]), ("no", vec![3.0, 4.0, 3.0])],
            false,
        );
        let outcomes = analyze_all(&m, &AnalysisConfig::DEFAULT);
        assert_eq!(outcomes.len(), 1);
        assert!(analyze_named(&m, "t", "nope", &AnalysisConfig::DEFAULT).is_err());
        assert_eq!(
            analyze_named(&m, "t", "belong", &AnalysisConfig::DEFAULT).unwrap(),
            outcomes[0]
        );
    }

    #[test]
    #[should_panic]
    fn analyze_out_of_range_item() {
        let m = matrix_of(
            &["yes", "no"],
            vec![("yes", vec![5.0, 6.0, 5.0]), ("no", vec![3.0, 4.0, 3.0])],
            false,
        );
        analyze(&m, 0, 3, &AnalysisConfig::DEFAULT);
    }

    #[test]
    fn ranks_with_ties() {
        let (ranks, ties) = average_ranks(&[3.0, 1.0, 3.0, 2.0]);
        assert_eq!(ranks, vec![3.5, 1.0, 3.5, 2.0]);
        assert_eq!(ties, vec![1, 1, 2]);
    }
}
