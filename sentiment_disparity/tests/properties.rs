//! Property-based tests of the analysis invariants.

use proptest::prelude::*;
use std::collections::BTreeMap;

use sentiment_disparity::builder::MatrixBuilder;
use sentiment_disparity::disparity::analyze;
use sentiment_disparity::flagging::flag_low;
use sentiment_disparity::scoring::score;
use sentiment_disparity::*;

// One item on a 1-6 scale, answered by the respondents of each group.
fn grouped(groups: &[Vec<u8>]) -> ResponseMatrix {
    let names: Vec<String> = (0..groups.len()).map(|i| format!("c{}", i)).collect();
    let categories: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let items = vec![SentimentItem::new("item", "item", (1.0, 6.0), Polarity::HigherIsBetter)];
    let traits = vec![TraitDef::new("t", &categories)];
    let mut builder = MatrixBuilder::new(&items, &traits).unwrap();
    let mut n = 0;
    for (g, values) in groups.iter().enumerate() {
        for v in values {
            builder
                .add_respondent(
                    &format!("r{}", n),
                    &[("t", categories[g])],
                    &[("item", Some(*v as f64))],
                )
                .unwrap();
            n += 1;
        }
    }
    builder.build()
}

fn answers(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(1u8..=6, len)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_effect_size_and_p_value_are_bounded(
        groups in prop::collection::vec(answers(3..12), 2..5),
        rank_based in any::<bool>(),
    ) {
        let config = AnalysisConfig {
            group_test: if rank_based { GroupTest::RankBased } else { GroupTest::Parametric },
            ..AnalysisConfig::default()
        };
        let matrix = grouped(&groups);
        match analyze(&matrix, 0, 0, &config) {
            DisparityOutcome::Conclusive(r) => {
                prop_assert!((0.0..=1.0).contains(&r.effect_size));
                prop_assert!((0.0..=1.0).contains(&r.p_value));
                prop_assert_eq!(r.sample_size, groups.iter().map(|g| g.len()).sum::<usize>());
            }
            DisparityOutcome::Inconclusive(r) => {
                prop_assert_eq!(r.reason, InconclusiveReason::NoVariance);
            }
        }
    }

    #[test]
    fn prop_small_category_is_inconclusive(
        big in answers(3..10),
        small in answers(1..3),
    ) {
        let matrix = grouped(&[big, small]);
        let outcome = analyze(&matrix, 0, 0, &AnalysisConfig::default());
        match outcome {
            DisparityOutcome::Inconclusive(r) => {
                prop_assert_eq!(r.reason, InconclusiveReason::InsufficientCategoryCount);
            }
            x => prop_assert!(false, "expected an inconclusive result, got {:?}", x),
        }
    }

    #[test]
    fn prop_mean_stays_on_the_scale(
        cells in prop::collection::vec(prop::option::of(1u8..=6), 1..40),
    ) {
        let items = vec![SentimentItem::new("item", "item", (1.0, 6.0), Polarity::HigherIsWorse)];
        let mut builder = MatrixBuilder::new(&items, &[]).unwrap();
        for (idx, c) in cells.iter().enumerate() {
            builder
                .add_respondent(&format!("r{}", idx), &[], &[("item", c.map(|v| v as f64))])
                .unwrap();
        }
        let matrix = builder.build();
        let config = AnalysisConfig { min_valid_responses: 1, ..AnalysisConfig::default() };
        let report = score(&matrix, &config);
        let answered = cells.iter().filter(|c| c.is_some()).count();
        match report.summaries.get("item") {
            Some(s) => {
                prop_assert_eq!(s.valid_count, answered);
                prop_assert!(s.mean >= 1.0 && s.mean <= 6.0);
                prop_assert!(s.std_dev >= 0.0);
            }
            None => prop_assert_eq!(answered, 0),
        }
    }

    #[test]
    fn prop_flagged_items_are_the_lowest(
        means in prop::collection::vec(1.0f64..6.0, 1..12),
        k in 0.0f64..2.5,
    ) {
        let summaries: BTreeMap<String, ItemSummary> = means
            .iter()
            .enumerate()
            .map(|(idx, m)| {
                let id = format!("q{:02}", idx);
                let s = ItemSummary {
                    item_id: id.clone(),
                    label: id.clone(),
                    mean: *m,
                    std_dev: 1.0,
                    valid_count: 10,
                    scale_min: 1.0,
                    scale_max: 6.0,
                    polarity: Polarity::HigherIsBetter,
                };
                (id, s)
            })
            .collect();
        let policy = ThresholdPolicy::StdDevCutoff(k);
        let flagged = flag_low(&summaries, policy);
        prop_assert_eq!(&flagged, &flag_low(&summaries, policy));
        for f in flagged.iter() {
            prop_assert!(f.normalized_score < -k);
        }
        // The flagged items are a prefix of the ranking.
        let ranked = sentiment_disparity::flagging::rank_items(&summaries);
        prop_assert_eq!(&ranked[..flagged.len()], &flagged[..]);
    }
}
