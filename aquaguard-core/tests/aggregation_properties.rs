//! Property tests for time-bucketed aggregation

mod common;

use aquaguard_core::{aggregate, aggregate_with_stats, Granularity, TelemetryReading};
use common::fish_at;
use proptest::prelude::*;

fn granularity() -> impl Strategy<Value = Granularity> {
    prop_oneof![
        Just(Granularity::Hour),
        Just(Granularity::Day),
        Just(Granularity::Week),
        Just(Granularity::Month),
        (1u64..=120).prop_map(|m| Granularity::interval_ms(m * 60_000).unwrap()),
    ]
}

fn readings() -> impl Strategy<Value = Vec<TelemetryReading>> {
    prop::collection::vec((0i64..60 * 24 * 45, 6.0f64..9.0), 0..200)
        .prop_map(|rows| rows.into_iter().map(|(minute, ph)| fish_at(minute, ph)).collect())
}

proptest! {
    #[test]
    fn every_valid_reading_lands_in_one_bucket(rows in readings(), g in granularity()) {
        let (points, stats) = aggregate_with_stats(&rows, g);

        prop_assert_eq!(stats.input, rows.len());
        prop_assert_eq!(stats.bucketed + stats.dropped, stats.input);
        prop_assert_eq!(stats.dropped, 0);
        prop_assert_eq!(points.len(), stats.buckets);
        prop_assert_eq!(points.iter().map(|p| p.sample_count).sum::<usize>(), rows.len());
    }

    #[test]
    fn points_are_ascending_and_inside_their_bucket(rows in readings(), g in granularity()) {
        let points = aggregate(&rows, g);

        for pair in points.windows(2) {
            prop_assert!(pair[0].bucket_start < pair[1].bucket_start);
            prop_assert!(pair[0].timestamp < pair[1].timestamp);
        }
        for point in &points {
            prop_assert_eq!(g.bucket_start(point.timestamp), Some(point.bucket_start));
        }
    }

    #[test]
    fn mean_lies_within_member_range(rows in readings(), g in granularity()) {
        for point in aggregate(&rows, g) {
            let members: Vec<f64> = rows
                .iter()
                .filter(|r| g.bucket_start(r.parsed_timestamp().unwrap()) == Some(point.bucket_start))
                .filter_map(|r| r.numeric("phLevel"))
                .collect();

            let lo = members.iter().cloned().fold(f64::INFINITY, f64::min);
            let hi = members.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mean = point.mean("phLevel").unwrap();
            prop_assert!(mean >= lo - 1e-9 && mean <= hi + 1e-9);

            let expected = members.iter().sum::<f64>() / members.len() as f64;
            prop_assert!((mean - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn aggregation_is_deterministic(rows in readings(), g in granularity()) {
        prop_assert_eq!(aggregate(&rows, g), aggregate(&rows, g));
    }

    #[test]
    fn buckets_do_not_depend_on_input_order(
        orders in readings().prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle())),
        g in granularity(),
    ) {
        let (rows, shuffled) = orders;
        let original = aggregate(&rows, g);
        let reordered = aggregate(&shuffled, g);

        prop_assert_eq!(original.len(), reordered.len());
        for (a, b) in original.iter().zip(&reordered) {
            prop_assert_eq!(a.bucket_start, b.bucket_start);
            prop_assert_eq!(a.sample_count, b.sample_count);
            prop_assert_eq!(a.fields.len(), b.fields.len());
            for (field, value) in &a.fields {
                let here = value.as_f64().unwrap();
                let there = b.mean(field).unwrap();
                prop_assert!((here - there).abs() < 1e-9, "{}: {} vs {}", field, here, there);
            }
            // Only the representative member may differ
            prop_assert_eq!(g.bucket_start(b.timestamp), Some(b.bucket_start));
        }
    }

    #[test]
    fn unknown_granularity_never_fails(name in "[a-z0-9]{0,12}") {
        let _ = Granularity::parse_lenient(&name);
    }
}

#[test]
fn hourly_scenario() {
    let rows = vec![fish_at(2, 7.0), fish_at(7, 7.2), fish_at(63, 7.4)];
    let points = aggregate(&rows, Granularity::Hour);

    assert_eq!(points.len(), 2);
    assert!((points[0].mean("phLevel").unwrap() - 7.1).abs() < 1e-9);
    assert!((points[1].mean("phLevel").unwrap() - 7.4).abs() < 1e-9);
    assert_eq!(points[0].mean("temperatureLevel"), Some(24.0));
}
