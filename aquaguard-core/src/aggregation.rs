//! Time-Bucketed Aggregation
//!
//! ## Overview
//!
//! Reduces a series of readings to one averaged point per populated time
//! bucket. Used to keep chart payloads small when a range spans days or
//! weeks of ten-minute data.
//!
//! ## Algorithm
//!
//! 1. Parse each reading's timestamp (UTC). Readings without a usable
//!    timestamp are dropped and counted, never bucketed.
//! 2. Key each reading by the start of its bucket ([`Granularity::bucket_start`]).
//!    Members keep their input order inside a bucket.
//! 3. Per bucket, average every numeric field over the members that define
//!    it. Fields that are null everywhere in the bucket are omitted.
//! 4. Take `timestamp` and `systemId` from the member at index `len / 2`.
//!
//! Output is ordered by bucket start, which is also ascending by
//! representative timestamp because every member lies inside its bucket.
//!
//! ## Invariants
//!
//! - Every reading with a valid timestamp lands in exactly one bucket
//! - `stats.bucketed + stats.dropped == stats.input`
//! - Sum of `sample_count` over all points equals `stats.bucketed`
//! - Same input and granularity always give the same output

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::telemetry::TelemetryReading;
use crate::time::Granularity;

/// One averaged bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPoint {
    /// Timestamp of the representative (index-median) member
    pub timestamp: DateTime<Utc>,

    /// System id of the representative member
    #[serde(rename = "systemId")]
    pub system_id: String,

    /// Mean of each numeric field, in first-seen order
    #[serde(flatten)]
    pub fields: Map<String, Value>,

    /// Start of the bucket this point summarizes
    #[serde(skip)]
    pub bucket_start: DateTime<Utc>,

    /// Number of readings averaged into this point
    #[serde(skip)]
    pub sample_count: usize,
}

impl AggregatedPoint {
    /// Averaged value of a field.
    pub fn mean(&self, field: &str) -> Option<f64> {
        self.fields.get(field).and_then(Value::as_f64)
    }
}

/// Counters describing one aggregation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AggregationStats {
    /// Readings offered
    pub input: usize,
    /// Readings placed in a bucket
    pub bucketed: usize,
    /// Readings dropped for a missing or malformed timestamp
    pub dropped: usize,
    /// Populated buckets (= output points)
    pub buckets: usize,
}

/// Aggregate readings into one point per populated bucket.
pub fn aggregate<'a, I>(readings: I, granularity: Granularity) -> Vec<AggregatedPoint>
where
    I: IntoIterator<Item = &'a TelemetryReading>,
{
    aggregate_with_stats(readings, granularity).0
}

/// [`aggregate`], also reporting how many readings were bucketed or dropped.
pub fn aggregate_with_stats<'a, I>(
    readings: I,
    granularity: Granularity,
) -> (Vec<AggregatedPoint>, AggregationStats)
where
    I: IntoIterator<Item = &'a TelemetryReading>,
{
    let mut stats = AggregationStats::default();
    let mut buckets: BTreeMap<DateTime<Utc>, Vec<(&'a TelemetryReading, DateTime<Utc>)>> =
        BTreeMap::new();

    for reading in readings {
        stats.input += 1;

        let at = match reading.parsed_timestamp() {
            Ok(at) => at,
            Err(e) => {
                log_warn!("Dropping reading from {}: {}", reading.system_id, e);
                stats.dropped += 1;
                continue;
            }
        };

        match granularity.bucket_start(at) {
            Some(start) => {
                buckets.entry(start).or_default().push((reading, at));
                stats.bucketed += 1;
            }
            None => {
                log_warn!("Dropping reading at {}: bucket start not representable", at);
                stats.dropped += 1;
            }
        }
    }

    stats.buckets = buckets.len();
    log_debug!(
        "Aggregated {} readings into {} {} buckets ({} dropped)",
        stats.bucketed,
        stats.buckets,
        granularity,
        stats.dropped
    );

    let points = buckets
        .into_iter()
        .filter_map(|(start, members)| reduce_bucket(start, &members))
        .collect();

    (points, stats)
}

struct FieldMean<'a> {
    name: &'a str,
    sum: f64,
    // Incremental mean; stays finite when `sum` overflows
    running: f64,
    count: usize,
}

impl<'a> FieldMean<'a> {
    fn new(name: &'a str, value: f64) -> Self {
        Self { name, sum: value, running: value, count: 1 }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        let n = self.count as f64;
        self.sum += value;
        self.running = self.running - self.running / n + value / n;
    }

    fn mean(&self) -> f64 {
        if self.sum.is_finite() {
            self.sum / self.count as f64
        } else {
            log_warn!("Sum of {} overflowed; using incremental mean", self.name);
            self.running
        }
    }
}

fn reduce_bucket(
    start: DateTime<Utc>,
    members: &[(&TelemetryReading, DateTime<Utc>)],
) -> Option<AggregatedPoint> {
    let (representative, at) = members.get(members.len() / 2)?;

    let mut means: Vec<FieldMean<'_>> = Vec::new();
    for (reading, _) in members {
        for (name, value) in reading.numeric_fields() {
            match means.iter_mut().find(|m| m.name == name) {
                Some(mean) => mean.push(value),
                None => means.push(FieldMean::new(name, value)),
            }
        }
    }

    let fields = means
        .into_iter()
        .map(|m| (m.name.to_string(), Value::from(m.mean())))
        .collect();

    Some(AggregatedPoint {
        timestamp: *at,
        system_id: representative.system_id.clone(),
        fields,
        bucket_start: start,
        sample_count: members.len(),
    })
}

/// Readings whose timestamp lies in the inclusive range `[start, end]`.
///
/// Either bound may be open. Readings without a valid timestamp are excluded.
pub fn filter_range<'a, I>(
    readings: I,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &'a TelemetryReading>
where
    I: IntoIterator<Item = &'a TelemetryReading>,
{
    readings.into_iter().filter(move |reading| match reading.parsed_timestamp() {
        Ok(at) => start.map_or(true, |s| at >= s) && end.map_or(true, |e| at <= e),
        Err(_) => false,
    })
}

/// Series returned by a range query: untouched readings or aggregated points.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Resampled {
    /// Readings in range, no aggregation
    Raw(Vec<TelemetryReading>),
    /// One point per populated bucket
    Aggregated(Vec<AggregatedPoint>),
}

impl Resampled {
    /// Filter to `[start, end]` then aggregate when a granularity is given.
    pub fn build<'a, I>(
        readings: I,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        granularity: Option<Granularity>,
    ) -> Self
    where
        I: IntoIterator<Item = &'a TelemetryReading>,
    {
        let in_range = filter_range(readings, start, end);
        match granularity {
            Some(granularity) => Resampled::Aggregated(aggregate(in_range, granularity)),
            None => Resampled::Raw(in_range.cloned().collect()),
        }
    }

    /// Number of entries in the series.
    pub fn len(&self) -> usize {
        match self {
            Resampled::Raw(readings) => readings.len(),
            Resampled::Aggregated(points) => points.len(),
        }
    }

    /// True when the series has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::parse_timestamp;

    fn reading(ts: &str, ph: f64) -> TelemetryReading {
        TelemetryReading::new(ts).with_value("phLevel", ph)
    }

    #[test]
    fn hourly_means() {
        let readings = vec![
            reading("2024-03-07T00:02:00Z", 7.0),
            reading("2024-03-07T00:07:00Z", 7.2),
            reading("2024-03-07T01:03:00Z", 7.4),
        ];

        let points = aggregate(&readings, Granularity::Hour);
        assert_eq!(points.len(), 2);
        assert!((points[0].mean("phLevel").unwrap() - 7.1).abs() < 1e-9);
        assert_eq!(points[0].sample_count, 2);
        assert!((points[1].mean("phLevel").unwrap() - 7.4).abs() < 1e-9);
        assert_eq!(points[1].timestamp, parse_timestamp("2024-03-07T01:03:00Z").unwrap());
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let readings: Vec<TelemetryReading> = Vec::new();
        let (points, stats) = aggregate_with_stats(&readings, Granularity::Day);
        assert!(points.is_empty());
        assert_eq!(stats, AggregationStats::default());
    }

    #[test]
    fn drops_untimed_readings() {
        let readings = vec![
            reading("2024-03-07T00:02:00Z", 7.0),
            TelemetryReading::untimed().with_value("phLevel", 9.0),
            reading("not a time", 9.0),
        ];

        let (points, stats) = aggregate_with_stats(&readings, Granularity::Hour);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].mean("phLevel"), Some(7.0));
        assert_eq!(stats.input, 3);
        assert_eq!(stats.bucketed, 1);
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn huge_values_do_not_overflow_the_mean() {
        let readings = vec![
            reading("2024-03-07T00:00:00Z", f64::MAX),
            reading("2024-03-07T00:10:00Z", f64::MAX),
        ];

        let points = aggregate(&readings, Granularity::Hour);
        assert_eq!(points[0].mean("phLevel"), Some(f64::MAX));
        let json = serde_json::to_value(&points[0]).unwrap();
        assert!(json["phLevel"].is_number());
    }

    #[test]
    fn representative_is_index_median_in_input_order() {
        let readings = vec![
            reading("2024-03-07T00:40:00Z", 7.0).with_system_id("a"),
            reading("2024-03-07T00:10:00Z", 7.0).with_system_id("b"),
            reading("2024-03-07T00:20:00Z", 7.0).with_system_id("c"),
            reading("2024-03-07T00:30:00Z", 7.0).with_system_id("d"),
        ];

        let points = aggregate(&readings, Granularity::Hour);
        assert_eq!(points[0].system_id, "c");
        assert_eq!(points[0].timestamp, parse_timestamp("2024-03-07T00:20:00Z").unwrap());
    }

    #[test]
    fn fields_from_any_member_are_averaged() {
        let readings = vec![
            reading("2024-03-07T00:00:00Z", 7.0),
            TelemetryReading::new("2024-03-07T00:10:00Z")
                .with_field("phLevel", Value::Null)
                .with_value("ecLevel", 1.5),
            reading("2024-03-07T00:20:00Z", 8.0).with_field("turbidityLevel", Value::Null),
        ];

        let points = aggregate(&readings, Granularity::Hour);
        let point = &points[0];
        assert_eq!(point.mean("phLevel"), Some(7.5));
        assert_eq!(point.mean("ecLevel"), Some(1.5));
        assert!(!point.fields.contains_key("turbidityLevel"));
        let names: Vec<&str> = point.fields.keys().map(String::as_str).collect();
        assert_eq!(names, ["phLevel", "ecLevel"]);
    }

    #[test]
    fn unsorted_input_yields_ascending_points() {
        let readings = vec![
            reading("2024-03-09T12:00:00Z", 7.0),
            reading("2024-03-07T12:00:00Z", 7.0),
            reading("2024-03-08T12:00:00Z", 7.0),
        ];

        let points = aggregate(&readings, Granularity::Day);
        assert_eq!(points.len(), 3);
        assert!(points.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn serialized_point_hides_bucket_metadata() {
        let readings = vec![reading("2024-03-07T00:02:00Z", 7.0)];
        let points = aggregate(&readings, Granularity::Hour);
        let json = serde_json::to_value(&points[0]).unwrap();
        assert_eq!(json["timestamp"], "2024-03-07T00:02:00Z");
        assert_eq!(json["systemId"], "system-001");
        assert_eq!(json["phLevel"], 7.0);
        assert!(json.get("sampleCount").is_none());
        assert!(json.get("bucket_start").is_none());
    }

    #[test]
    fn range_filter_is_inclusive() {
        let readings = vec![
            reading("2024-03-07T00:00:00Z", 7.0),
            reading("2024-03-07T01:00:00Z", 7.1),
            reading("2024-03-07T02:00:00Z", 7.2),
            TelemetryReading::untimed(),
        ];
        let start = parse_timestamp("2024-03-07T00:00:00Z").ok();
        let end = parse_timestamp("2024-03-07T01:00:00Z").ok();

        assert_eq!(filter_range(&readings, start, end).count(), 2);
        assert_eq!(filter_range(&readings, None, None).count(), 3);
        assert_eq!(filter_range(&readings, end, None).count(), 2);
    }

    #[test]
    fn resampled_raw_keeps_readings() {
        let readings = vec![reading("2024-03-07T00:00:00Z", 7.0)];
        match Resampled::build(&readings, None, None, None) {
            Resampled::Raw(out) => assert_eq!(out, readings),
            other => panic!("expected raw series, got {:?}", other),
        }
    }
}
