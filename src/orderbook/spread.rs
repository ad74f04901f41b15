//! Spread statistics and quoting presence over a window

use crate::orderbook::book::Book;
use crate::orderbook::types::{EvaluationWindow, SpreadSample};
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::HashSet;

/// Width of a presence bucket
pub const PRESENCE_BUCKET_SECS: i64 = 60;

/// Aggregate spread over a window, in basis points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpreadStats {
    pub avg_bps: f64,
    pub min_bps: f64,
    pub max_bps: f64,
    /// Population standard deviation
    pub stdev_bps: f64,
    pub sample_count: usize,
}

pub fn spread_sample(book: &Book) -> SpreadSample {
    SpreadSample {
        venue: book.venue().to_string(),
        instrument: book.instrument().to_string(),
        timestamp: book.captured_at(),
        spread_bps: book.spread_bps(),
    }
}

/// Returns None for an empty sample set
pub fn spread_stats(samples: &[SpreadSample]) -> Option<SpreadStats> {
    if samples.is_empty() {
        return None;
    }

    let values: Vec<f64> = samples.iter().map(|s| s.spread_bps).collect();
    let min_bps = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max_bps = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(SpreadStats {
        avg_bps: values.iter().mean(),
        min_bps,
        max_bps,
        stdev_bps: values.iter().population_std_dev(),
        sample_count: values.len(),
    })
}

/// Minute bucket a timestamp falls into
fn bucket(ts: DateTime<Utc>) -> i64 {
    ts.timestamp().div_euclid(PRESENCE_BUCKET_SECS)
}

/// Number of minute buckets an inclusive window touches
pub fn expected_buckets(window: &EvaluationWindow) -> i64 {
    bucket(window.end) - bucket(window.start) + 1
}

/// Share of the window's minute buckets holding at least one valid snapshot
///
/// Timestamps outside the window are ignored. Result is in [0, 100].
pub fn presence_pct<I>(captured: I, window: &EvaluationWindow) -> f64
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let expected = expected_buckets(window);
    if expected <= 0 {
        return 0.0;
    }

    let observed: HashSet<i64> = captured
        .into_iter()
        .filter(|ts| window.contains(*ts))
        .map(bucket)
        .collect();

    let pct = observed.len() as f64 / expected as f64 * 100.0;
    pct.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::book::tests::book_at;
    use chrono::{Duration, TimeZone};

    fn window_minutes(minutes: i64) -> EvaluationWindow {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        EvaluationWindow::new(start, start + Duration::minutes(minutes)).unwrap()
    }

    #[test]
    fn test_spread_stats() {
        let samples: Vec<SpreadSample> = [2.0, 4.0, 6.0]
            .iter()
            .map(|&bps| SpreadSample {
                venue: "gate".to_string(),
                instrument: "BTCUSDT".to_string(),
                timestamp: Utc::now(),
                spread_bps: bps,
            })
            .collect();

        let stats = spread_stats(&samples).unwrap();
        assert_eq!(stats.avg_bps, 4.0);
        assert_eq!(stats.min_bps, 2.0);
        assert_eq!(stats.max_bps, 6.0);
        assert!((stats.stdev_bps - (8.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert_eq!(stats.sample_count, 3);

        assert!(spread_stats(&[]).is_none());
    }

    #[test]
    fn test_spread_sample_non_negative() {
        let book = book_at(0, &[("100", "1")], &[("100.1", "1")]);
        let sample = spread_sample(&book);
        assert!(sample.spread_bps >= 0.0);
        assert!((sample.spread_bps - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_buckets_inclusive() {
        assert_eq!(expected_buckets(&window_minutes(60)), 61);
        assert_eq!(expected_buckets(&window_minutes(0)), 1);
    }

    #[test]
    fn test_presence_counts_distinct_buckets() {
        let window = window_minutes(9); // 10 buckets
        let start = window.start;
        let captured = vec![
            start,
            start + Duration::seconds(30), // same bucket
            start + Duration::minutes(1),
            start + Duration::minutes(5),
            start + Duration::minutes(20), // outside
        ];

        let pct = presence_pct(captured, &window);
        assert!((pct - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_presence_bounds() {
        let window = window_minutes(2);
        assert_eq!(presence_pct(Vec::new(), &window), 0.0);

        let every_second: Vec<_> = (0..=120)
            .map(|s| window.start + Duration::seconds(s))
            .collect();
        assert_eq!(presence_pct(every_second, &window), 100.0);
    }
}
