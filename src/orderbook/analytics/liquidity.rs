//! Liquidity profiling
//!
//! Composite 0-100 liquidity score combining:
//! - Tight spread (30 points when avg spread < 10 bps)
//! - Stable spread (20 points when spread stdev < 5 bps)
//! - Near-book depth (25 points when mean bid depth within 1% > 10)
//! - Balanced book (25 points when |mean imbalance| < 0.2)

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;

use crate::orderbook::analytics::types::{BandMeanDepth, LiquidityScore};
use crate::orderbook::book::Book;
use crate::orderbook::depth::band_volumes;
use crate::orderbook::spread::{presence_pct, spread_sample, spread_stats};
use crate::orderbook::types::{DepthMetric, EvaluationWindow, SpreadSample};

const TIGHT_SPREAD_BPS: f64 = 10.0;
const STABLE_SPREAD_BPS: f64 = 5.0;
const DEEP_BOOK_VOLUME: f64 = 10.0;
const BALANCED_IMBALANCE: f64 = 0.2;

/// Band the depth component is measured on
pub const SCORE_BAND_PCT: u32 = 1;

/// Profile liquidity across the valid snapshots of a window
///
/// `depth_metrics` must hold one entry per book, computed with the same
/// band list. Returns an all-zero profile when `books` is empty.
pub fn profile_liquidity(
    venue: &str,
    instrument: &str,
    window: &EvaluationWindow,
    books: &[Book],
    depth_metrics: &[DepthMetric],
    top_k: usize,
) -> LiquidityScore {
    let mut profile = LiquidityScore {
        venue: venue.to_string(),
        instrument: instrument.to_string(),
        window: *window,
        avg_spread_bps: 0.0,
        min_spread_bps: 0.0,
        max_spread_bps: 0.0,
        spread_volatility: 0.0,
        mean_imbalance: 0.0,
        imbalance_std: 0.0,
        current_imbalance: 0.0,
        band_depths: Vec::new(),
        depth_1pct: 0.0,
        presence_pct: presence_pct(books.iter().map(|b| b.captured_at()), window),
        snapshot_count: books.len(),
        score: 0.0,
    };

    if books.is_empty() {
        return profile;
    }

    let samples: Vec<SpreadSample> = books.iter().map(spread_sample).collect();
    if let Some(stats) = spread_stats(&samples) {
        profile.avg_spread_bps = stats.avg_bps;
        profile.min_spread_bps = stats.min_bps;
        profile.max_spread_bps = stats.max_bps;
        profile.spread_volatility = stats.stdev_bps;
    }

    let imbalances: Vec<f64> = books.iter().filter_map(|b| b.imbalance(top_k)).collect();
    // A window without any measurable imbalance cannot earn the balance points
    let has_imbalance = !imbalances.is_empty();
    if has_imbalance {
        profile.mean_imbalance = imbalances.iter().mean();
        profile.imbalance_std = imbalances.iter().population_std_dev();
    }
    profile.current_imbalance = books
        .iter()
        .max_by_key(|b| b.captured_at())
        .and_then(|b| b.imbalance(top_k))
        .unwrap_or(0.0);

    profile.band_depths = mean_band_depths(depth_metrics);
    profile.depth_1pct = mean_bid_depth(books, Decimal::from(SCORE_BAND_PCT));

    profile.score = liquidity_score(
        profile.avg_spread_bps,
        profile.spread_volatility,
        profile.depth_1pct,
        has_imbalance.then_some(profile.mean_imbalance),
    );

    profile
}

/// Composite score in [0, 100]
pub fn liquidity_score(
    avg_spread_bps: f64,
    spread_stdev: f64,
    depth_1pct: f64,
    mean_imbalance: Option<f64>,
) -> f64 {
    let mut score = 0.0;

    if avg_spread_bps < TIGHT_SPREAD_BPS {
        score += 30.0;
    }
    if spread_stdev < STABLE_SPREAD_BPS {
        score += 20.0;
    }
    if depth_1pct > DEEP_BOOK_VOLUME {
        score += 25.0;
    }
    if mean_imbalance.is_some_and(|m| m.abs() < BALANCED_IMBALANCE) {
        score += 25.0;
    }

    f64::clamp(score, 0.0, 100.0)
}

/// Mean bid and ask volume per band, in band order
fn mean_band_depths(depth_metrics: &[DepthMetric]) -> Vec<BandMeanDepth> {
    let Some(first) = depth_metrics.first() else {
        return Vec::new();
    };

    first
        .bands
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let bids: Vec<f64> = depth_metrics
                .iter()
                .filter_map(|m| m.bands.get(i))
                .filter_map(|b| b.bid_volume.to_f64())
                .collect();
            let asks: Vec<f64> = depth_metrics
                .iter()
                .filter_map(|m| m.bands.get(i))
                .filter_map(|b| b.ask_volume.to_f64())
                .collect();

            BandMeanDepth {
                band_pct: band.band_pct,
                mean_bid_volume: if bids.is_empty() { 0.0 } else { bids.iter().mean() },
                mean_ask_volume: if asks.is_empty() { 0.0 } else { asks.iter().mean() },
            }
        })
        .collect()
}

fn mean_bid_depth(books: &[Book], band_pct: Decimal) -> f64 {
    let volumes: Vec<f64> = books
        .iter()
        .filter_map(|b| band_volumes(b, band_pct).ok())
        .filter_map(|(bid_volume, _)| bid_volume.to_f64())
        .collect();
    if volumes.is_empty() {
        return 0.0;
    }
    volumes.iter().mean()
}
