//! Trade-flow signature detection
//!
//! Scans executed trades (most recent first) for:
//! - Ping-pong trading: balanced buys and sells printing at near-identical prices
//! - Size clustering: the same trade size repeated many times

use anyhow::ensure;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::orderbook::analytics::patterns::quantize;
use crate::orderbook::analytics::types::{PatternEvent, PatternEvidence};
use crate::orderbook::book::ParsedTrade;
use crate::orderbook::types::{EvaluationWindow, TakerSide, Trade};

/// Decimal places trade sizes are rounded to before clustering
pub const SIZE_CLUSTER_DP: u32 = 4;

/// Trades accepted for flow analysis plus what was dropped
#[derive(Debug, Clone, Default)]
pub struct TradeSet {
    /// Most recent first
    pub trades: Vec<ParsedTrade>,
    pub malformed: usize,
    pub outside_lookback: usize,
}

/// Parse trades and keep those inside the lookback ending at the window end
///
/// Malformed trades are skipped and counted.
pub fn prepare_trades(raw: &[Trade], window: &EvaluationWindow, lookback: Duration) -> TradeSet {
    let lookback_start = std::cmp::max(window.start, window.end - lookback);
    let mut set = TradeSet::default();

    for trade in raw {
        if trade.executed_at < lookback_start || trade.executed_at > window.end {
            set.outside_lookback += 1;
            continue;
        }
        match ParsedTrade::from_trade(trade) {
            Ok(parsed) => set.trades.push(parsed),
            Err(e) => {
                tracing::warn!(
                    venue = %trade.venue,
                    instrument = %trade.instrument,
                    trade_id = %trade.trade_id,
                    error = %e,
                    "Skipping malformed trade"
                );
                set.malformed += 1;
            }
        }
    }

    set.trades.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
    set
}

/// Run both trade-flow detectors
///
/// # Errors
///
/// Returns `InsufficientData` when there are no trades
pub fn detect_trade_flow(
    trades: &[ParsedTrade],
    venue: &str,
    instrument: &str,
    config: &AnalyticsConfig,
) -> Result<Vec<PatternEvent>> {
    if trades.is_empty() {
        return Err(AnalyticsError::InsufficientData(
            "no trades in lookback".to_string(),
        ));
    }

    let mut events = detect_ping_pong(
        trades,
        venue,
        instrument,
        config.ping_pong_window,
        config.ping_pong_min_side_trades,
        config.ping_pong_max_rel_diff,
    )
    .map_err(|e| AnalyticsError::Computation(e.to_string()))?;

    events.extend(detect_size_clusters(
        trades,
        venue,
        instrument,
        config.size_cluster_min_count,
    ));

    Ok(events)
}

/// Sliding windows of `window_size` trades with more than `min_side_trades`
/// buys and sells whose mean prices differ by less than `max_rel_diff`
/// relative to the mean buy price
pub fn detect_ping_pong(
    trades: &[ParsedTrade],
    venue: &str,
    instrument: &str,
    window_size: usize,
    min_side_trades: usize,
    max_rel_diff: f64,
) -> anyhow::Result<Vec<PatternEvent>> {
    use statrs::statistics::Statistics;

    ensure!(window_size > 0, "ping-pong window must hold at least one trade");

    let mut events = Vec::new();

    for window in trades.windows(window_size) {
        let buys = side_prices(window, TakerSide::Buy);
        let sells = side_prices(window, TakerSide::Sell);

        if buys.len() <= min_side_trades || sells.len() <= min_side_trades {
            continue;
        }

        let avg_buy_price = buys.iter().mean();
        let avg_sell_price = sells.iter().mean();
        if avg_buy_price <= 0.0 {
            continue;
        }

        let rel_diff = (avg_buy_price - avg_sell_price).abs() / avg_buy_price;
        if rel_diff >= max_rel_diff {
            continue;
        }

        let (window_start, window_end) = time_span(window);
        events.push(PatternEvent::new(
            venue,
            instrument,
            window_end,
            PatternEvidence::PingPong {
                avg_buy_price,
                avg_sell_price,
                trade_count: window.len(),
                window_start,
                window_end,
            },
        ));
    }

    Ok(events)
}

/// Quantized sizes occurring more than `min_count` times
///
/// Ordered by frequency (highest first), then size.
pub fn detect_size_clusters(
    trades: &[ParsedTrade],
    venue: &str,
    instrument: &str,
    min_count: usize,
) -> Vec<PatternEvent> {
    let Some(latest) = trades.iter().map(|t| t.executed_at).max() else {
        return Vec::new();
    };

    let mut frequency: BTreeMap<Decimal, usize> = BTreeMap::new();
    for trade in trades {
        *frequency
            .entry(quantize(trade.size, SIZE_CLUSTER_DP))
            .or_insert(0) += 1;
    }

    let total = trades.len() as f64;
    let mut clusters: Vec<(Decimal, usize)> = frequency
        .into_iter()
        .filter(|(_, count)| *count > min_count)
        .collect();
    clusters.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    clusters
        .into_iter()
        .map(|(size, count)| {
            PatternEvent::new(
                venue,
                instrument,
                latest,
                PatternEvidence::SizeCluster {
                    size,
                    frequency: count,
                    percentage: count as f64 / total * 100.0,
                },
            )
        })
        .collect()
}

fn side_prices(trades: &[ParsedTrade], side: TakerSide) -> Vec<f64> {
    trades
        .iter()
        .filter(|t| t.side == side)
        .filter_map(|t| t.price.to_f64())
        .collect()
}

fn time_span(trades: &[ParsedTrade]) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = trades.iter().map(|t| t.executed_at).min();
    let end = trades.iter().map(|t| t.executed_at).max();
    match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => (DateTime::<Utc>::MIN_UTC, DateTime::<Utc>::MIN_UTC),
    }
}
