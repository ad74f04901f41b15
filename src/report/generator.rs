// Report generator - composes every analytics stage into an MMReport

use chrono::{Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::{Diagnostics, MMReport, ReportStage};
use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::orderbook::analytics::flow::{detect_trade_flow, prepare_trades};
use crate::orderbook::analytics::liquidity::profile_liquidity;
use crate::orderbook::analytics::patterns::{mm_probability_score, scan_snapshots};
use crate::orderbook::analytics::{PatternCounts, PatternEvent};
use crate::orderbook::book::Book;
use crate::orderbook::depth::depth_metric;
use crate::orderbook::spread::{spread_sample, spread_stats};
use crate::orderbook::types::{DepthMetric, EvaluationWindow, OrderBookSnapshot, Trade};
use crate::store::FactStore;

/// Everything an evaluation needs, built once at startup
#[derive(Clone)]
pub struct EvaluationContext {
    config: AnalyticsConfig,
    store: Arc<dyn FactStore>,
}

impl EvaluationContext {
    /// # Errors
    ///
    /// Returns `Configuration` if the config fails validation
    pub fn new(config: AnalyticsConfig, store: Arc<dyn FactStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, store })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn FactStore> {
        &self.store
    }

    /// Check identifiers and window, returning the normalized (venue, instrument)
    ///
    /// # Errors
    ///
    /// Returns `Input` for empty or malformed ids, ids missing from the
    /// configured lists, or an inverted window
    pub fn validate_request(
        &self,
        venue: &str,
        instrument: &str,
        window: &EvaluationWindow,
    ) -> Result<(String, String)> {
        let venue = venue.trim();
        let instrument = instrument.trim().to_uppercase();

        check_identifier("venue", venue)?;
        check_identifier("instrument", &instrument)?;

        if !self.config.venues.is_empty() && !self.config.venues.iter().any(|v| v == venue) {
            return Err(AnalyticsError::Input(format!("unknown venue '{}'", venue)));
        }

        if !self.config.instruments.is_empty()
            && !self
                .config
                .instruments
                .iter()
                .any(|i| i.eq_ignore_ascii_case(&instrument))
        {
            return Err(AnalyticsError::Input(format!(
                "unknown instrument '{}'",
                instrument
            )));
        }

        if window.start > window.end {
            return Err(AnalyticsError::Input(format!(
                "window start {} is after end {}",
                window.start, window.end
            )));
        }

        Ok((venue.to_string(), instrument))
    }
}

impl std::fmt::Debug for EvaluationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluationContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn check_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AnalyticsError::Input(format!("{} must not be empty", field)));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AnalyticsError::Input(format!(
            "{} '{}' contains characters outside [A-Za-z0-9_-]",
            field, value
        )));
    }
    Ok(())
}

/// Evaluate one (venue, instrument, window) against the context's fact store
///
/// # Errors
///
/// Only `Input` errors are returned; every per-record or per-stage failure
/// is recorded in the report diagnostics instead.
pub fn evaluate(
    ctx: &EvaluationContext,
    venue: &str,
    instrument: &str,
    window: EvaluationWindow,
) -> Result<MMReport> {
    evaluate_with_deadline(ctx, venue, instrument, window, None)
}

/// Same as [`evaluate`], skipping stages not started before `deadline`
pub fn evaluate_with_deadline(
    ctx: &EvaluationContext,
    venue: &str,
    instrument: &str,
    window: EvaluationWindow,
    deadline: Option<Instant>,
) -> Result<MMReport> {
    let (venue, instrument) = ctx.validate_request(venue, instrument, &window)?;

    let snapshots = ctx.store.snapshots(&venue, &instrument, &window);
    let trades = ctx.store.trades(&venue, &instrument, &window);

    Ok(build_report(
        &ctx.config,
        &venue,
        &instrument,
        window,
        &snapshots,
        &trades,
        deadline,
    ))
}

/// Build a report from already-fetched facts
///
/// Pure function of its inputs and the config, apart from the report id and
/// generation time. Snapshots and trades may arrive in any order.
pub fn build_report(
    config: &AnalyticsConfig,
    venue: &str,
    instrument: &str,
    window: EvaluationWindow,
    snapshots: &[OrderBookSnapshot],
    trades: &[Trade],
    deadline: Option<Instant>,
) -> MMReport {
    let mut diagnostics = Diagnostics {
        snapshots_received: snapshots.len(),
        trades_received: trades.len(),
        ..Default::default()
    };

    let books = validate_snapshots(snapshots, &window, &mut diagnostics);
    diagnostics.snapshots_used = books.len();

    let mut stages = StageGate::new(deadline);

    // Depth
    let mut depth_metrics: Vec<DepthMetric> = Vec::new();
    if stages.enter(ReportStage::Depth) {
        for book in &books {
            match depth_metric(book, &config.band_pcts) {
                Ok(metric) => depth_metrics.push(metric),
                Err(e) => tracing::warn!(
                    venue = %venue,
                    instrument = %instrument,
                    captured_at = %book.captured_at(),
                    error = %e,
                    "Depth aggregation failed"
                ),
            }
        }
        tracing::debug!(venue = %venue, instrument = %instrument, metrics = depth_metrics.len(), "Depth stage complete");
    }

    // Liquidity and spread
    let mut liquidity = profile_liquidity(venue, instrument, &window, &[], &[], config.top_k);
    let mut spread = None;
    if stages.enter(ReportStage::Liquidity) {
        liquidity = profile_liquidity(
            venue,
            instrument,
            &window,
            &books,
            &depth_metrics,
            config.top_k,
        );
        let samples: Vec<_> = books.iter().map(spread_sample).collect();
        spread = spread_stats(&samples);
        tracing::debug!(venue = %venue, instrument = %instrument, score = liquidity.score, "Liquidity stage complete");
    }

    // Order book patterns
    let mut pattern_events: Vec<PatternEvent> = Vec::new();
    if stages.enter(ReportStage::Patterns) {
        match scan_snapshots(&books, config) {
            Ok(scan) => {
                diagnostics.skipped_snapshot_pairs = scan.skipped_pairs;
                pattern_events = scan.events;
            }
            Err(e) => diagnostics.insufficient_data.push(format!("patterns: {}", e)),
        }
        tracing::debug!(venue = %venue, instrument = %instrument, events = pattern_events.len(), "Pattern stage complete");
    }

    // Trade flow
    let mut trade_flow: Vec<PatternEvent> = Vec::new();
    if stages.enter(ReportStage::TradeFlow) {
        let set = prepare_trades(
            trades,
            &window,
            Duration::seconds(config.trade_lookback_secs),
        );
        diagnostics.trades_used = set.trades.len();
        diagnostics.malformed_trades = set.malformed;
        diagnostics.trades_outside_lookback = set.outside_lookback;

        match detect_trade_flow(&set.trades, venue, instrument, config) {
            Ok(events) => trade_flow = events,
            Err(e) => diagnostics.insufficient_data.push(format!("trade_flow: {}", e)),
        }
        tracing::debug!(venue = %venue, instrument = %instrument, events = trade_flow.len(), "Trade flow stage complete");
    }

    diagnostics.skipped_stages = stages.skipped;
    diagnostics.degraded = !diagnostics.skipped_stages.is_empty();
    if diagnostics.degraded {
        tracing::warn!(
            venue = %venue,
            instrument = %instrument,
            skipped = ?diagnostics.skipped_stages,
            "Evaluation deadline passed, report degraded"
        );
    }

    let pattern_counts = PatternCounts::from_events(pattern_events.iter().chain(trade_flow.iter()));
    let mm_probability_score = mm_probability_score(&pattern_counts);

    MMReport {
        report_id: Uuid::new_v4(),
        generated_at: Utc::now(),
        venue: venue.to_string(),
        instrument: instrument.to_string(),
        window,
        pattern_events,
        trade_flow,
        liquidity,
        depth_metrics,
        spread,
        pattern_counts,
        mm_probability_score,
        diagnostics,
    }
}

/// Parse snapshots inside the window into books, oldest first
fn validate_snapshots(
    snapshots: &[OrderBookSnapshot],
    window: &EvaluationWindow,
    diagnostics: &mut Diagnostics,
) -> Vec<Book> {
    let mut books = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        if !window.contains(snapshot.captured_at) {
            diagnostics.snapshots_outside_window += 1;
            continue;
        }
        match Book::from_snapshot(snapshot) {
            Ok(book) => books.push(book),
            Err(e) => {
                match e {
                    AnalyticsError::InvalidSnapshot(_) => diagnostics.crossed_snapshots += 1,
                    _ => diagnostics.malformed_snapshots += 1,
                }
                tracing::warn!(
                    venue = %snapshot.venue,
                    instrument = %snapshot.instrument,
                    captured_at = %snapshot.captured_at,
                    error_type = e.error_type(),
                    error = %e,
                    "Excluding snapshot"
                );
            }
        }
    }

    books.sort_by_key(|b| b.captured_at());
    books
}

/// Tracks which stages ran before the deadline
struct StageGate {
    deadline: Option<Instant>,
    skipped: Vec<ReportStage>,
}

impl StageGate {
    fn new(deadline: Option<Instant>) -> Self {
        Self {
            deadline,
            skipped: Vec::new(),
        }
    }

    /// Once one stage is skipped every later stage is skipped too
    fn enter(&mut self, stage: ReportStage) -> bool {
        let expired = !self.skipped.is_empty()
            || self.deadline.is_some_and(|d| Instant::now() >= d);
        if expired {
            self.skipped.push(stage);
        }
        !expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::analytics::PatternKind;
    use crate::orderbook::book::tests::snapshot_at;
    use crate::orderbook::types::TakerSide;
    use crate::store::MemoryFactStore;
    use chrono::TimeZone;

    fn window() -> EvaluationWindow {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        EvaluationWindow::new(start, start + Duration::minutes(10)).unwrap()
    }

    fn context(store: MemoryFactStore) -> EvaluationContext {
        EvaluationContext::new(AnalyticsConfig::default(), Arc::new(store)).unwrap()
    }

    fn quoting_snapshots() -> Vec<OrderBookSnapshot> {
        (0..5)
            .map(|i| {
                snapshot_at(
                    i * 60,
                    &[("65000", "10"), ("64990", "2.5")],
                    &[("65010", "2.5"), ("65020", "1")],
                )
            })
            .collect()
    }

    #[test]
    fn test_empty_window_report() {
        let report = build_report(
            &AnalyticsConfig::default(),
            "binance_spot",
            "BTCUSDT",
            window(),
            &[],
            &[],
            None,
        );

        assert!(report.pattern_events.is_empty());
        assert!(report.trade_flow.is_empty());
        assert!(report.depth_metrics.is_empty());
        assert!(report.spread.is_none());
        assert_eq!(report.mm_probability_score, 0.0);
        assert_eq!(report.liquidity.score, 0.0);
        assert_eq!(report.diagnostics.excluded_records(), 0);
        assert!(!report.diagnostics.degraded);
        assert_eq!(report.diagnostics.insufficient_data.len(), 2);
    }

    #[test]
    fn test_crossed_and_malformed_snapshots_excluded() {
        let mut snapshots = quoting_snapshots();
        snapshots.push(snapshot_at(30, &[("65010", "1")], &[("65000", "1")]));
        snapshots.push(snapshot_at(90, &[("65000", "1")], &[]));
        snapshots.push(snapshot_at(150, &[("abc", "1")], &[("65010", "1")]));

        let report = build_report(
            &AnalyticsConfig::default(),
            "binance_spot",
            "BTCUSDT",
            window(),
            &snapshots,
            &[],
            None,
        );

        assert_eq!(report.diagnostics.snapshots_received, 8);
        assert_eq!(report.diagnostics.snapshots_used, 5);
        assert_eq!(report.diagnostics.crossed_snapshots, 2);
        assert_eq!(report.diagnostics.malformed_snapshots, 1);
        assert_eq!(report.diagnostics.excluded_records(), 3);
        assert_eq!(report.depth_metrics.len(), 5);
        assert!(report.depth_metrics[0].computed_at < report.depth_metrics[4].computed_at);
    }

    #[test]
    fn test_overflowing_snapshot_counted_as_malformed() {
        let mut snapshots = quoting_snapshots();
        snapshots.push(snapshot_at(
            30,
            &[
                ("64990", "50000000000000000000000000000"),
                ("64980", "50000000000000000000000000000"),
            ],
            &[("65010", "1")],
        ));

        let report = build_report(
            &AnalyticsConfig::default(),
            "binance_spot",
            "BTCUSDT",
            window(),
            &snapshots,
            &[],
            None,
        );

        assert_eq!(report.diagnostics.malformed_snapshots, 1);
        assert_eq!(report.diagnostics.snapshots_used, 5);
        assert_eq!(report.depth_metrics.len(), 5);
    }

    #[test]
    fn test_snapshots_outside_window_counted() {
        let mut snapshots = quoting_snapshots();
        snapshots.push(snapshot_at(-60, &[("64999", "1")], &[("65001", "1")]));
        snapshots.push(snapshot_at(3600, &[("64999", "1")], &[("65001", "1")]));
        snapshots.push(snapshot_at(120, &[("65010", "1")], &[("65000", "1")]));

        let report = build_report(
            &AnalyticsConfig::default(),
            "binance_spot",
            "BTCUSDT",
            window(),
            &snapshots,
            &[],
            None,
        );

        let d = &report.diagnostics;
        assert_eq!(d.snapshots_outside_window, 2);
        assert_eq!(d.snapshots_used, 5);
        assert_eq!(
            d.snapshots_received,
            d.snapshots_used + d.crossed_snapshots + d.malformed_snapshots + d.snapshots_outside_window
        );
    }

    #[test]
    fn test_patterns_and_scores_populated() {
        let report = build_report(
            &AnalyticsConfig::default(),
            "binance_spot",
            "BTCUSDT",
            window(),
            &quoting_snapshots(),
            &[],
            None,
        );

        // Four accepted pairs, every level priced on a multiple of 10
        assert_eq!(report.pattern_counts.round_number, 16);
        assert_eq!(report.pattern_counts.symmetric, 4);
        assert_eq!(report.pattern_counts.persistent_level, 4);
        assert_eq!(report.pattern_counts.wall, 0);
        assert!(report
            .pattern_events
            .iter()
            .any(|e| e.kind == PatternKind::PersistentLevel));
        assert_eq!(report.mm_probability_score, 50.0);
        assert_eq!(report.diagnostics.insufficient_data.len(), 1);
    }

    #[test]
    fn test_expired_deadline_skips_every_stage() {
        let report = build_report(
            &AnalyticsConfig::default(),
            "binance_spot",
            "BTCUSDT",
            window(),
            &quoting_snapshots(),
            &[],
            Some(Instant::now()),
        );

        assert!(report.diagnostics.degraded);
        assert_eq!(report.diagnostics.skipped_stages, ReportStage::ALL.to_vec());
        assert_eq!(report.diagnostics.snapshots_used, 5);
        assert!(report.depth_metrics.is_empty());
        assert_eq!(report.mm_probability_score, 0.0);
    }

    #[test]
    fn test_evaluate_reads_store() {
        let store = MemoryFactStore::new();
        for snapshot in quoting_snapshots() {
            store.insert_snapshot(snapshot);
        }
        store.insert_trades(vec![Trade {
            venue: "binance_spot".to_string(),
            instrument: "BTCUSDT".to_string(),
            trade_id: "42".to_string(),
            executed_at: window().end,
            price: "65005".to_string(),
            size: "0.5".to_string(),
            side: TakerSide::Sell,
        }]);

        let report = evaluate(&context(store), "binance_spot", "btcusdt", window()).unwrap();

        assert_eq!(report.instrument, "BTCUSDT");
        assert_eq!(report.diagnostics.snapshots_used, 5);
        assert_eq!(report.diagnostics.trades_used, 1);
        assert!(report.diagnostics.insufficient_data.is_empty());
    }

    #[test]
    fn test_validate_request_rejects_bad_input() {
        let ctx = context(MemoryFactStore::new());

        let err = evaluate(&ctx, "nyse", "BTCUSDT", window()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Input(_)));

        let err = evaluate(&ctx, "gate", "ETHUSDT", window()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Input(_)));

        let err = evaluate(&ctx, "gate", "BTC/USDT", window()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Input(_)));

        let err = evaluate(&ctx, "", "BTCUSDT", window()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Input(_)));

        let inverted = EvaluationWindow {
            start: window().end,
            end: window().start,
        };
        let err = evaluate(&ctx, "gate", "BTCUSDT", inverted).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_open_lists_accept_any_identifier() {
        let config = AnalyticsConfig {
            venues: Vec::new(),
            instruments: Vec::new(),
            ..Default::default()
        };
        let ctx = EvaluationContext::new(config, Arc::new(MemoryFactStore::new())).unwrap();

        let (venue, instrument) = ctx
            .validate_request("my-venue", "sol_usdt", &window())
            .unwrap();
        assert_eq!(venue, "my-venue");
        assert_eq!(instrument, "SOL_USDT");
    }
}
