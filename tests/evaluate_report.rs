// Integration tests for single-window evaluation
//
// Exercise the public API end to end: raw snapshots and trades in, MMReport out.

use chrono::{DateTime, Duration, TimeZone, Utc};
use mm_analytics::config::AnalyticsConfig;
use mm_analytics::orderbook::analytics::patterns::{
    detect_order_walls, detect_round_numbers, detect_symmetric_orders,
};
use mm_analytics::orderbook::analytics::{PatternEvidence, PatternKind};
use mm_analytics::orderbook::depth::{aggregate_depth, depth_for_snapshot};
use mm_analytics::orderbook::spread::presence_pct;
use mm_analytics::orderbook::{Book, BookSide, EvaluationWindow, OrderBookSnapshot, TakerSide, Trade};
use mm_analytics::report::build_report;
use mm_analytics::{evaluate, AnalyticsError, EvaluationContext, MemoryFactStore};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
}

fn window() -> EvaluationWindow {
    EvaluationWindow::new(base_time(), base_time() + Duration::minutes(15)).unwrap()
}

fn snapshot(secs: i64, bids: &[(&str, &str)], asks: &[(&str, &str)]) -> OrderBookSnapshot {
    let side = |levels: &[(&str, &str)]| -> Vec<(String, String)> {
        levels
            .iter()
            .map(|(p, s)| (p.to_string(), s.to_string()))
            .collect()
    };
    OrderBookSnapshot::new(
        "gate",
        "BTCUSDT",
        base_time() + Duration::seconds(secs),
        side(bids),
        side(asks),
    )
}

fn trade(id: usize, secs: i64, price: &str, side: TakerSide) -> Trade {
    Trade {
        venue: "gate".to_string(),
        instrument: "BTCUSDT".to_string(),
        trade_id: id.to_string(),
        executed_at: base_time() + Duration::seconds(secs),
        price: price.to_string(),
        size: "0.01".to_string(),
        side,
    }
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

#[test]
fn test_full_book_depth_and_monotonic_bands() {
    let snap = snapshot(
        0,
        &[("64999.5", "1.25"), ("64900", "3"), ("64000", "0.5")],
        &[("65000.5", "0.75"), ("65300", "2"), ("66000", "4")],
    );

    let metric = depth_for_snapshot(&snap, &[0.1, 0.5, 1.0, 2.0, 4.0, 5.0, 8.0, 100.0]).unwrap();
    let full = metric.band(100.0).unwrap();
    assert_eq!(full.bid_volume, dec("4.75"));
    assert_eq!(full.ask_volume, dec("6.75"));

    for pair in metric.bands.windows(2) {
        assert!(pair[0].bid_volume <= pair[1].bid_volume);
        assert!(pair[0].ask_volume <= pair[1].ask_volume);
    }
}

#[test]
fn test_crossed_snapshot_rejected_and_never_counted() {
    let crossed = snapshot(60, &[("65010", "1")], &[("65000", "1")]);
    assert!(matches!(
        depth_for_snapshot(&crossed, &[1.0]),
        Err(AnalyticsError::InvalidSnapshot(_))
    ));

    let valid = snapshot(0, &[("64999", "1")], &[("65001", "1")]);
    let report = build_report(
        &AnalyticsConfig::default(),
        "gate",
        "BTCUSDT",
        window(),
        &[valid, crossed],
        &[],
        None,
    );

    assert_eq!(report.diagnostics.crossed_snapshots, 1);
    assert_eq!(report.liquidity.snapshot_count, 1);
    let spread = report.spread.unwrap();
    assert_eq!(spread.sample_count, 1);
    assert!(spread.min_bps >= 0.0);
}

#[test]
fn test_presence_bounds() {
    assert_eq!(presence_pct(std::iter::empty(), &window()), 0.0);

    // One snapshot per minute over 16 inclusive buckets, plus duplicates
    let times: Vec<DateTime<Utc>> = (0..=15)
        .flat_map(|m| {
            let t = base_time() + Duration::minutes(m);
            [t, t + Duration::seconds(30)]
        })
        .collect();
    assert_eq!(presence_pct(times, &window()), 100.0);
}

#[test]
fn test_round_number_level() {
    let book = Book::from_snapshot(&snapshot(
        0,
        &[("65000", "10"), ("64999.5", "1")],
        &[("65000.5", "1"), ("65001.5", "2")],
    ))
    .unwrap();

    let events = detect_round_numbers(&book, 20);
    assert_eq!(events.len(), 1);
    match &events[0].evidence {
        PatternEvidence::RoundNumber {
            side,
            price,
            volume,
            multiple,
        } => {
            assert_eq!(*side, BookSide::Bid);
            assert_eq!(*price, dec("65000"));
            assert_eq!(*volume, dec("10"));
            assert_eq!(*multiple, 100);
        }
        other => panic!("unexpected evidence {:?}", other),
    }
}

#[test]
fn test_symmetric_pair() {
    let book = Book::from_snapshot(&snapshot(
        0,
        &[("64995.5", "0.3"), ("64990", "2.5")],
        &[("65005.5", "0.7"), ("65010", "2.5")],
    ))
    .unwrap();

    let events = detect_symmetric_orders(&book, 20, 4);
    assert_eq!(events.len(), 1);
    match &events[0].evidence {
        PatternEvidence::SymmetricPair { volume, spread, .. } => {
            assert_eq!(*volume, dec("2.5"));
            assert_eq!(*spread, dec("20"));
        }
        other => panic!("unexpected evidence {:?}", other),
    }
}

#[test]
fn test_order_wall_ratio() {
    // Ten levels summing to 10, one of them 6
    let book = Book::from_snapshot(&snapshot(
        0,
        &[
            ("64999.5", "6"),
            ("64998.5", "0.5"),
            ("64997.5", "0.5"),
            ("64996.5", "0.5"),
            ("64995.5", "0.25"),
        ],
        &[
            ("65000.5", "0.5"),
            ("65001.5", "0.5"),
            ("65002.5", "0.5"),
            ("65003.5", "0.5"),
            ("65004.5", "0.25"),
        ],
    ))
    .unwrap();

    let events = detect_order_walls(&book, 20, 10, 5.0);
    assert_eq!(events.len(), 1);
    match &events[0].evidence {
        PatternEvidence::OrderWall { volume_ratio, .. } => {
            assert!((volume_ratio - 6.0).abs() < 1e-9)
        }
        other => panic!("unexpected evidence {:?}", other),
    }
}

#[test]
fn test_ping_pong_through_report() {
    let alternating = |sell_price: &'static str| -> Vec<Trade> {
        (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    trade(i, 600 + i as i64, "65000", TakerSide::Buy)
                } else {
                    trade(i, 600 + i as i64, sell_price, TakerSide::Sell)
                }
            })
            .collect()
    };

    let ping_pongs = |trades: &[Trade]| {
        build_report(
            &AnalyticsConfig::default(),
            "gate",
            "BTCUSDT",
            window(),
            &[],
            trades,
            None,
        )
        .trade_flow
        .iter()
        .filter(|e| e.kind == PatternKind::PingPong)
        .count()
    };

    assert_eq!(ping_pongs(&alternating("65010")[..]), 1);
    assert_eq!(ping_pongs(&alternating("66000")[..]), 0);
}

#[test]
fn test_empty_window_report() {
    let ctx = EvaluationContext::new(
        AnalyticsConfig::default(),
        Arc::new(MemoryFactStore::new()),
    )
    .unwrap();

    let report = evaluate(&ctx, "gate", "BTCUSDT", window()).unwrap();

    assert!(report.pattern_events.is_empty());
    assert!(report.trade_flow.is_empty());
    assert_eq!(report.mm_probability_score, 0.0);
    assert_eq!(report.liquidity.score, 0.0);
    assert_eq!(report.liquidity.presence_pct, 0.0);
    assert_eq!(report.diagnostics.excluded_records(), 0);
    assert!(!report.diagnostics.degraded);
}

#[test]
fn test_malformed_records_skipped() {
    let snapshots = vec![
        snapshot(0, &[("64999", "1")], &[("65001", "1")]),
        snapshot(60, &[("64999", "-1")], &[("65001", "1")]),
        snapshot(120, &[("64999", "1")], &[("65001", "1")]),
    ];
    let mut trades = vec![trade(1, 30, "65000", TakerSide::Buy)];
    trades.push(Trade {
        size: "lots".to_string(),
        ..trade(2, 40, "65000", TakerSide::Sell)
    });

    let report = build_report(
        &AnalyticsConfig::default(),
        "gate",
        "BTCUSDT",
        window(),
        &snapshots,
        &trades,
        None,
    );

    assert_eq!(report.diagnostics.malformed_snapshots, 1);
    assert_eq!(report.diagnostics.snapshots_used, 2);
    assert_eq!(report.diagnostics.malformed_trades, 1);
    assert_eq!(report.diagnostics.trades_used, 1);
    assert_eq!(report.diagnostics.excluded_records(), 2);
}

#[test]
fn test_equal_timestamps_skipped() {
    let snapshots = vec![
        snapshot(0, &[("64999", "1")], &[("65001", "1")]),
        snapshot(0, &[("64998", "1")], &[("65002", "1")]),
        snapshot(60, &[("64999", "1")], &[("65001", "1")]),
    ];

    let report = build_report(
        &AnalyticsConfig::default(),
        "gate",
        "BTCUSDT",
        window(),
        &snapshots,
        &[],
        None,
    );

    assert_eq!(report.diagnostics.skipped_snapshot_pairs, 1);
}

#[test]
fn test_unknown_venue_is_input_error() {
    let ctx = EvaluationContext::new(
        AnalyticsConfig::default(),
        Arc::new(MemoryFactStore::new()),
    )
    .unwrap();

    let err = evaluate(&ctx, "mtgox", "BTCUSDT", window()).unwrap_err();
    assert!(matches!(err, AnalyticsError::Input(_)));
    assert_eq!(err.error_type(), "input_error");
}

#[test]
fn test_depth_bands_from_config() {
    let book = Book::from_snapshot(&snapshot(0, &[("64999", "1")], &[("65001", "2")])).unwrap();
    let config = AnalyticsConfig::default();
    let bands = aggregate_depth(&book, &config.band_pcts).unwrap();

    assert_eq!(bands.len(), config.band_pcts.len());
    assert!(bands.iter().all(|b| b.bid_volume == dec("1") && b.ask_volume == dec("2")));
}
