// Integration tests for batch evaluation over a loaded fact bundle

use chrono::{Duration, TimeZone, Utc};
use mm_analytics::config::AnalyticsConfig;
use mm_analytics::orderbook::{OrderBookSnapshot, TakerSide, Trade};
use mm_analytics::report::{evaluate_batch, EvaluationRequest};
use mm_analytics::store::FactBundle;
use mm_analytics::{AnalyticsError, EvaluationContext, MemoryFactStore};
use std::io::Write;
use std::sync::Arc;

fn bundle() -> FactBundle {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
    let mut bundle = FactBundle::default();

    for venue in ["gate", "kucoin", "bitget"] {
        for minute in 0..10 {
            bundle.snapshots.push(OrderBookSnapshot::new(
                venue,
                "BTCUSDT",
                start + Duration::minutes(minute),
                vec![
                    ("64999.5".to_string(), "1.5".to_string()),
                    ("64990".to_string(), "2".to_string()),
                ],
                vec![
                    ("65000.5".to_string(), "1.5".to_string()),
                    ("65010".to_string(), "2".to_string()),
                ],
            ));
        }
        for i in 0..20 {
            bundle.trades.push(Trade {
                venue: venue.to_string(),
                instrument: "BTCUSDT".to_string(),
                trade_id: format!("{}-{}", venue, i),
                executed_at: start + Duration::seconds(20 * i),
                price: "65000".to_string(),
                size: "0.05".to_string(),
                side: if i % 2 == 0 { TakerSide::Buy } else { TakerSide::Sell },
            });
        }
    }

    bundle
}

fn write_bundle(bundle: &FactBundle) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(serde_json::to_string(bundle).unwrap().as_bytes())
        .unwrap();
    file
}

#[tokio::test]
async fn test_batch_over_bundle() {
    let file = write_bundle(&bundle());
    let loaded = FactBundle::from_path(file.path()).unwrap();
    let window = loaded.span().unwrap();
    let store = MemoryFactStore::from_bundle(loaded);

    let mut requests: Vec<EvaluationRequest> = store
        .pairs()
        .into_iter()
        .map(|(venue, instrument)| EvaluationRequest::new(&venue, &instrument, window))
        .collect();
    requests.push(EvaluationRequest::new("gate", "DOGE/USDT", window));

    let ctx = Arc::new(EvaluationContext::new(AnalyticsConfig::default(), Arc::new(store)).unwrap());
    let outcomes = evaluate_batch(ctx, requests).await;

    assert_eq!(outcomes.len(), 4);
    let venues: Vec<&str> = outcomes.iter().map(|o| o.request.venue.as_str()).collect();
    assert_eq!(venues, vec!["bitget", "gate", "kucoin", "gate"]);

    for outcome in &outcomes[..3] {
        let report = outcome.result.as_ref().unwrap();
        assert_eq!(report.diagnostics.snapshots_used, 10);
        assert_eq!(report.diagnostics.trades_used, 20);
        assert_eq!(report.liquidity.presence_pct, 100.0);
        assert!((0.0..=100.0).contains(&report.mm_probability_score));
        assert!((0.0..=100.0).contains(&report.liquidity.score));
        assert!(!report.diagnostics.degraded);
    }

    assert!(matches!(
        outcomes[3].result,
        Err(AnalyticsError::Input(_))
    ));
}

#[tokio::test]
async fn test_reports_serialize_to_json() {
    let store = MemoryFactStore::from_bundle(bundle());
    let window = bundle().span().unwrap();
    let ctx = Arc::new(EvaluationContext::new(AnalyticsConfig::default(), Arc::new(store)).unwrap());

    let outcomes = evaluate_batch(ctx, vec![EvaluationRequest::new("gate", "BTCUSDT", window)]).await;
    let report = outcomes[0].result.as_ref().unwrap();

    let json = serde_json::to_value(report).unwrap();
    assert_eq!(json["venue"], "gate");
    assert!(json["pattern_counts"]["round_number"].as_u64().unwrap() > 0);
    assert_eq!(json["diagnostics"]["degraded"], false);

    let markdown = report.to_markdown();
    assert!(markdown.contains("## Order Book Patterns"));
    assert!(markdown.contains("## Trade Flow"));
}
