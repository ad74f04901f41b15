//! Venue adapters
//!
//! Each venue the collector talks to implements [`VenueAdapter`]. The
//! analytics core never calls adapters; they only feed the fact store.

#[cfg(feature = "venue_adapters")]
pub mod binance;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AnalyticsConfig;
use crate::orderbook::types::{OrderBookSnapshot, Trade};
use crate::store::MemoryFactStore;

/// 24h market summary for one instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub venue: String,
    pub instrument: String,
    pub last_price: String,
    pub bid_price: Option<String>,
    pub ask_price: Option<String>,
    pub high_24h: String,
    pub low_24h: String,
    pub volume_24h: String,
    pub quote_volume_24h: String,
    pub price_change_pct: String,
    pub as_of: DateTime<Utc>,
}

/// Market data capabilities of one venue
#[async_trait]
pub trait VenueAdapter: Send + Sync {
    /// Venue id records are tagged with
    fn venue(&self) -> &str;

    async fn fetch_ticker(&self, instrument: &str) -> anyhow::Result<Ticker>;

    /// At most `depth` levels per side
    async fn fetch_orderbook(
        &self,
        instrument: &str,
        depth: usize,
    ) -> anyhow::Result<OrderBookSnapshot>;

    async fn fetch_trades(&self, instrument: &str, limit: usize) -> anyhow::Result<Vec<Trade>>;
}

/// Adapters selected by configuration
#[derive(Default, Clone)]
pub struct VenueRegistry {
    adapters: Vec<Arc<dyn VenueAdapter>>,
}

impl VenueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every configured venue that has one
    ///
    /// Venues without an adapter are skipped with a warning.
    pub fn from_config(config: &AnalyticsConfig) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        for venue in &config.venues {
            match build_adapter(venue, config)? {
                Some(adapter) => registry.register(adapter),
                None => tracing::warn!(venue = %venue, "No adapter available for venue, skipping"),
            }
        }

        tracing::info!(adapters = registry.len(), "Venue registry ready");
        Ok(registry)
    }

    /// Adds an adapter, replacing any previous one for the same venue
    pub fn register(&mut self, adapter: Arc<dyn VenueAdapter>) {
        self.adapters.retain(|a| a.venue() != adapter.venue());
        self.adapters.push(adapter);
    }

    pub fn get(&self, venue: &str) -> Option<Arc<dyn VenueAdapter>> {
        self.adapters.iter().find(|a| a.venue() == venue).cloned()
    }

    pub fn venues(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.venue()).collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(feature = "venue_adapters")]
fn build_adapter(
    venue: &str,
    config: &AnalyticsConfig,
) -> anyhow::Result<Option<Arc<dyn VenueAdapter>>> {
    use binance::{BinanceAdapter, BinanceMarket};

    let Some(market) = BinanceMarket::from_venue_id(venue) else {
        return Ok(None);
    };
    let adapter: Arc<dyn VenueAdapter> =
        Arc::new(BinanceAdapter::new(market, config.http_timeout())?);
    Ok(Some(adapter))
}

#[cfg(not(feature = "venue_adapters"))]
fn build_adapter(
    _venue: &str,
    _config: &AnalyticsConfig,
) -> anyhow::Result<Option<Arc<dyn VenueAdapter>>> {
    Ok(None)
}

/// Counts from one ingestion round
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    pub snapshots: usize,
    pub trades: usize,
    pub failures: usize,
}

/// Fetch one snapshot and the recent trades from every registered venue
///
/// A failing venue is logged and skipped; the others still ingest.
pub async fn collect_once(
    registry: &VenueRegistry,
    store: &MemoryFactStore,
    instrument: &str,
    depth: usize,
    trade_limit: usize,
) -> CollectionSummary {
    let mut summary = CollectionSummary::default();

    for adapter in &registry.adapters {
        let venue = adapter.venue();
        let (book, trades) = tokio::join!(
            adapter.fetch_orderbook(instrument, depth),
            adapter.fetch_trades(instrument, trade_limit)
        );

        match book {
            Ok(snapshot) => {
                if store.insert_snapshot(snapshot) {
                    summary.snapshots += 1;
                }
            }
            Err(e) => {
                tracing::error!(venue = %venue, instrument = %instrument, error = %e, "Order book fetch failed");
                summary.failures += 1;
            }
        }

        match trades {
            Ok(trades) => summary.trades += store.insert_trades(trades),
            Err(e) => {
                tracing::error!(venue = %venue, instrument = %instrument, error = %e, "Trades fetch failed");
                summary.failures += 1;
            }
        }
    }

    tracing::debug!(
        instrument = %instrument,
        snapshots = summary.snapshots,
        trades = summary.trades,
        failures = summary.failures,
        "Collection round complete"
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::types::{EvaluationWindow, TakerSide};
    use crate::store::FactStore;
    use anyhow::bail;
    use chrono::{Duration, TimeZone};

    struct MockVenue {
        name: &'static str,
        fail_book: bool,
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap()
    }

    #[async_trait]
    impl VenueAdapter for MockVenue {
        fn venue(&self) -> &str {
            self.name
        }

        async fn fetch_ticker(&self, instrument: &str) -> anyhow::Result<Ticker> {
            Ok(Ticker {
                venue: self.name.to_string(),
                instrument: instrument.to_string(),
                last_price: "65000".to_string(),
                bid_price: None,
                ask_price: None,
                high_24h: "66000".to_string(),
                low_24h: "64000".to_string(),
                volume_24h: "100".to_string(),
                quote_volume_24h: "6500000".to_string(),
                price_change_pct: "0.5".to_string(),
                as_of: at(),
            })
        }

        async fn fetch_orderbook(
            &self,
            instrument: &str,
            _depth: usize,
        ) -> anyhow::Result<OrderBookSnapshot> {
            if self.fail_book {
                bail!("connection reset");
            }
            Ok(OrderBookSnapshot::new(
                self.name,
                instrument,
                at(),
                vec![("64999".to_string(), "1".to_string())],
                vec![("65001".to_string(), "1".to_string())],
            ))
        }

        async fn fetch_trades(&self, instrument: &str, limit: usize) -> anyhow::Result<Vec<Trade>> {
            Ok((0..limit)
                .map(|i| Trade {
                    venue: self.name.to_string(),
                    instrument: instrument.to_string(),
                    trade_id: i.to_string(),
                    executed_at: at() - Duration::seconds(i as i64),
                    price: "65000".to_string(),
                    size: "0.1".to_string(),
                    side: TakerSide::Buy,
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_collect_once_skips_failing_venue() {
        let mut registry = VenueRegistry::new();
        registry.register(Arc::new(MockVenue {
            name: "gate",
            fail_book: false,
        }));
        registry.register(Arc::new(MockVenue {
            name: "kucoin",
            fail_book: true,
        }));
        let store = MemoryFactStore::new();

        let summary = collect_once(&registry, &store, "BTCUSDT", 20, 3).await;

        assert_eq!(
            summary,
            CollectionSummary {
                snapshots: 1,
                trades: 6,
                failures: 1
            }
        );

        let window = EvaluationWindow::trailing(Duration::minutes(1), at());
        assert_eq!(store.snapshots("gate", "BTCUSDT", &window).len(), 1);
        assert!(store.snapshots("kucoin", "BTCUSDT", &window).is_empty());
        assert_eq!(store.trades("kucoin", "BTCUSDT", &window).len(), 3);

        // Same facts again are deduplicated
        let again = collect_once(&registry, &store, "BTCUSDT", 20, 3).await;
        assert_eq!(again.snapshots, 0);
        assert_eq!(again.trades, 0);
    }

    #[tokio::test]
    async fn test_registry_replaces_same_venue() {
        let mut registry = VenueRegistry::new();
        registry.register(Arc::new(MockVenue {
            name: "gate",
            fail_book: true,
        }));
        registry.register(Arc::new(MockVenue {
            name: "gate",
            fail_book: false,
        }));

        assert_eq!(registry.len(), 1);
        let adapter = registry.get("gate").unwrap();
        assert!(adapter.fetch_orderbook("BTCUSDT", 5).await.is_ok());
        let ticker = adapter.fetch_ticker("BTCUSDT").await.unwrap();
        assert_eq!(ticker.venue, "gate");
    }

    #[test]
    fn test_registry_from_config_skips_unknown_venues() {
        let config = AnalyticsConfig {
            venues: vec!["binance_spot".to_string(), "bitget".to_string()],
            ..Default::default()
        };
        let registry = VenueRegistry::from_config(&config).unwrap();

        #[cfg(feature = "venue_adapters")]
        assert_eq!(registry.venues(), vec!["binance_spot"]);
        #[cfg(not(feature = "venue_adapters"))]
        assert!(registry.is_empty());
    }
}
