//! Binance HTTP Client
//!
//! REST client for the public market data endpoints of Binance spot and
//! USD-M perpetual futures. Both markets share one implementation; only the
//! base URL and path prefix differ.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::orderbook::types::{OrderBookSnapshot, Trade};
use crate::venue::binance::types::{OrderBook, RecentTrade, Ticker24hr};
use crate::venue::{Ticker, VenueAdapter};

const USER_AGENT: &str = concat!("mm-analytics/", env!("CARGO_PKG_VERSION"));

/// Retries on HTTP 429 before giving up
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Binance market an adapter talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceMarket {
    Spot,
    /// USD-M perpetual futures
    Perps,
}

impl BinanceMarket {
    pub fn venue_id(&self) -> &'static str {
        match self {
            BinanceMarket::Spot => "binance_spot",
            BinanceMarket::Perps => "binance_perps",
        }
    }

    pub fn from_venue_id(venue: &str) -> Option<Self> {
        match venue {
            "binance_spot" => Some(BinanceMarket::Spot),
            "binance_perps" => Some(BinanceMarket::Perps),
            _ => None,
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            BinanceMarket::Spot => "https://api.binance.com",
            BinanceMarket::Perps => "https://fapi.binance.com",
        }
    }

    fn path_prefix(&self) -> &'static str {
        match self {
            BinanceMarket::Spot => "/api/v3",
            BinanceMarket::Perps => "/fapi/v1",
        }
    }
}

/// Binance REST adapter
#[derive(Clone)]
pub struct BinanceAdapter {
    client: Client,
    market: BinanceMarket,
    base_url: String,
}

impl std::fmt::Debug for BinanceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceAdapter")
            .field("market", &self.market)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BinanceAdapter {
    /// Creates an adapter with the market's default base URL
    pub fn new(market: BinanceMarket, timeout: Duration) -> Result<Self> {
        Self::with_base_url(market, market.default_base_url(), timeout)
    }

    pub fn with_base_url(market: BinanceMarket, base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            market,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Full URL for an endpoint of this market
    fn endpoint(&self, name: &str, query: &str) -> String {
        format!(
            "{}{}/{}?{}",
            self.base_url,
            self.market.path_prefix(),
            name,
            query
        )
    }

    /// GET and decode JSON, backing off on HTTP 429
    ///
    /// Honors `Retry-After` when present, otherwise waits 1s, 2s, 4s.
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut retry_count = 0;

        loop {
            let resp = self
                .client
                .get(url)
                .send()
                .await
                .with_context(|| format!("Request to {} failed", url))?;
            let status = resp.status();

            if status.as_u16() == 429 {
                if retry_count >= MAX_RATE_LIMIT_RETRIES {
                    bail!(
                        "Rate limit exceeded after {} retries for {}",
                        MAX_RATE_LIMIT_RETRIES,
                        url
                    );
                }

                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or_else(|| 2_u64.pow(retry_count));

                tracing::warn!(
                    venue = self.market.venue_id(),
                    retry = retry_count + 1,
                    max_retries = MAX_RATE_LIMIT_RETRIES,
                    wait_secs = retry_after,
                    "Rate limit hit (429), backing off"
                );

                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                retry_count += 1;
                continue;
            }

            let resp = resp
                .error_for_status()
                .with_context(|| format!("Request to {} returned an error status", url))?;

            return resp
                .json::<T>()
                .await
                .with_context(|| format!("Failed to decode response from {}", url));
        }
    }
}

#[async_trait]
impl VenueAdapter for BinanceAdapter {
    fn venue(&self) -> &str {
        self.market.venue_id()
    }

    async fn fetch_ticker(&self, instrument: &str) -> Result<Ticker> {
        let url = self.endpoint("ticker/24hr", &format!("symbol={}", instrument));
        let ticker: Ticker24hr = self.get_json(&url).await?;
        ticker.into_ticker(self.venue())
    }

    async fn fetch_orderbook(&self, instrument: &str, depth: usize) -> Result<OrderBookSnapshot> {
        let url = self.endpoint(
            "depth",
            &format!("symbol={}&limit={}", instrument, depth_limit(depth)),
        );
        let book: OrderBook = self.get_json(&url).await?;
        let mut snapshot = book.into_snapshot(self.venue(), instrument, Utc::now())?;

        // The smallest accepted limit may still exceed what was asked for
        snapshot.bids.truncate(depth);
        snapshot.asks.truncate(depth);
        Ok(snapshot)
    }

    async fn fetch_trades(&self, instrument: &str, limit: usize) -> Result<Vec<Trade>> {
        let url = self.endpoint(
            "trades",
            &format!("symbol={}&limit={}", instrument, limit.clamp(1, 1000)),
        );
        let raw: Vec<RecentTrade> = self.get_json(&url).await?;
        raw.into_iter()
            .map(|t| t.into_trade(self.venue(), instrument))
            .collect()
    }
}

/// Smallest depth limit accepted by both markets that covers `depth` levels
fn depth_limit(depth: usize) -> usize {
    const ACCEPTED: [usize; 7] = [5, 10, 20, 50, 100, 500, 1000];
    ACCEPTED
        .iter()
        .copied()
        .find(|limit| *limit >= depth)
        .unwrap_or(1000)
}
