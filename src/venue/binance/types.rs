//! Binance REST wire types
//!
//! Spot (`/api/v3`) and USD-M futures (`/fapi/v1`) return the same shapes for
//! the endpoints used here, apart from a few fields only one of them sends.
//! Those are optional; unknown fields are ignored.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::orderbook::types::{OrderBookSnapshot, TakerSide, Trade};
use crate::venue::Ticker;

/// Response from the 24hr ticker endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticker24hr {
    pub symbol: String,
    pub price_change_percent: String,
    pub last_price: String,
    /// Spot only
    #[serde(default)]
    pub bid_price: Option<String>,
    /// Spot only
    #[serde(default)]
    pub ask_price: Option<String>,
    pub high_price: String,
    pub low_price: String,
    /// Total traded base asset volume
    pub volume: String,
    /// Total traded quote asset volume
    pub quote_volume: String,
    pub close_time: i64,
}

impl Ticker24hr {
    pub fn into_ticker(self, venue: &str) -> Result<Ticker> {
        Ok(Ticker {
            venue: venue.to_string(),
            instrument: self.symbol,
            last_price: self.last_price,
            bid_price: self.bid_price,
            ask_price: self.ask_price,
            high_24h: self.high_price,
            low_24h: self.low_price,
            volume_24h: self.volume,
            quote_volume_24h: self.quote_volume,
            price_change_pct: self.price_change_percent,
            as_of: millis_to_utc(self.close_time)?,
        })
    }
}

/// Response from the depth endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBook {
    pub last_update_id: i64,
    /// Transaction time, futures only
    #[serde(rename = "T", default)]
    pub transaction_time: Option<i64>,
    /// Bid levels [price, quantity]
    pub bids: Vec<(String, String)>,
    /// Ask levels [price, quantity]
    pub asks: Vec<(String, String)>,
}

impl OrderBook {
    /// Spot depth carries no timestamp, so `fetched_at` stands in for it
    pub fn into_snapshot(
        self,
        venue: &str,
        instrument: &str,
        fetched_at: DateTime<Utc>,
    ) -> Result<OrderBookSnapshot> {
        let captured_at = match self.transaction_time {
            Some(ms) => millis_to_utc(ms)?,
            None => fetched_at,
        };
        Ok(OrderBookSnapshot::new(
            venue,
            instrument,
            captured_at,
            self.bids,
            self.asks,
        ))
    }
}

/// Response item from the recent trades endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentTrade {
    pub id: i64,
    pub price: String,
    pub qty: String,
    /// Trade time in milliseconds
    pub time: i64,
    pub is_buyer_maker: bool,
}

impl RecentTrade {
    pub fn into_trade(self, venue: &str, instrument: &str) -> Result<Trade> {
        Ok(Trade {
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            trade_id: self.id.to_string(),
            executed_at: millis_to_utc(self.time)?,
            price: self.price,
            size: self.qty,
            side: TakerSide::from_buyer_maker(self.is_buyer_maker),
        })
    }
}

fn millis_to_utc(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("Invalid timestamp {} ms", ms))
}
