//! Fact records and per-snapshot derived records
//!
//! Snapshots and trades carry prices and sizes as decimal strings exactly as
//! venues publish them; they are parsed once, at validation.

use crate::error::{AnalyticsError, Result};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Supporting Enums
// ============================================================================

/// Order book side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bid,
    Ask,
}

/// Aggressor side of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TakerSide {
    Buy,
    Sell,
}

impl TakerSide {
    /// Venues that report `is_buyer_maker` describe a sell-side taker when it is true
    pub fn from_buyer_maker(is_buyer_maker: bool) -> Self {
        if is_buyer_maker {
            Self::Sell
        } else {
            Self::Buy
        }
    }
}

// ============================================================================
// Evaluation Window
// ============================================================================

/// Inclusive `[start, end]` time range an evaluation covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EvaluationWindow {
    /// # Errors
    ///
    /// Returns `AnalyticsError::Input` if `start` is after `end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(AnalyticsError::Input(format!(
                "window start {} is after window end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Window of the given length ending at `end`
    pub fn trailing(length: Duration, end: DateTime<Utc>) -> Self {
        Self {
            start: end - length,
            end,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }
}

// ============================================================================
// Fact Records
// ============================================================================

/// Point-in-time order book captured from one venue
///
/// Bids are expected strictly descending and asks strictly ascending by
/// price. The record is only usable when both sides are present and
/// `best_bid < best_ask`; see [`crate::orderbook::book::Book::from_snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrderBookSnapshot {
    pub venue: String,
    pub instrument: String,
    pub captured_at: DateTime<Utc>,
    /// Bid levels (price, size)
    pub bids: Vec<(String, String)>,
    /// Ask levels (price, size)
    pub asks: Vec<(String, String)>,
}

impl OrderBookSnapshot {
    pub fn new(
        venue: impl Into<String>,
        instrument: impl Into<String>,
        captured_at: DateTime<Utc>,
        bids: Vec<(String, String)>,
        asks: Vec<(String, String)>,
    ) -> Self {
        Self {
            venue: venue.into(),
            instrument: instrument.into(),
            captured_at,
            bids,
            asks,
        }
    }
}

/// Executed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Trade {
    pub venue: String,
    pub instrument: String,
    /// Unique per venue
    pub trade_id: String,
    pub executed_at: DateTime<Utc>,
    pub price: String,
    pub size: String,
    pub side: TakerSide,
}

// ============================================================================
// Derived Records
// ============================================================================

/// Cumulative volume within one band around mid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BandDepth {
    /// Distance from mid in percent
    pub band_pct: f64,
    #[schemars(with = "String")]
    pub bid_volume: Decimal,
    #[schemars(with = "String")]
    pub ask_volume: Decimal,
}

/// Depth bands computed from one valid snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DepthMetric {
    pub venue: String,
    pub instrument: String,
    /// Capture time of the source snapshot
    pub computed_at: DateTime<Utc>,
    /// Bands in ascending order
    pub bands: Vec<BandDepth>,
}

impl DepthMetric {
    pub fn band(&self, band_pct: f64) -> Option<&BandDepth> {
        self.bands.iter().find(|b| b.band_pct == band_pct)
    }

    /// Serialize to MessagePack bytes
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        rmp_serde::to_vec(self).context("Failed to serialize depth metric to MessagePack")
    }

    /// Deserialize from MessagePack bytes
    pub fn from_bytes(data: &[u8]) -> anyhow::Result<Self> {
        rmp_serde::from_slice(data).context("Failed to deserialize depth metric from MessagePack")
    }
}

/// Spread of one valid snapshot in basis points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SpreadSample {
    pub venue: String,
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub spread_bps: f64,
}
