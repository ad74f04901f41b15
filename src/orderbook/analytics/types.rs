//! Core data types for market-maker detection
//!
//! Pattern events, their evidence payloads and the liquidity score.

use crate::orderbook::types::{BookSide, EvaluationWindow};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Pattern Events
// ============================================================================

/// Kind of detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    RoundNumber,
    SymmetricPair,
    OrderWall,
    RapidDisappearance,
    PersistentLevel,
    PingPong,
    SizeCluster,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundNumber => "round_number",
            Self::SymmetricPair => "symmetric_pair",
            Self::OrderWall => "order_wall",
            Self::RapidDisappearance => "rapid_disappearance",
            Self::PersistentLevel => "persistent_level",
            Self::PingPong => "ping_pong",
            Self::SizeCluster => "size_cluster",
        }
    }
}

/// Evidence attached to a pattern event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternEvidence {
    /// Resting order priced on a multiple of 10 or 100
    RoundNumber {
        side: BookSide,
        #[schemars(with = "String")]
        price: Decimal,
        #[schemars(with = "String")]
        volume: Decimal,
        /// Largest round multiple the price is divisible by (10 or 100)
        multiple: u32,
    },

    /// Same quantized size quoted on both sides
    SymmetricPair {
        #[schemars(with = "String")]
        volume: Decimal,
        #[schemars(with = "String")]
        bid_price: Decimal,
        #[schemars(with = "String")]
        ask_price: Decimal,
        /// ask_price - bid_price
        #[schemars(with = "String")]
        spread: Decimal,
    },

    /// Level far larger than the near-book mean
    OrderWall {
        side: BookSide,
        #[schemars(with = "String")]
        price: Decimal,
        #[schemars(with = "String")]
        volume: Decimal,
        /// volume / mean top-level volume
        volume_ratio: f64,
    },

    /// Bid level pulled between consecutive snapshots
    RapidDisappearance {
        side: BookSide,
        #[schemars(with = "String")]
        price: Decimal,
        #[schemars(with = "String")]
        volume: Decimal,
        duration_seconds: f64,
    },

    /// Level quoted at an unchanged size across consecutive snapshots
    PersistentLevel {
        side: BookSide,
        #[schemars(with = "String")]
        price: Decimal,
        #[schemars(with = "String")]
        volume: Decimal,
        duration_seconds: f64,
        snapshot_count: usize,
    },

    /// Balanced buy/sell prints at near-identical prices
    PingPong {
        avg_buy_price: f64,
        avg_sell_price: f64,
        trade_count: usize,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    },

    /// Repeated identical trade size
    SizeCluster {
        #[schemars(with = "String")]
        size: Decimal,
        frequency: usize,
        /// Share of all trades in the window, in percent
        percentage: f64,
    },
}

impl PatternEvidence {
    pub fn kind(&self) -> PatternKind {
        match self {
            Self::RoundNumber { .. } => PatternKind::RoundNumber,
            Self::SymmetricPair { .. } => PatternKind::SymmetricPair,
            Self::OrderWall { .. } => PatternKind::OrderWall,
            Self::RapidDisappearance { .. } => PatternKind::RapidDisappearance,
            Self::PersistentLevel { .. } => PatternKind::PersistentLevel,
            Self::PingPong { .. } => PatternKind::PingPong,
            Self::SizeCluster { .. } => PatternKind::SizeCluster,
        }
    }
}

/// Single detected pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PatternEvent {
    pub kind: PatternKind,
    pub venue: String,
    pub instrument: String,
    /// Capture time of the snapshot (or latest trade) the pattern was seen in
    pub detected_at: DateTime<Utc>,
    pub evidence: PatternEvidence,
}

impl PatternEvent {
    pub fn new(
        venue: &str,
        instrument: &str,
        detected_at: DateTime<Utc>,
        evidence: PatternEvidence,
    ) -> Self {
        Self {
            kind: evidence.kind(),
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            detected_at,
            evidence,
        }
    }
}

/// Per-kind event counts feeding the MM probability score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PatternCounts {
    pub round_number: usize,
    pub symmetric: usize,
    pub wall: usize,
    pub rapid_change: usize,
    pub persistent_level: usize,
    pub ping_pong: usize,
    pub size_cluster: usize,
}

impl PatternCounts {
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a PatternEvent>,
    {
        let mut counts = Self::default();
        for event in events {
            match event.kind {
                PatternKind::RoundNumber => counts.round_number += 1,
                PatternKind::SymmetricPair => counts.symmetric += 1,
                PatternKind::OrderWall => counts.wall += 1,
                PatternKind::RapidDisappearance => counts.rapid_change += 1,
                PatternKind::PersistentLevel => counts.persistent_level += 1,
                PatternKind::PingPong => counts.ping_pong += 1,
                PatternKind::SizeCluster => counts.size_cluster += 1,
            }
        }
        counts
    }
}

// ============================================================================
// Liquidity Score
// ============================================================================

/// Mean depth of one band across the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BandMeanDepth {
    pub band_pct: f64,
    pub mean_bid_volume: f64,
    pub mean_ask_volume: f64,
}

/// Window-level liquidity profile with composite score
///
/// All statistics are 0 when the window holds no valid snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LiquidityScore {
    pub venue: String,
    pub instrument: String,
    pub window: EvaluationWindow,

    pub avg_spread_bps: f64,
    pub min_spread_bps: f64,
    pub max_spread_bps: f64,

    /// Population standard deviation of spread_bps
    pub spread_volatility: f64,

    /// Mean of (bid - ask) / (bid + ask) over the top levels
    #[schemars(range(min = -1.0, max = 1.0))]
    pub mean_imbalance: f64,
    pub imbalance_std: f64,
    /// Imbalance of the most recent snapshot
    #[schemars(range(min = -1.0, max = 1.0))]
    pub current_imbalance: f64,

    pub band_depths: Vec<BandMeanDepth>,

    /// Mean bid volume within 1% of mid
    pub depth_1pct: f64,

    /// Share of minute buckets holding a valid snapshot
    #[schemars(range(min = 0.0, max = 100.0))]
    pub presence_pct: f64,

    pub snapshot_count: usize,

    #[schemars(range(min = 0.0, max = 100.0))]
    pub score: f64,
}
