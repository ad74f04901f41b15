//! Validated order book
//!
//! A [`Book`] can only be built from a snapshot that parses cleanly, keeps
//! strict price ordering on both sides and is not crossed. Side totals, mid
//! and spread are also checked to fit a `Decimal`, so depth, imbalance and
//! spread arithmetic on a `Book` cannot overflow. Everything downstream relies
//! on those guarantees instead of re-checking them.

use crate::error::{AnalyticsError, Result};
use crate::orderbook::types::{BookSide, OrderBookSnapshot, Trade, TakerSide};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Single parsed price level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Parsed, non-crossed order book
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    venue: String,
    instrument: String,
    captured_at: DateTime<Utc>,
    /// Highest price first
    bids: Vec<PriceLevel>,
    /// Lowest price first
    asks: Vec<PriceLevel>,
    spread_bps: f64,
}

impl Book {
    /// Parse and validate a snapshot
    ///
    /// # Errors
    /// - `Computation` if a level does not parse, has a non-positive price or
    ///   negative size, or breaks the strict ordering of its side
    /// - `Computation` if side volumes, mid or spread overflow a `Decimal`
    /// - `InvalidSnapshot` if a side is empty or the book is crossed
    pub fn from_snapshot(snapshot: &OrderBookSnapshot) -> Result<Self> {
        let bids = parse_side(&snapshot.bids, BookSide::Bid)?;
        let asks = parse_side(&snapshot.asks, BookSide::Ask)?;

        let (best_bid, best_ask) = match (bids.first(), asks.first()) {
            (Some(bid), Some(ask)) => (bid.price, ask.price),
            _ => {
                return Err(AnalyticsError::InvalidSnapshot(format!(
                    "one-sided book at {} ({} bids, {} asks)",
                    snapshot.captured_at,
                    bids.len(),
                    asks.len()
                )))
            }
        };

        if best_bid >= best_ask {
            return Err(AnalyticsError::InvalidSnapshot(format!(
                "crossed book at {}: best bid {} >= best ask {}",
                snapshot.captured_at, best_bid, best_ask
            )));
        }

        let bid_total = checked_total(&bids, BookSide::Bid)?;
        let ask_total = checked_total(&asks, BookSide::Ask)?;
        if bid_total.checked_add(ask_total).is_none() {
            return Err(AnalyticsError::Computation(format!(
                "combined book volume overflows at {}",
                snapshot.captured_at
            )));
        }
        if best_bid.checked_add(best_ask).is_none() {
            return Err(AnalyticsError::Computation(format!(
                "mid price overflows at {}: best bid {}, best ask {}",
                snapshot.captured_at, best_bid, best_ask
            )));
        }
        let spread_bps = checked_spread_bps(best_bid, best_ask).ok_or_else(|| {
            AnalyticsError::Computation(format!(
                "spread of {} over {} is not representable in bps at {}",
                best_ask, best_bid, snapshot.captured_at
            ))
        })?;

        Ok(Self {
            venue: snapshot.venue.clone(),
            instrument: snapshot.instrument.clone(),
            captured_at: snapshot.captured_at,
            bids,
            asks,
            spread_bps,
        })
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn levels(&self, side: BookSide) -> &[PriceLevel] {
        match side {
            BookSide::Bid => &self.bids,
            BookSide::Ask => &self.asks,
        }
    }

    /// Best `k` levels of one side
    pub fn top(&self, side: BookSide, k: usize) -> &[PriceLevel] {
        let levels = self.levels(side);
        &levels[..k.min(levels.len())]
    }

    pub fn best_bid(&self) -> Decimal {
        self.bids[0].price
    }

    pub fn best_ask(&self) -> Decimal {
        self.asks[0].price
    }

    pub fn mid_price(&self) -> Decimal {
        (self.best_bid() + self.best_ask()) / Decimal::TWO
    }

    /// Spread in basis points: ((best_ask - best_bid) / best_bid) * 10000
    ///
    /// Never negative for a validated book.
    pub fn spread_bps(&self) -> f64 {
        self.spread_bps
    }

    /// (bid_volume - ask_volume) / (bid_volume + ask_volume) over the top `k` levels
    ///
    /// Returns None when both sides carry zero volume.
    pub fn imbalance(&self, k: usize) -> Option<f64> {
        let bid_volume = total_size(self.top(BookSide::Bid, k));
        let ask_volume = total_size(self.top(BookSide::Ask, k));
        let total = bid_volume + ask_volume;
        if total.is_zero() {
            return None;
        }
        ((bid_volume - ask_volume) / total).to_f64()
    }
}

/// Trade with parsed price and size
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrade {
    pub trade_id: String,
    pub executed_at: DateTime<Utc>,
    pub price: Decimal,
    pub size: Decimal,
    pub side: TakerSide,
}

impl ParsedTrade {
    /// # Errors
    ///
    /// Returns `Computation` if price or size do not parse or are not positive
    pub fn from_trade(trade: &Trade) -> Result<Self> {
        let price = parse_decimal("price", &trade.price)?;
        let size = parse_decimal("size", &trade.size)?;
        if price <= Decimal::ZERO || size <= Decimal::ZERO {
            return Err(AnalyticsError::Computation(format!(
                "trade {} has non-positive price {} or size {}",
                trade.trade_id, price, size
            )));
        }

        Ok(Self {
            trade_id: trade.trade_id.clone(),
            executed_at: trade.executed_at,
            price,
            size,
            side: trade.side,
        })
    }
}

/// Sum of level sizes
///
/// Only call on levels of a [`Book`], whose side totals are known to fit.
pub fn total_size(levels: &[PriceLevel]) -> Decimal {
    levels.iter().map(|l| l.size).sum()
}

fn checked_total(levels: &[PriceLevel], side: BookSide) -> Result<Decimal> {
    levels
        .iter()
        .try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.size))
        .ok_or_else(|| AnalyticsError::Computation(format!("{:?} volume overflows", side)))
}

fn checked_spread_bps(best_bid: Decimal, best_ask: Decimal) -> Option<f64> {
    best_ask
        .checked_sub(best_bid)?
        .checked_div(best_bid)?
        .checked_mul(Decimal::from(10_000))?
        .to_f64()
}

/// Parse a venue decimal string, accepting scientific notation
pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    let raw = raw.trim();
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .map_err(|e| AnalyticsError::Computation(format!("invalid {} '{}': {}", field, raw, e)))
}

fn parse_side(levels: &[(String, String)], side: BookSide) -> Result<Vec<PriceLevel>> {
    let mut parsed: Vec<PriceLevel> = Vec::with_capacity(levels.len());

    for (raw_price, raw_size) in levels {
        let price = parse_decimal("price", raw_price)?;
        let size = parse_decimal("size", raw_size)?;

        if price <= Decimal::ZERO {
            return Err(AnalyticsError::Computation(format!(
                "non-positive {:?} price {}",
                side, price
            )));
        }
        if size < Decimal::ZERO {
            return Err(AnalyticsError::Computation(format!(
                "negative {:?} size {} at {}",
                side, size, price
            )));
        }

        if let Some(prev) = parsed.last() {
            let ordered = match side {
                BookSide::Bid => price < prev.price,
                BookSide::Ask => price > prev.price,
            };
            if !ordered {
                return Err(AnalyticsError::Computation(format!(
                    "{:?} levels out of order: {} after {}",
                    side, price, prev.price
                )));
            }
        }

        parsed.push(PriceLevel { price, size });
    }

    Ok(parsed)
}
