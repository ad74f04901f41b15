//! Depth aggregation within percentage bands of mid
//!
//! For a band of `pct` percent a bid contributes when
//! `price >= mid * (1 - pct/100)` and an ask when `price <= mid * (1 + pct/100)`.
//! Threshold arithmetic is done in exact decimals so that widening a band can
//! never lose a level.

use crate::error::{AnalyticsError, Result};
use crate::orderbook::book::{total_size, Book, PriceLevel};
use crate::orderbook::types::{BandDepth, DepthMetric, OrderBookSnapshot};
use rust_decimal::Decimal;
use std::str::FromStr;

/// Cumulative (bid, ask) volume inside one band
///
/// # Errors
///
/// Returns `Computation` if a band edge overflows a `Decimal`
pub fn band_volumes(book: &Book, band_pct: Decimal) -> Result<(Decimal, Decimal)> {
    let mid = book.mid_price();
    let fraction = band_pct / Decimal::ONE_HUNDRED;
    let edges = Decimal::ONE
        .checked_sub(fraction)
        .and_then(|f| mid.checked_mul(f))
        .zip(Decimal::ONE.checked_add(fraction).and_then(|f| mid.checked_mul(f)));
    let Some((bid_floor, ask_ceiling)) = edges else {
        return Err(AnalyticsError::Computation(format!(
            "{}% band around mid {} overflows",
            band_pct, mid
        )));
    };

    // Sides are sorted away from mid, so contributing levels form a prefix
    let bid_volume = within(book.bids(), |price| price >= bid_floor);
    let ask_volume = within(book.asks(), |price| price <= ask_ceiling);

    Ok((bid_volume, ask_volume))
}

/// Per-band depth for an ascending list of band percentages
///
/// # Errors
///
/// Returns `Computation` if a band percentage is not a finite number or a
/// band edge overflows
pub fn aggregate_depth(book: &Book, band_pcts: &[f64]) -> Result<Vec<BandDepth>> {
    band_pcts
        .iter()
        .map(|&band_pct| {
            let (bid_volume, ask_volume) = band_volumes(book, band_to_decimal(band_pct)?)?;
            Ok(BandDepth {
                band_pct,
                bid_volume,
                ask_volume,
            })
        })
        .collect()
}

pub fn depth_metric(book: &Book, band_pcts: &[f64]) -> Result<DepthMetric> {
    Ok(DepthMetric {
        venue: book.venue().to_string(),
        instrument: book.instrument().to_string(),
        computed_at: book.captured_at(),
        bands: aggregate_depth(book, band_pcts)?,
    })
}

/// Validate a raw snapshot and aggregate its depth
///
/// # Errors
///
/// `InvalidSnapshot` for crossed or one-sided books, `Computation` for
/// malformed levels
pub fn depth_for_snapshot(snapshot: &OrderBookSnapshot, band_pcts: &[f64]) -> Result<DepthMetric> {
    let book = Book::from_snapshot(snapshot)?;
    depth_metric(&book, band_pcts)
}

pub(crate) fn band_to_decimal(band_pct: f64) -> Result<Decimal> {
    if !band_pct.is_finite() {
        return Err(AnalyticsError::Computation(format!(
            "band percentage {} is not finite",
            band_pct
        )));
    }
    // Display gives the shortest round-trip form, so 0.1 stays 0.1
    Decimal::from_str(&band_pct.to_string())
        .map_err(|e| AnalyticsError::Computation(format!("band {}: {}", band_pct, e)))
}

fn within(levels: &[PriceLevel], contributes: impl Fn(Decimal) -> bool) -> Decimal {
    let end = levels
        .iter()
        .position(|l| !contributes(l.price))
        .unwrap_or(levels.len());
    total_size(&levels[..end])
}
