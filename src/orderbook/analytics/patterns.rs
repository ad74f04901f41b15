//! Market-maker pattern detection over consecutive snapshots
//!
//! Detects order book signatures typical of automated quoting:
//! - Round-number orders: top-K levels priced on a multiple of 10 or 100
//! - Symmetric orders: identical quantized size quoted on both sides
//! - Order walls: levels above 5x the mean near-book volume
//! - Rapid disappearance: sizeable bids pulled between snapshots
//! - Persistent levels: levels held at an unchanged size for a minimum lifetime
//!
//! Event counts fold into an additive, clamped MM probability score.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::config::AnalyticsConfig;
use crate::error::{AnalyticsError, Result};
use crate::orderbook::analytics::types::{PatternCounts, PatternEvent, PatternEvidence};
use crate::orderbook::book::{Book, PriceLevel};
use crate::orderbook::types::BookSide;

// Score contract: (count threshold, weight). A term contributes its weight
// when the count strictly exceeds the threshold.
pub const ROUND_NUMBER_TERM: (usize, f64) = (5, 20.0);
pub const SYMMETRIC_TERM: (usize, f64) = (3, 30.0);
pub const WALL_TERM: (usize, f64) = (0, 15.0);
pub const RAPID_CHANGE_TERM: (usize, f64) = (10, 20.0);
pub const PERSISTENT_LEVEL_TERM: (usize, f64) = (5, 15.0);

const SIDES: [BookSide; 2] = [BookSide::Bid, BookSide::Ask];

/// Result of scanning a snapshot sequence
#[derive(Debug, Clone, Default)]
pub struct PatternScan {
    pub events: Vec<PatternEvent>,
    /// Pairs dropped for non-positive elapsed time
    pub skipped_pairs: usize,
}

/// Run every detector over a snapshot sequence ordered by capture time
///
/// Single-snapshot detectors run on the newer snapshot of each accepted pair,
/// so the oldest snapshot only serves as the baseline for disappearance.
///
/// # Errors
///
/// Returns `InsufficientData` when fewer than two snapshots are supplied
pub fn scan_snapshots(books: &[Book], config: &AnalyticsConfig) -> Result<PatternScan> {
    if books.len() < 2 {
        return Err(AnalyticsError::InsufficientData(format!(
            "pattern detection needs at least 2 valid snapshots, got {}",
            books.len()
        )));
    }

    let mut scan = PatternScan::default();

    for pair in books.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        let elapsed = curr.captured_at() - prev.captured_at();
        if elapsed <= Duration::zero() {
            tracing::debug!(
                venue = %curr.venue(),
                instrument = %curr.instrument(),
                captured_at = %curr.captured_at(),
                "Skipping snapshot pair with non-positive elapsed time"
            );
            scan.skipped_pairs += 1;
            continue;
        }

        scan.events.extend(detect_round_numbers(curr, config.top_k));
        scan.events.extend(detect_symmetric_orders(
            curr,
            config.top_k,
            config.size_quantization_dp,
        ));
        scan.events.extend(detect_order_walls(
            curr,
            config.top_k,
            config.wall_mean_levels,
            config.wall_multiplier,
        ));
        scan.events.extend(detect_rapid_disappearance(
            prev,
            curr,
            config.top_k,
            config.disappearance_min_volume,
        ));
    }

    scan.events.extend(detect_persistent_levels(
        books,
        config.top_k,
        config.size_quantization_dp,
        Duration::seconds(config.persistence_min_secs),
    ));

    Ok(scan)
}

/// Top-K levels priced on an exact multiple of 10 or 100
pub fn detect_round_numbers(book: &Book, top_k: usize) -> Vec<PatternEvent> {
    let mut events = Vec::new();

    for side in SIDES {
        for level in book.top(side, top_k) {
            let multiple = if (level.price % Decimal::ONE_HUNDRED).is_zero() {
                100
            } else if (level.price % Decimal::TEN).is_zero() {
                10
            } else {
                continue;
            };

            events.push(PatternEvent::new(
                book.venue(),
                book.instrument(),
                book.captured_at(),
                PatternEvidence::RoundNumber {
                    side,
                    price: level.price,
                    volume: level.size,
                    multiple,
                },
            ));
        }
    }

    events
}

/// Sizes quoted identically on both sides after quantization to `size_dp` places
///
/// When several levels on one side round to the same size the deepest one is
/// kept. Events are ordered by volume.
pub fn detect_symmetric_orders(book: &Book, top_k: usize, size_dp: u32) -> Vec<PatternEvent> {
    let bid_prices = volume_price_map(book.top(BookSide::Bid, top_k), size_dp);
    let ask_prices = volume_price_map(book.top(BookSide::Ask, top_k), size_dp);

    bid_prices
        .iter()
        .filter_map(|(volume, bid_price)| {
            let ask_price = ask_prices.get(volume)?;
            Some(PatternEvent::new(
                book.venue(),
                book.instrument(),
                book.captured_at(),
                PatternEvidence::SymmetricPair {
                    volume: *volume,
                    bid_price: *bid_price,
                    ask_price: *ask_price,
                    spread: *ask_price - *bid_price,
                },
            ))
        })
        .collect()
}

fn volume_price_map(levels: &[PriceLevel], size_dp: u32) -> BTreeMap<Decimal, Decimal> {
    let mut map = BTreeMap::new();
    for level in levels {
        let volume = quantize(level.size, size_dp);
        if volume.is_zero() {
            continue;
        }
        map.insert(volume, level.price);
    }
    map
}

/// Round half-even to a fixed number of decimal places
pub(crate) fn quantize(size: Decimal, dp: u32) -> Decimal {
    size.round_dp(dp).normalize()
}

/// Top-K levels whose volume exceeds `multiplier` times the mean volume of
/// the first `mean_levels` bids and asks combined
pub fn detect_order_walls(
    book: &Book,
    top_k: usize,
    mean_levels: usize,
    multiplier: f64,
) -> Vec<PatternEvent> {
    let baseline: Vec<f64> = book
        .top(BookSide::Bid, mean_levels)
        .iter()
        .chain(book.top(BookSide::Ask, mean_levels))
        .filter_map(|l| l.size.to_f64())
        .collect();

    if baseline.is_empty() {
        return Vec::new();
    }

    let mean_volume = baseline.iter().mean();
    if mean_volume <= 0.0 {
        return Vec::new();
    }

    let mut events = Vec::new();
    for side in SIDES {
        for level in book.top(side, top_k) {
            let volume = level.size.to_f64().unwrap_or(0.0);
            if volume > multiplier * mean_volume {
                events.push(PatternEvent::new(
                    book.venue(),
                    book.instrument(),
                    book.captured_at(),
                    PatternEvidence::OrderWall {
                        side,
                        price: level.price,
                        volume: level.size,
                        volume_ratio: volume / mean_volume,
                    },
                ));
            }
        }
    }

    events
}

/// Bids above `min_volume` in the previous snapshot's top-K that are gone
/// from the current snapshot's top-K
pub fn detect_rapid_disappearance(
    prev: &Book,
    curr: &Book,
    top_k: usize,
    min_volume: Decimal,
) -> Vec<PatternEvent> {
    let elapsed = curr.captured_at() - prev.captured_at();
    if elapsed <= Duration::zero() {
        return Vec::new();
    }
    let duration_seconds = elapsed.num_milliseconds() as f64 / 1000.0;

    let current_prices: HashSet<Decimal> = curr
        .top(BookSide::Bid, top_k)
        .iter()
        .map(|l| l.price)
        .collect();

    prev.top(BookSide::Bid, top_k)
        .iter()
        .filter(|l| l.size > min_volume && !current_prices.contains(&l.price))
        .map(|l| {
            PatternEvent::new(
                curr.venue(),
                curr.instrument(),
                curr.captured_at(),
                PatternEvidence::RapidDisappearance {
                    side: BookSide::Bid,
                    price: l.price,
                    volume: l.size,
                    duration_seconds,
                },
            )
        })
        .collect()
}

/// Run of one level at an unchanged quantized size
struct LevelRun {
    volume: Decimal,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
    snapshot_count: usize,
}

/// Top-K levels held at an unchanged quantized size for at least `min_lifetime`
///
/// One event per uninterrupted run, stamped with the last snapshot the level
/// was seen in. Snapshots sharing a capture time with their predecessor are
/// ignored.
pub fn detect_persistent_levels(
    books: &[Book],
    top_k: usize,
    size_dp: u32,
    min_lifetime: Duration,
) -> Vec<PatternEvent> {
    let Some(first) = books.first() else {
        return Vec::new();
    };
    let (venue, instrument) = (first.venue(), first.instrument());

    let mut open: HashMap<(BookSide, Decimal), LevelRun> = HashMap::new();
    let mut closed: Vec<((BookSide, Decimal), LevelRun)> = Vec::new();
    let mut last_ts: Option<DateTime<Utc>> = None;

    for book in books {
        let ts = book.captured_at();
        if last_ts.is_some_and(|prev| ts <= prev) {
            continue;
        }
        last_ts = Some(ts);

        let mut current: HashMap<(BookSide, Decimal), Decimal> = HashMap::new();
        for side in SIDES {
            for level in book.top(side, top_k) {
                current.insert((side, level.price), quantize(level.size, size_dp));
            }
        }

        // Close runs whose level vanished or changed size
        let ended: Vec<(BookSide, Decimal)> = open
            .iter()
            .filter(|(key, run)| current.get(*key) != Some(&run.volume))
            .map(|(key, _)| *key)
            .collect();
        for key in ended {
            if let Some(run) = open.remove(&key) {
                closed.push((key, run));
            }
        }

        for (key, volume) in current {
            open.entry(key)
                .and_modify(|run| {
                    run.last_seen = ts;
                    run.snapshot_count += 1;
                })
                .or_insert(LevelRun {
                    volume,
                    first_seen: ts,
                    last_seen: ts,
                    snapshot_count: 1,
                });
        }
    }

    closed.extend(open);

    let mut events: Vec<PatternEvent> = closed
        .into_iter()
        .filter(|(_, run)| run.snapshot_count >= 2 && run.last_seen - run.first_seen >= min_lifetime)
        .map(|((side, price), run)| {
            PatternEvent::new(
                venue,
                instrument,
                run.last_seen,
                PatternEvidence::PersistentLevel {
                    side,
                    price,
                    volume: run.volume,
                    duration_seconds: (run.last_seen - run.first_seen).num_milliseconds() as f64
                        / 1000.0,
                    snapshot_count: run.snapshot_count,
                },
            )
        })
        .collect();

    events.sort_by(|a, b| {
        a.detected_at
            .cmp(&b.detected_at)
            .then_with(|| persistent_key(a).cmp(&persistent_key(b)))
    });
    events
}

fn persistent_key(event: &PatternEvent) -> Option<(BookSide, Decimal)> {
    match &event.evidence {
        PatternEvidence::PersistentLevel { side, price, .. } => Some((*side, *price)),
        _ => None,
    }
}

/// Additive MM probability score in [0, 100]
pub fn mm_probability_score(counts: &PatternCounts) -> f64 {
    let terms = [
        (counts.round_number, ROUND_NUMBER_TERM),
        (counts.symmetric, SYMMETRIC_TERM),
        (counts.wall, WALL_TERM),
        (counts.rapid_change, RAPID_CHANGE_TERM),
        (counts.persistent_level, PERSISTENT_LEVEL_TERM),
    ];

    let score: f64 = terms
        .iter()
        .filter(|(count, (threshold, _))| count > threshold)
        .map(|(_, (_, weight))| weight)
        .sum();

    score.clamp(0.0, 100.0)
}
