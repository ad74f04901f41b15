//! Fact store
//!
//! Snapshots and trades are immutable facts retained for a bounded window.
//! Evaluators only read from the store; ingestion writes to it.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use crate::orderbook::types::{EvaluationWindow, OrderBookSnapshot, Trade};

/// Read side of the fact store consumed by evaluators
///
/// Both methods return records inside the inclusive window, most recent
/// first, with duplicates removed.
pub trait FactStore: Send + Sync {
    fn snapshots(
        &self,
        venue: &str,
        instrument: &str,
        window: &EvaluationWindow,
    ) -> Vec<OrderBookSnapshot>;

    fn trades(&self, venue: &str, instrument: &str, window: &EvaluationWindow) -> Vec<Trade>;
}

type SeriesKey = (String, String);

#[derive(Debug, Default)]
struct Series {
    /// Keyed by capture time, one snapshot per instant
    snapshots: BTreeMap<DateTime<Utc>, OrderBookSnapshot>,
    trades: BTreeMap<(DateTime<Utc>, String), Trade>,
    trade_ids: HashSet<String>,
}

/// In-process fact store keyed by (venue, instrument)
#[derive(Debug, Default)]
pub struct MemoryFactStore {
    series: RwLock<HashMap<SeriesKey, Series>>,
}

impl MemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bundle(bundle: FactBundle) -> Self {
        let store = Self::new();
        for snapshot in bundle.snapshots {
            store.insert_snapshot(snapshot);
        }
        store.insert_trades(bundle.trades);
        store
    }

    /// Returns false if a snapshot with the same capture time already exists
    pub fn insert_snapshot(&self, snapshot: OrderBookSnapshot) -> bool {
        let key = series_key(&snapshot.venue, &snapshot.instrument);
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        let entry = series.entry(key).or_default();

        if entry.snapshots.contains_key(&snapshot.captured_at) {
            return false;
        }
        entry.snapshots.insert(snapshot.captured_at, snapshot);
        true
    }

    /// Inserts trades not seen before, returning how many were new
    pub fn insert_trades(&self, trades: impl IntoIterator<Item = Trade>) -> usize {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        let mut inserted = 0;

        for trade in trades {
            let entry = series
                .entry(series_key(&trade.venue, &trade.instrument))
                .or_default();
            if !entry.trade_ids.insert(trade.trade_id.clone()) {
                continue;
            }
            entry
                .trades
                .insert((trade.executed_at, trade.trade_id.clone()), trade);
            inserted += 1;
        }

        inserted
    }

    /// Drop every fact older than `cutoff`, returning the number removed
    pub fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = 0;

        for entry in series.values_mut() {
            let kept_snapshots = entry.snapshots.split_off(&cutoff);
            removed += entry.snapshots.len();
            entry.snapshots = kept_snapshots;

            let kept_trades = entry.trades.split_off(&(cutoff, String::new()));
            for trade in entry.trades.values() {
                entry.trade_ids.remove(&trade.trade_id);
            }
            removed += entry.trades.len();
            entry.trades = kept_trades;
        }

        series.retain(|_, entry| !entry.snapshots.is_empty() || !entry.trades.is_empty());
        removed
    }

    /// Every (venue, instrument) pair holding at least one fact
    pub fn pairs(&self) -> Vec<(String, String)> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        let mut pairs: Vec<SeriesKey> = series.keys().cloned().collect();
        pairs.sort();
        pairs
    }
}

impl FactStore for MemoryFactStore {
    fn snapshots(
        &self,
        venue: &str,
        instrument: &str,
        window: &EvaluationWindow,
    ) -> Vec<OrderBookSnapshot> {
        if window.start > window.end {
            return Vec::new();
        }
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(&series_key(venue, instrument))
            .map(|entry| {
                entry
                    .snapshots
                    .range(window.start..=window.end)
                    .rev()
                    .map(|(_, s)| s.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn trades(&self, venue: &str, instrument: &str, window: &EvaluationWindow) -> Vec<Trade> {
        let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
        series
            .get(&series_key(venue, instrument))
            .map(|entry| {
                entry
                    .trades
                    .iter()
                    .rev()
                    .filter(|((ts, _), _)| window.contains(*ts))
                    .map(|(_, t)| t.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn series_key(venue: &str, instrument: &str) -> SeriesKey {
    (venue.to_string(), instrument.to_uppercase())
}

/// Snapshots and trades loaded from a JSON file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactBundle {
    #[serde(default)]
    pub snapshots: Vec<OrderBookSnapshot>,
    #[serde(default)]
    pub trades: Vec<Trade>,
}

impl FactBundle {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fact bundle {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse fact bundle {}", path.display()))
    }

    /// Smallest window covering every record, None when empty
    pub fn span(&self) -> Option<EvaluationWindow> {
        let timestamps = self
            .snapshots
            .iter()
            .map(|s| s.captured_at)
            .chain(self.trades.iter().map(|t| t.executed_at));

        let (start, end) = timestamps.fold(None, |acc: Option<(DateTime<Utc>, DateTime<Utc>)>, ts| {
            Some(match acc {
                None => (ts, ts),
                Some((lo, hi)) => (lo.min(ts), hi.max(ts)),
            })
        })?;

        Some(EvaluationWindow { start, end })
    }
}
