//! Analytics Engine Configuration
//!
//! ## Environment Variables
//!
//! - `MM_BAND_PCTS`: Comma-separated depth bands in percent (default: 0.1,0.5,1,2,4,5,8)
//! - `MM_TOP_K`: Levels per side scanned by detectors (default: 20)
//! - `MM_WALL_MEAN_LEVELS`: Levels per side averaged for the wall baseline (default: 10)
//! - `MM_WALL_MULTIPLIER`: Volume multiple of the baseline that marks a wall (default: 5)
//! - `MM_DISAPPEARANCE_MIN_VOLUME`: Minimum bid size tracked for disappearance (default: 1)
//! - `MM_SIZE_QUANTIZATION_DP`: Decimal places kept when matching symmetric sizes (default: 4)
//! - `MM_PERSISTENCE_MIN_SECS`: Minimum lifetime of a persistent level (default: 60)
//! - `MM_PING_PONG_WINDOW`: Trades per ping-pong window (default: 10)
//! - `MM_PING_PONG_MIN_SIDE_TRADES`: Buys and sells a window must exceed (default: 3)
//! - `MM_PING_PONG_MAX_REL_DIFF`: Max relative buy/sell price gap (default: 0.001)
//! - `MM_SIZE_CLUSTER_MIN_COUNT`: Occurrences a size must exceed to cluster (default: 5)
//! - `MM_TRADE_LOOKBACK_SECS`: Trade lookback ending at the window end (default: 3600)
//! - `MM_EVALUATION_TIMEOUT_MS`: Per-pair evaluation budget (default: 2000)
//! - `MM_WORKER_THREADS`: Concurrent evaluations in a batch (default: CPU cores)
//! - `MM_VENUES`: Recognised venue ids, empty accepts any well-formed id
//! - `MM_INSTRUMENTS`: Recognised instrument ids, empty accepts any well-formed id
//! - `MM_HTTP_TIMEOUT_SECS`: Venue REST request timeout (default: 10)

use crate::error::{AnalyticsError, Result};
use rust_decimal::Decimal;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

/// Depth bands used when none are configured
pub const DEFAULT_BAND_PCTS: [f64; 7] = [0.1, 0.5, 1.0, 2.0, 4.0, 5.0, 8.0];

/// Venue ids recognised when MM_VENUES is unset
pub const DEFAULT_VENUES: [&str; 5] = ["binance_spot", "binance_perps", "bitget", "gate", "kucoin"];

/// Analytics engine configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsConfig {
    /// Depth bands in percent of mid, strictly ascending
    pub band_pcts: Vec<f64>,

    /// Levels per side scanned by the pattern detector and imbalance
    pub top_k: usize,

    /// Levels per side averaged into the wall baseline
    pub wall_mean_levels: usize,

    /// A level is a wall when its volume exceeds this multiple of the baseline
    pub wall_multiplier: f64,

    /// Bid levels at or below this size are ignored by disappearance tracking
    pub disappearance_min_volume: Decimal,

    /// Decimal places kept when comparing sizes for symmetry and persistence
    pub size_quantization_dp: u32,

    /// Minimum lifetime of an unchanged level before it counts as persistent
    pub persistence_min_secs: i64,

    pub ping_pong_window: usize,
    pub ping_pong_min_side_trades: usize,
    pub ping_pong_max_rel_diff: f64,
    pub size_cluster_min_count: usize,

    /// Trades older than `window.end - lookback` are ignored
    pub trade_lookback_secs: i64,

    /// Per-pair evaluation budget
    pub evaluation_timeout_ms: u64,

    /// Maximum concurrent evaluations in a batch
    pub worker_threads: usize,

    /// Recognised venue ids (empty accepts any well-formed id)
    pub venues: Vec<String>,

    /// Recognised instrument ids (empty accepts any well-formed id)
    pub instruments: Vec<String>,

    /// Venue REST request timeout
    pub http_timeout_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            band_pcts: DEFAULT_BAND_PCTS.to_vec(),
            top_k: 20,
            wall_mean_levels: 10,
            wall_multiplier: 5.0,
            disappearance_min_volume: Decimal::ONE,
            size_quantization_dp: 4,
            persistence_min_secs: 60,
            ping_pong_window: 10,
            ping_pong_min_side_trades: 3,
            ping_pong_max_rel_diff: 0.001,
            size_cluster_min_count: 5,
            trade_lookback_secs: 3600,
            evaluation_timeout_ms: 2000,
            worker_threads: default_worker_threads(),
            venues: DEFAULT_VENUES.iter().map(|v| v.to_string()).collect(),
            instruments: vec!["BTCUSDT".to_string()],
            http_timeout_secs: 10,
        }
    }
}

impl AnalyticsConfig {
    /// Load configuration from environment variables, falling back to defaults
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::Configuration` if a variable does not parse or the
    /// resulting configuration fails validation
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let band_pcts = match std::env::var("MM_BAND_PCTS") {
            Ok(raw) => parse_list::<f64>("MM_BAND_PCTS", &raw)?,
            Err(_) => defaults.band_pcts,
        };

        let config = Self {
            band_pcts,
            top_k: env_or("MM_TOP_K", defaults.top_k)?,
            wall_mean_levels: env_or("MM_WALL_MEAN_LEVELS", defaults.wall_mean_levels)?,
            wall_multiplier: env_or("MM_WALL_MULTIPLIER", defaults.wall_multiplier)?,
            disappearance_min_volume: env_or(
                "MM_DISAPPEARANCE_MIN_VOLUME",
                defaults.disappearance_min_volume,
            )?,
            size_quantization_dp: env_or("MM_SIZE_QUANTIZATION_DP", defaults.size_quantization_dp)?,
            persistence_min_secs: env_or("MM_PERSISTENCE_MIN_SECS", defaults.persistence_min_secs)?,
            ping_pong_window: env_or("MM_PING_PONG_WINDOW", defaults.ping_pong_window)?,
            ping_pong_min_side_trades: env_or(
                "MM_PING_PONG_MIN_SIDE_TRADES",
                defaults.ping_pong_min_side_trades,
            )?,
            ping_pong_max_rel_diff: env_or(
                "MM_PING_PONG_MAX_REL_DIFF",
                defaults.ping_pong_max_rel_diff,
            )?,
            size_cluster_min_count: env_or(
                "MM_SIZE_CLUSTER_MIN_COUNT",
                defaults.size_cluster_min_count,
            )?,
            trade_lookback_secs: env_or("MM_TRADE_LOOKBACK_SECS", defaults.trade_lookback_secs)?,
            evaluation_timeout_ms: env_or("MM_EVALUATION_TIMEOUT_MS", defaults.evaluation_timeout_ms)?,
            worker_threads: env_or("MM_WORKER_THREADS", defaults.worker_threads)?,
            venues: env_ids("MM_VENUES", defaults.venues, false),
            instruments: env_ids("MM_INSTRUMENTS", defaults.instruments, true),
            http_timeout_secs: env_or("MM_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates ranges and orderings that the detectors rely on
    ///
    /// # Validation Rules
    /// - `band_pcts`: non-empty, each in (0, 100], strictly ascending
    /// - `top_k`, `wall_mean_levels`, `worker_threads`: at least 1
    /// - `ping_pong_window`: at least 2
    /// - `size_quantization_dp`: at most 28 (decimal scale limit)
    /// - `trade_lookback_secs`, `evaluation_timeout_ms`: positive
    pub fn validate(&self) -> Result<()> {
        if self.band_pcts.is_empty() {
            return Err(AnalyticsError::Configuration(
                "band_pcts must contain at least one band".to_string(),
            ));
        }

        for pct in &self.band_pcts {
            if !pct.is_finite() || *pct <= 0.0 || *pct > 100.0 {
                return Err(AnalyticsError::Configuration(format!(
                    "band percentage must be in (0, 100], got {}",
                    pct
                )));
            }
        }

        if self.band_pcts.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalyticsError::Configuration(
                "band_pcts must be strictly ascending".to_string(),
            ));
        }

        if self.top_k == 0 || self.wall_mean_levels == 0 || self.worker_threads == 0 {
            return Err(AnalyticsError::Configuration(
                "top_k, wall_mean_levels and worker_threads must be at least 1".to_string(),
            ));
        }

        if !self.wall_multiplier.is_finite() || self.wall_multiplier <= 0.0 {
            return Err(AnalyticsError::Configuration(format!(
                "wall_multiplier must be positive, got {}",
                self.wall_multiplier
            )));
        }

        if self.ping_pong_window < 2 {
            return Err(AnalyticsError::Configuration(format!(
                "ping_pong_window must be at least 2, got {}",
                self.ping_pong_window
            )));
        }

        if self.size_quantization_dp > 28 {
            return Err(AnalyticsError::Configuration(format!(
                "size_quantization_dp must be at most 28, got {}",
                self.size_quantization_dp
            )));
        }

        if self.trade_lookback_secs <= 0 || self.evaluation_timeout_ms == 0 {
            return Err(AnalyticsError::Configuration(
                "trade_lookback_secs and evaluation_timeout_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AnalyticsError::Configuration(format!("{}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

fn parse_list<T>(key: &str, raw: &str) -> Result<Vec<T>>
where
    T: FromStr,
    T::Err: Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse()
                .map_err(|e| AnalyticsError::Configuration(format!("{}: {}", key, e)))
        })
        .collect()
}

fn env_ids(key: &str, default: Vec<String>, uppercase: bool) -> Vec<String> {
    match std::env::var(key) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| {
                if uppercase {
                    id.to_uppercase()
                } else {
                    id.to_string()
                }
            })
            .collect(),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = AnalyticsConfig::default();

        assert_eq!(config.band_pcts, vec![0.1, 0.5, 1.0, 2.0, 4.0, 5.0, 8.0]);
        assert_eq!(config.top_k, 20);
        assert_eq!(config.wall_mean_levels, 10);
        assert_eq!(config.disappearance_min_volume, Decimal::ONE);
        assert_eq!(config.ping_pong_window, 10);
        assert_eq!(config.trade_lookback_secs, 3600);
        assert!(config.worker_threads >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unordered_bands() {
        let config = AnalyticsConfig {
            band_pcts: vec![1.0, 0.5],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AnalyticsError::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_band() {
        let config = AnalyticsConfig {
            band_pcts: vec![0.0, 1.0],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AnalyticsConfig {
            band_pcts: vec![1.0, 150.0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_list() {
        let bands: Vec<f64> = parse_list("MM_BAND_PCTS", "0.1, 1 ,2,").unwrap();
        assert_eq!(bands, vec![0.1, 1.0, 2.0]);

        assert!(parse_list::<f64>("MM_BAND_PCTS", "0.1,abc").is_err());
    }

    #[test]
    fn test_from_env_overrides() {
        // SAFETY: Test-only code, variables are unique to this test
        unsafe {
            std::env::set_var("MM_PING_PONG_WINDOW", "12");
            std::env::set_var("MM_INSTRUMENTS", "btcusdt, ethusdt");
        }

        let config = AnalyticsConfig::from_env().expect("Failed to load config");

        assert_eq!(config.ping_pong_window, 12);
        assert_eq!(config.instruments, vec!["BTCUSDT", "ETHUSDT"]);

        unsafe {
            std::env::remove_var("MM_PING_PONG_WINDOW");
            std::env::remove_var("MM_INSTRUMENTS");
        }
    }
}
