//! Configuration Management
//!
//! Detection thresholds, band lists, worker sizing and the venue/instrument
//! universe, loaded from the environment with documented defaults.

pub mod analytics;

// Re-export
pub use analytics::AnalyticsConfig;
