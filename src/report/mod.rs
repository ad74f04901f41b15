// Report module for market-maker evaluation
//
// Composes depth, liquidity, pattern and trade-flow outputs for one
// (venue, instrument, window) into a single MMReport, with markdown
// rendering and concurrent batch evaluation.

pub mod batch;
pub mod formatter;
pub mod generator;
pub mod sections;
pub mod util;

// Re-export main types
pub use batch::{evaluate_batch, BatchOutcome, EvaluationRequest};
pub use generator::{build_report, evaluate, evaluate_with_deadline, EvaluationContext};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orderbook::analytics::liquidity::profile_liquidity;
use crate::orderbook::analytics::{LiquidityScore, PatternCounts, PatternEvent};
use crate::orderbook::spread::SpreadStats;
use crate::orderbook::types::{DepthMetric, EvaluationWindow};

/// Evaluation stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStage {
    Depth,
    Liquidity,
    Patterns,
    TradeFlow,
}

impl ReportStage {
    pub const ALL: [ReportStage; 4] = [
        ReportStage::Depth,
        ReportStage::Liquidity,
        ReportStage::Patterns,
        ReportStage::TradeFlow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStage::Depth => "depth",
            ReportStage::Liquidity => "liquidity",
            ReportStage::Patterns => "patterns",
            ReportStage::TradeFlow => "trade_flow",
        }
    }
}

/// Record-level exclusions and degradation flags for one evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostics {
    pub snapshots_received: usize,
    pub snapshots_used: usize,
    /// Crossed or one-sided books
    pub crossed_snapshots: usize,
    /// Snapshots with unparseable, out-of-order or overflowing levels
    pub malformed_snapshots: usize,
    pub snapshots_outside_window: usize,

    pub trades_received: usize,
    pub trades_used: usize,
    pub malformed_trades: usize,
    pub trades_outside_lookback: usize,

    /// Consecutive snapshot pairs with non-positive elapsed time
    pub skipped_snapshot_pairs: usize,

    /// Detectors that had too little data to run
    pub insufficient_data: Vec<String>,

    /// Set when any stage was skipped or the evaluation timed out
    pub degraded: bool,
    pub skipped_stages: Vec<ReportStage>,
}

impl Diagnostics {
    /// Records excluded as invalid or malformed
    pub fn excluded_records(&self) -> usize {
        self.crossed_snapshots + self.malformed_snapshots + self.malformed_trades
    }
}

/// Market-maker evaluation report for one (venue, instrument, window)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MMReport {
    #[schemars(with = "String")]
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,

    pub venue: String,
    pub instrument: String,
    pub window: EvaluationWindow,

    /// Order book pattern events, in snapshot order
    pub pattern_events: Vec<PatternEvent>,

    /// Trade-flow signatures (ping-pong, size clusters)
    pub trade_flow: Vec<PatternEvent>,

    pub liquidity: LiquidityScore,

    /// One entry per valid snapshot, oldest first
    pub depth_metrics: Vec<DepthMetric>,

    /// None when no valid snapshot was available
    pub spread: Option<SpreadStats>,

    pub pattern_counts: PatternCounts,

    #[schemars(range(min = 0.0, max = 100.0))]
    pub mm_probability_score: f64,

    pub diagnostics: Diagnostics,
}

impl MMReport {
    /// Report with no results, every stage marked as skipped
    ///
    /// Used when an evaluation could not finish within its budget.
    pub fn degraded(venue: &str, instrument: &str, window: EvaluationWindow) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            venue: venue.to_string(),
            instrument: instrument.to_string(),
            window,
            pattern_events: Vec::new(),
            trade_flow: Vec::new(),
            liquidity: profile_liquidity(venue, instrument, &window, &[], &[], 1),
            depth_metrics: Vec::new(),
            spread: None,
            pattern_counts: PatternCounts::default(),
            mm_probability_score: 0.0,
            diagnostics: Diagnostics {
                degraded: true,
                skipped_stages: ReportStage::ALL.to_vec(),
                ..Default::default()
            },
        }
    }

    /// Most recent depth metric in the window
    pub fn latest_depth(&self) -> Option<&DepthMetric> {
        self.depth_metrics.last()
    }

    pub fn to_markdown(&self) -> String {
        sections::render_report(self)
    }

    /// JSON Schema describing the serialized report
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(MMReport)
    }
}
