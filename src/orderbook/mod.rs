//! Order book analysis
//!
//! - Snapshot and trade records as captured from venues
//! - Validation into non-crossed books
//! - Depth bands around mid, spread statistics and quoting presence
//! - Market-maker detection analytics (see [`analytics`])

pub mod analytics;
pub mod book;
pub mod depth;
pub mod spread;
pub mod types;

pub use book::{Book, ParsedTrade, PriceLevel};
pub use types::{
    BandDepth, BookSide, DepthMetric, EvaluationWindow, OrderBookSnapshot, SpreadSample,
    TakerSide, Trade,
};
