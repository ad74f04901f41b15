//! Market-maker detection analytics
//!
//! This module provides the detectors run over a window of validated snapshots
//! and trades:
//! - Order book patterns (round numbers, symmetric quotes, walls, pulled bids,
//!   persistent levels) and the MM probability score
//! - Trade-flow signatures (ping-pong, size clustering)
//! - Liquidity profiling and composite liquidity score

pub mod flow;
pub mod liquidity;
pub mod patterns;
pub mod types;

pub use types::*;
