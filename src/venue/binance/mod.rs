//! Binance venue adapter
//!
//! Public REST endpoints for `binance_spot` and `binance_perps`.

pub mod client;
pub mod types;

pub use client::{BinanceAdapter, BinanceMarket};
