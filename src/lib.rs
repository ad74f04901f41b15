// Library exports for mm-analytics

pub mod config; // Configuration management
pub mod error;

// Order book analytics and market-maker detection
pub mod orderbook;
pub mod report; // MM report builder, batch evaluation, markdown rendering
pub mod store; // Fact store contract and in-memory implementation

pub mod venue; // Venue adapters feeding the fact store

pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use report::{evaluate, evaluate_batch, EvaluationContext, MMReport};
pub use store::{FactStore, MemoryFactStore};
