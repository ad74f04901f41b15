//! Utility functions for report evaluation
//!
//! Timeout enforcement with structured logging, shared by the batch runner.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Error types for the evaluation timeout wrapper
#[derive(Debug)]
pub enum TimeoutError {
    /// Evaluation returned an error
    Evaluation(String),
    /// Evaluation exceeded its budget
    Exceeded(Duration),
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutError::Evaluation(msg) => write!(f, "Evaluation error: {}", msg),
            TimeoutError::Exceeded(limit) => {
                write!(f, "Evaluation exceeded {}ms timeout", limit.as_millis())
            }
        }
    }
}

impl std::error::Error for TimeoutError {}

/// Wraps an evaluation future with a timeout and error logging
///
/// # Returns
/// - `Ok(T)`: future completed within `limit`
/// - `Err(TimeoutError::Evaluation)`: future returned an error (logged)
/// - `Err(TimeoutError::Exceeded)`: `limit` elapsed first (logged)
pub async fn with_timeout<T, E, F>(
    future: F,
    limit: Duration,
    venue: &str,
    instrument: &str,
) -> Result<T, TimeoutError>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    match timeout(limit, future).await {
        Ok(Ok(result)) => {
            tracing::debug!(
                venue = %venue,
                instrument = %instrument,
                "Evaluation completed"
            );
            Ok(result)
        }
        Ok(Err(e)) => {
            tracing::error!(
                venue = %venue,
                instrument = %instrument,
                error = %e,
                "Evaluation failed"
            );
            Err(TimeoutError::Evaluation(e.to_string()))
        }
        Err(_elapsed) => {
            tracing::warn!(
                venue = %venue,
                instrument = %instrument,
                timeout_ms = limit.as_millis() as u64,
                "Evaluation exceeded timeout, returning degraded report"
            );
            Err(TimeoutError::Exceeded(limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_success() {
        async fn evaluation() -> Result<String, String> {
            Ok("report".to_string())
        }

        let result = with_timeout(evaluation(), Duration::from_secs(1), "gate", "BTCUSDT").await;
        assert_eq!(result.unwrap(), "report");
    }

    #[tokio::test]
    async fn test_with_timeout_error() {
        async fn evaluation() -> Result<String, String> {
            Err("unknown venue".to_string())
        }

        let result = with_timeout(evaluation(), Duration::from_secs(1), "gate", "BTCUSDT").await;
        assert!(matches!(result, Err(TimeoutError::Evaluation(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_exceeded() {
        async fn slow_evaluation() -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok("too late".to_string())
        }

        let result =
            with_timeout(slow_evaluation(), Duration::from_millis(50), "gate", "BTCUSDT").await;
        match result {
            Err(e @ TimeoutError::Exceeded(_)) => {
                assert_eq!(e.to_string(), "Evaluation exceeded 50ms timeout")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
