use thiserror::Error;

/// Error taxonomy for the analytics core
///
/// Only `Input` and `Configuration` ever reach callers of `evaluate`. The
/// remaining variants describe per-record or per-stage failures that are
/// absorbed into report diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// Crossed or one-sided order book
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Malformed price/size value in a single record
    #[error("Computation error: {0}")]
    Computation(String),

    /// Structurally invalid call (unknown venue, bad window, ...)
    #[error("Input error: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AnalyticsError {
    /// Errors that surface to the caller instead of being recorded as diagnostics
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalyticsError::Input(_) | AnalyticsError::Configuration(_)
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            AnalyticsError::InvalidSnapshot(_) => "invalid_snapshot",
            AnalyticsError::InsufficientData(_) => "insufficient_data",
            AnalyticsError::Computation(_) => "computation_error",
            AnalyticsError::Input(_) => "input_error",
            AnalyticsError::Configuration(_) => "configuration_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_call_level_errors_are_fatal() {
        assert!(AnalyticsError::Input("unknown venue".into()).is_fatal());
        assert!(AnalyticsError::Configuration("bad band".into()).is_fatal());
        assert!(!AnalyticsError::InvalidSnapshot("crossed".into()).is_fatal());
        assert!(!AnalyticsError::Computation("bad price".into()).is_fatal());
        assert!(!AnalyticsError::InsufficientData("1 snapshot".into()).is_fatal());
    }

    #[test]
    fn test_error_type_labels() {
        assert_eq!(
            AnalyticsError::InvalidSnapshot(String::new()).error_type(),
            "invalid_snapshot"
        );
        assert_eq!(AnalyticsError::Input(String::new()).error_type(), "input_error");
    }
}
