//! Retry error types.
//!
//! Operation errors are never wrapped by the executor. The types here only
//! cover the retry machinery itself.

use thiserror::Error;

/// Invalid retry configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// `max_attempts` must allow at least one attempt.
    #[error("max_attempts must be at least 1 (got {0})")]
    InvalidMaxAttempts(u32),

    /// Backoff multipliers below 1.0 would shrink the delay.
    #[error("backoff multiplier must be a finite value >= 1.0 (got {0})")]
    InvalidMultiplier(f64),

    /// Jitter factor outside `0.0..=1.0`.
    #[error("jitter factor must be between 0.0 and 1.0 (got {0})")]
    InvalidJitter(f64),
}

/// The retry loop was cancelled while waiting between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("retry cancelled before the next attempt")]
pub struct Cancelled;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::InvalidMaxAttempts(0).to_string(),
            "max_attempts must be at least 1 (got 0)"
        );
        assert_eq!(
            ConfigError::InvalidJitter(2.0).to_string(),
            "jitter factor must be between 0.0 and 1.0 (got 2)"
        );
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(Cancelled.to_string(), "retry cancelled before the next attempt");
    }
}
