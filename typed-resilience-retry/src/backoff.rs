//! Wait strategies between attempts.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Strategy for waiting between attempts.
///
/// The delay is a pure function of the 1-based index of the attempt that just
/// completed and the strategy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WaitStrategy {
    /// No waiting.
    None,
    /// Fixed delay.
    Fixed {
        /// Delay between attempts.
        #[serde(rename = "delay_ms", with = "millis")]
        delay: Duration,
    },
    /// Exponential backoff.
    ExponentialBackoff {
        /// Delay after the first attempt.
        #[serde(rename = "initial_ms", with = "millis")]
        initial: Duration,
        /// Maximum delay.
        #[serde(rename = "max_ms", with = "millis")]
        max: Duration,
        /// Multiplier for each attempt.
        #[serde(default = "default_multiplier")]
        multiplier: f64,
    },
    /// Exponential backoff with jitter.
    ExponentialJitter {
        /// Delay after the first attempt.
        #[serde(rename = "initial_ms", with = "millis")]
        initial: Duration,
        /// Maximum delay.
        #[serde(rename = "max_ms", with = "millis")]
        max: Duration,
        /// Multiplier for each attempt.
        #[serde(default = "default_multiplier")]
        multiplier: f64,
        /// Jitter factor (0.0 to 1.0).
        jitter: f64,
    },
    /// Linear backoff.
    Linear {
        /// Delay after the first attempt.
        #[serde(rename = "initial_ms", with = "millis")]
        initial: Duration,
        /// Increment per attempt.
        #[serde(rename = "increment_ms", with = "millis")]
        increment: Duration,
        /// Maximum delay.
        #[serde(rename = "max_ms", with = "millis")]
        max: Duration,
    },
}

impl Default for WaitStrategy {
    fn default() -> Self {
        Self::Fixed {
            delay: Duration::from_millis(500),
        }
    }
}

impl WaitStrategy {
    /// Fixed delay.
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    /// Exponential backoff doubling on each attempt.
    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self::ExponentialBackoff {
            initial,
            max,
            multiplier: default_multiplier(),
        }
    }

    /// Calculate the wait duration after the given attempt failed.
    pub fn calculate(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        match self {
            WaitStrategy::None => Duration::ZERO,
            WaitStrategy::Fixed { delay } => *delay,
            WaitStrategy::ExponentialBackoff {
                initial,
                max,
                multiplier,
            } => {
                let delay = initial.as_secs_f64() * multiplier.powi(exponent);
                capped_secs(delay, *max)
            }
            WaitStrategy::ExponentialJitter {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                let base = capped_secs(initial.as_secs_f64() * multiplier.powi(exponent), *max)
                    .as_secs_f64();
                let jitter_amount = base * jitter * random_jitter();
                capped_secs(base + jitter_amount, *max)
            }
            WaitStrategy::Linear {
                initial,
                increment,
                max,
            } => {
                let delay = initial.saturating_add(increment.saturating_mul(attempt.saturating_sub(1)));
                delay.min(*max)
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        match self {
            WaitStrategy::ExponentialBackoff { multiplier, .. } => check_multiplier(*multiplier),
            WaitStrategy::ExponentialJitter {
                multiplier, jitter, ..
            } => {
                check_multiplier(*multiplier)?;
                if !(0.0..=1.0).contains(jitter) {
                    return Err(ConfigError::InvalidJitter(*jitter));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn check_multiplier(multiplier: f64) -> Result<(), ConfigError> {
    if multiplier.is_finite() && multiplier >= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidMultiplier(multiplier))
    }
}

/// Convert float seconds to a duration no larger than `max`.
///
/// Saturates instead of panicking: `Duration::MAX.as_secs_f64()` rounds up
/// past the largest representable duration.
fn capped_secs(secs: f64, max: Duration) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    if secs >= max.as_secs_f64() {
        return max;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(max).min(max)
}

fn default_multiplier() -> f64 {
    2.0
}

/// Generate a random jitter factor between -1.0 and 1.0.
fn random_jitter() -> f64 {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    rng.gen_range(-1.0..1.0)
}

/// Durations as integer milliseconds.
pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_strategy_fixed() {
        let strategy = WaitStrategy::fixed(Duration::from_secs(1));
        assert_eq!(strategy.calculate(1), Duration::from_secs(1));
        assert_eq!(strategy.calculate(3), Duration::from_secs(1));
    }

    #[test]
    fn test_wait_strategy_exponential() {
        let strategy = WaitStrategy::exponential(Duration::from_millis(100), Duration::from_secs(10));

        assert_eq!(strategy.calculate(1), Duration::from_millis(100));
        assert_eq!(strategy.calculate(2), Duration::from_millis(200));
        assert_eq!(strategy.calculate(3), Duration::from_millis(400));
    }

    #[test]
    fn test_wait_strategy_exponential_cap() {
        let strategy = WaitStrategy::ExponentialBackoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
            multiplier: 10.0,
        };

        assert_eq!(strategy.calculate(5), Duration::from_secs(5));
        assert_eq!(strategy.calculate(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_wait_strategy_uncapped_saturates() {
        let strategy = WaitStrategy::exponential(Duration::from_secs(1), Duration::MAX);

        assert_eq!(strategy.calculate(2), Duration::from_secs(2));
        assert_eq!(strategy.calculate(70), Duration::MAX);
        assert_eq!(strategy.calculate(u32::MAX), Duration::MAX);

        let jittered = WaitStrategy::ExponentialJitter {
            initial: Duration::from_secs(1),
            max: Duration::MAX,
            multiplier: 2.0,
            jitter: 0.5,
        };
        assert_eq!(jittered.calculate(u32::MAX), Duration::MAX);
        assert!(jittered.calculate(70) >= Duration::from_secs(1 << 62));
    }

    #[test]
    fn test_wait_strategy_zero_initial_overflowing_exponent() {
        let strategy = WaitStrategy::exponential(Duration::ZERO, Duration::MAX);
        assert_eq!(strategy.calculate(u32::MAX), Duration::ZERO);
    }

    #[test]
    fn test_wait_strategy_jitter_bounds() {
        let strategy = WaitStrategy::ExponentialJitter {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.5,
        };

        for _ in 0..100 {
            let delay = strategy.calculate(2);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(300));
        }
    }

    #[test]
    fn test_wait_strategy_linear() {
        let strategy = WaitStrategy::Linear {
            initial: Duration::from_millis(100),
            increment: Duration::from_millis(100),
            max: Duration::from_secs(1),
        };

        assert_eq!(strategy.calculate(1), Duration::from_millis(100));
        assert_eq!(strategy.calculate(2), Duration::from_millis(200));
        assert_eq!(strategy.calculate(3), Duration::from_millis(300));
        assert_eq!(strategy.calculate(20), Duration::from_secs(1));
    }

    #[test]
    fn test_validate() {
        assert!(WaitStrategy::None.validate().is_ok());
        assert!(matches!(
            WaitStrategy::ExponentialBackoff {
                initial: Duration::ZERO,
                max: Duration::ZERO,
                multiplier: 0.5,
            }
            .validate(),
            Err(ConfigError::InvalidMultiplier(_))
        ));
        assert!(matches!(
            WaitStrategy::ExponentialJitter {
                initial: Duration::ZERO,
                max: Duration::ZERO,
                multiplier: 2.0,
                jitter: 1.5,
            }
            .validate(),
            Err(ConfigError::InvalidJitter(_))
        ));
    }

    #[test]
    fn test_deserialize_millis() {
        let strategy: WaitStrategy =
            serde_json::from_str(r#"{"type":"exponential_backoff","initial_ms":50,"max_ms":1000}"#)
                .unwrap();

        assert_eq!(
            strategy,
            WaitStrategy::ExponentialBackoff {
                initial: Duration::from_millis(50),
                max: Duration::from_secs(1),
                multiplier: 2.0,
            }
        );
    }
}
