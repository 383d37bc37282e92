//! Retry policy for delivery attempts.
//!
//! Encapsulates the per-provider attempt budget and the exponential backoff
//! schedule, independent of the dispatcher that applies them.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Retry configuration for delivery attempts against a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per provider (configured retries + the first attempt).
    ///
    /// Default: 3 (two retries)
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Base delay for exponential backoff (milliseconds).
    ///
    /// The delay before attempt `k` (k ≥ 2) is `base * 2^(k - 2)`.
    ///
    /// Default: 200ms
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff delay (milliseconds). Caps the exponential growth.
    ///
    /// Default: 30000ms (30 seconds)
    #[serde(default = "defaults::max_delay_ms")]
    pub max_delay_ms: u64,

    /// Jitter factor randomizing each delay within ±`jitter_factor`.
    ///
    /// Prevents a thundering herd when many messages back off together.
    /// Zero gives the exact exponential series.
    ///
    /// Default: 0.1 (±10%)
    #[serde(default = "defaults::jitter_factor")]
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
            max_delay_ms: defaults::max_delay_ms(),
            jitter_factor: defaults::jitter_factor(),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt fits in this provider's budget.
    #[must_use]
    pub const fn should_attempt(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay to wait before the given attempt (1-indexed).
    ///
    /// The first attempt is immediate. For attempt `k` (k ≥ 2) the delay is
    /// `base * 2^(k - 2)`, capped at `max_delay_ms`, with ± jitter applied.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = attempt - 2;
        let delay_ms = if exponent >= 63 {
            self.max_delay_ms
        } else {
            self.base_delay_ms
                .saturating_mul(1u64 << exponent)
                .min(self.max_delay_ms)
        };

        if self.jitter_factor <= 0.0 {
            return Duration::from_millis(delay_ms);
        }

        // Intentional precision loss and casting for randomization
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let jittered_ms = {
            let jitter_range = (delay_ms as f64) * self.jitter_factor;
            let mut rng = rand::rng();
            let jitter: f64 = rng.random_range(-jitter_range..=jitter_range);
            ((delay_ms as f64) + jitter).max(0.0) as u64
        };

        Duration::from_millis(jittered_ms)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        200
    }

    pub const fn max_delay_ms() -> u64 {
        30_000
    }

    pub const fn jitter_factor() -> f64 {
        0.1
    }
}
