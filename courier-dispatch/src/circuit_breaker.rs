//! Per-provider circuit breaker to prevent retry storms
//!
//! Each provider in the fallback chain owns one breaker. The breaker counts
//! consecutive failures; reaching the threshold opens the circuit and all
//! attempts against that provider are skipped until the cooldown elapses.
//!
//! There is no separate half-open state: the expiry of the cooldown is
//! observed lazily by the next [`CircuitBreaker::should_allow`] check, which
//! closes the circuit and resets the failure counter as a side effect. The
//! first attempt after cooldown is therefore a full, unthrottled retry; if
//! it fails, failures accumulate toward the threshold again.
//!
//! ```text
//! ┌─────────┐  threshold consecutive failures   ┌──────┐
//! │ Closed  │ ────────────────────────────────> │ Open │
//! └─────────┘                                   └──────┘
//!     ^                                             │
//!     │        cooldown elapsed, observed at        │
//!     └──────── the next should_allow check ────────┘
//! ```

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration for circuit breaker behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open before attempts are allowed again
    /// (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Per-provider overrides
    #[serde(default)]
    pub provider_overrides: ahash::AHashMap<String, ProviderBreakerConfig>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
            provider_overrides: ahash::AHashMap::default(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown_ms() -> u64 {
    30_000
}

impl CircuitBreakerConfig {
    /// Resolve the effective settings for a provider, honouring overrides.
    #[must_use]
    pub fn for_provider(&self, name: &str) -> ProviderBreakerConfig {
        self.provider_overrides
            .get(name)
            .copied()
            .unwrap_or(ProviderBreakerConfig {
                failure_threshold: self.failure_threshold,
                cooldown_ms: self.cooldown_ms,
            })
    }
}

/// Per-provider circuit breaker settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProviderBreakerConfig {
    /// Failure threshold for this provider
    pub failure_threshold: u32,
    /// Cooldown for this provider (milliseconds)
    pub cooldown_ms: u64,
}

/// Mutable breaker state, guarded by the breaker's mutex.
#[derive(Debug)]
struct BreakerData {
    /// Number of consecutive failures since the last success or reset
    consecutive_failures: u32,
    /// Whether the circuit is currently open
    is_open: bool,
    /// When the circuit was opened
    opened_at: Option<Instant>,
}

/// Circuit breaker for a single provider.
///
/// Owned exclusively by that provider's entry in the fallback chain. State
/// is mutated by the queue consumer during dispatch; the mutex exists so
/// status surfaces can read a consistent snapshot concurrently.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: Arc<str>,
    failure_threshold: u32,
    cooldown: Duration,
    data: Mutex<BreakerData>,
}

impl CircuitBreaker {
    /// Create a closed breaker for the named provider.
    #[must_use]
    pub fn new(provider: impl Into<Arc<str>>, config: &ProviderBreakerConfig) -> Self {
        Self {
            provider: provider.into(),
            failure_threshold: config.failure_threshold.max(1),
            cooldown: Duration::from_millis(config.cooldown_ms),
            data: Mutex::new(BreakerData {
                consecutive_failures: 0,
                is_open: false,
                opened_at: None,
            }),
        }
    }

    /// Check whether an attempt against this provider is allowed.
    ///
    /// An open circuit whose cooldown has elapsed is closed here, as a side
    /// effect of the check, and the failure counter is reset.
    pub fn should_allow(&self) -> bool {
        let mut data = self.data.lock();

        if !data.is_open {
            return true;
        }

        let expired = data
            .opened_at
            .is_some_and(|opened_at| opened_at.elapsed() >= self.cooldown);

        if expired {
            data.is_open = false;
            data.opened_at = None;
            data.consecutive_failures = 0;
            tracing::info!(
                provider = %self.provider,
                "Circuit breaker CLOSED after cooldown - attempts allowed again"
            );
            true
        } else {
            false
        }
    }

    /// Record a successful attempt.
    ///
    /// Resets the consecutive failure counter unconditionally. Does not
    /// close an open circuit; only the cooldown check does that.
    pub fn record_success(&self) {
        let mut data = self.data.lock();
        data.consecutive_failures = 0;
    }

    /// Record a failed attempt.
    ///
    /// Returns `true` if the circuit transitioned to open. Failures recorded
    /// while the circuit is already open (from the in-flight retry loop that
    /// tripped it) keep counting but do not re-stamp the cooldown.
    pub fn record_failure(&self) -> bool {
        let mut data = self.data.lock();
        data.consecutive_failures += 1;

        if data.is_open {
            return false;
        }

        if data.consecutive_failures >= self.failure_threshold {
            data.is_open = true;
            data.opened_at = Some(Instant::now());
            tracing::warn!(
                provider = %self.provider,
                failures = data.consecutive_failures,
                threshold = self.failure_threshold,
                cooldown = ?self.cooldown,
                "Circuit breaker OPENED - skipping provider to prevent retry storm"
            );
            true
        } else {
            false
        }
    }

    /// Snapshot of the breaker state (for status surfaces).
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let data = self.data.lock();
        CircuitBreakerStats {
            is_open: data.is_open,
            consecutive_failures: data.consecutive_failures,
        }
    }
}

/// Circuit breaker statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    /// Whether the circuit is currently open
    pub is_open: bool,
    /// Number of consecutive failures
    pub consecutive_failures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, cooldown_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "primary",
            &ProviderBreakerConfig {
                failure_threshold: threshold,
                cooldown_ms,
            },
        )
    }

    #[test]
    fn test_closed_allows_and_trips_at_threshold() {
        let breaker = breaker(3, 60_000);

        assert!(breaker.should_allow());

        assert!(!breaker.record_failure());
        assert!(!breaker.record_failure());
        assert!(breaker.should_allow());

        // Third consecutive failure trips the circuit
        assert!(breaker.record_failure());
        assert!(!breaker.should_allow());
        assert!(breaker.stats().is_open);
    }

    #[test]
    fn test_success_resets_failure_count() {
        let breaker = breaker(3, 60_000);

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();

        // Two more failures do not trip: the counter was reset
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.stats().is_open);
        assert_eq!(breaker.stats().consecutive_failures, 2);
    }

    #[test]
    fn test_cooldown_expiry_closes_on_check() {
        let breaker = breaker(2, 0);

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.stats().is_open);

        // Zero cooldown: the very next check closes the circuit and resets
        assert!(breaker.should_allow());
        let stats = breaker.stats();
        assert!(!stats.is_open);
        assert_eq!(stats.consecutive_failures, 0);
    }

    #[test]
    fn test_open_blocks_within_cooldown() {
        let breaker = breaker(1, 60_000);

        breaker.record_failure();
        assert!(!breaker.should_allow());
        assert!(!breaker.should_allow());
    }

    #[test]
    fn test_failures_while_open_do_not_restamp() {
        let breaker = breaker(2, 50);

        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.stats().is_open);

        // Mid-loop failures after the trip keep counting but do not extend
        // the cooldown window
        std::thread::sleep(Duration::from_millis(30));
        assert!(!breaker.record_failure());
        std::thread::sleep(Duration::from_millis(30));

        assert!(breaker.should_allow());
    }

    #[test]
    fn test_config_provider_override() {
        let mut config = CircuitBreakerConfig::default();
        config.provider_overrides.insert(
            "flaky".to_string(),
            ProviderBreakerConfig {
                failure_threshold: 2,
                cooldown_ms: 100,
            },
        );

        let effective = config.for_provider("flaky");
        assert_eq!(effective.failure_threshold, 2);

        let fallback = config.for_provider("primary");
        assert_eq!(fallback.failure_threshold, config.failure_threshold);
    }
}
