//! Aggregate configuration for the dispatch core.
//!
//! One parametrized core, configured by value: retry/backoff schedule,
//! breaker thresholds, and client rate limits. Every field has a serde
//! default so a partial (or empty) config document deserializes cleanly.

use serde::{Deserialize, Serialize};

use crate::{circuit_breaker::CircuitBreakerConfig, rate_limiter::RateLimitConfig, retry::RetryPolicy};

/// Configuration for a [`DispatchCore`](crate::DispatchCore).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Retry and backoff schedule applied per provider
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Circuit breaker settings (with per-provider overrides)
    #[serde(default)]
    pub breaker: CircuitBreakerConfig,

    /// Client-facing rate limits (with per-client overrides)
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: DispatchConfig = toml::from_str("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.rate_limit.limit, 100);
    }

    #[test]
    fn test_partial_document_overrides_selectively() {
        let config: DispatchConfig = toml::from_str(
            r#"
            [retry]
            max_attempts = 5
            base_delay_ms = 50

            [breaker]
            failure_threshold = 2

            [breaker.provider_overrides.backup]
            failure_threshold = 10
            cooldown_ms = 1000

            [rate_limit]
            limit = 3
            window_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 50);
        // Unspecified fields keep their defaults
        assert_eq!(config.retry.max_delay_ms, 30_000);

        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.for_provider("backup").failure_threshold, 10);
        assert_eq!(config.breaker.for_provider("primary").failure_threshold, 2);

        assert_eq!(config.rate_limit.limit, 3);
        assert_eq!(config.rate_limit.window_ms, 500);
    }
}
