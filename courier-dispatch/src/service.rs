//! Read-only query surface for dispatch state
//!
//! Decouples status/control boundaries from the concrete [`DispatchCore`]:
//! an HTTP status endpoint or control socket depends on this trait, not on
//! the core, and can be handed a mock in tests.

use courier_common::DispatchOutcome;

use crate::{
    circuit_breaker::CircuitBreakerStats, queue::DispatchCore, rate_limiter::RateLimitStats,
};

/// Per-provider snapshot for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderStats {
    /// Provider name, as configured
    pub name: String,
    /// Current breaker state
    pub breaker: CircuitBreakerStats,
}

/// Service trait for querying dispatch state.
pub trait DispatchQueryService: Send + Sync {
    /// Recorded outcome for a message id.
    ///
    /// An unknown id is `None` — a not-found at the boundary, never an
    /// error.
    fn lookup(&self, id: &str) -> Option<DispatchOutcome>;

    /// Submissions admitted but not yet processed.
    fn queue_len(&self) -> usize;

    /// Breaker snapshots for every provider, in priority order.
    fn provider_stats(&self) -> Vec<ProviderStats>;

    /// Window occupancy for a client key, if the key has ever submitted.
    fn rate_limit_stats(&self, client_key: &str) -> Option<RateLimitStats>;
}

impl DispatchQueryService for DispatchCore {
    fn lookup(&self, id: &str) -> Option<DispatchOutcome> {
        self.ledger().lookup(id)
    }

    fn queue_len(&self) -> usize {
        DispatchCore::queue_len(self)
    }

    fn provider_stats(&self) -> Vec<ProviderStats> {
        self.dispatcher()
            .providers()
            .iter()
            .map(|provider| ProviderStats {
                name: provider.name().to_owned(),
                breaker: provider.breaker().stats(),
            })
            .collect()
    }

    fn rate_limit_stats(&self, client_key: &str) -> Option<RateLimitStats> {
        self.limiter().stats(client_key)
    }
}
