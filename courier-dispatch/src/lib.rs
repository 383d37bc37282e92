//! Dispatch core for outbound messages
//!
//! This crate provides the pieces that turn a client submission into a
//! delivery through a chain of interchangeable providers:
//! - Per-client sliding-window rate limiting at admission
//! - An idempotency ledger deduplicating message ids
//! - A single-consumer dispatch queue serializing delivery
//! - Retry with exponential backoff and provider fallback
//! - A circuit breaker per provider to stop retry storms

mod circuit_breaker;
mod config;
mod dispatcher;
mod error;
mod ledger;
mod provider;
mod queue;
mod rate_limiter;
mod retry;
mod service;

// Re-export common types
pub use courier_common::{DispatchOutcome, Message, MessageError, Signal};

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, ProviderBreakerConfig,
};
pub use config::DispatchConfig;
pub use dispatcher::Dispatcher;
pub use error::{DeliveryError, QueueError};
pub use ledger::Ledger;
pub use provider::{ProviderEntry, ProviderTransport};
pub use queue::{CoreStopped, DispatchCore, OutcomeHandle};
pub use rate_limiter::{ClientRateLimit, RateLimitConfig, RateLimitStats, RateLimiter};
pub use retry::RetryPolicy;
pub use service::{DispatchQueryService, ProviderStats};
