//! Typed errors for delivery and queue operations.

use thiserror::Error;

/// Error returned by a provider transport for a single delivery attempt.
///
/// The core treats every variant uniformly as retryable: an attempt failure
/// feeds breaker and retry bookkeeping and is never surfaced to the caller
/// directly, only aggregated into a `Failed` outcome. Transports are assumed
/// to enforce their own timeouts.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Failed to reach the provider.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The provider refused the message.
    #[error("Message rejected: {0}")]
    Rejected(String),

    /// The provider did not respond in time.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The provider reported itself unavailable.
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// I/O error in the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the dispatch queue itself.
#[derive(Debug, Error)]
pub enum QueueError {
    /// `serve` was called while another consumer already holds the queue.
    #[error("dispatch queue is already being served")]
    AlreadyServing,
}
