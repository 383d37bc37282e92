//! The terminal result of a dispatch, as recorded and as reported.
//!
//! Outcomes are values, not errors: rate limiting, duplicate detection, and
//! exhausted delivery are all expected conditions. An outcome is immutable
//! once recorded in the idempotency ledger.

use serde::{Deserialize, Serialize};

/// The outcome of dispatching a single message.
///
/// Serializes to the wire shape used by submission and status boundaries:
/// `{"status": "sent" | "failed" | "duplicate" | "rate_limited", ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Delivery succeeded through the named provider.
    Sent {
        /// Name of the provider that accepted the message.
        provider: String,
        /// Total delivery attempts made across all providers for this call.
        attempts: u32,
    },

    /// Every provider was skipped (breaker open) or exhausted its retries.
    Failed {
        /// Total delivery attempts made across all providers.
        attempts: u32,
    },

    /// The message id was already submitted. The core resolves duplicates to
    /// the recorded outcome; boundaries that want to surface the dedup hit
    /// itself report this variant.
    Duplicate,

    /// The submission was rejected by the client-facing rate limiter and
    /// never entered the queue.
    RateLimited,
}

impl DispatchOutcome {
    /// Whether the message was delivered.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    /// Delivery attempts made, where the outcome carries them.
    #[must_use]
    pub const fn attempts(&self) -> Option<u32> {
        match self {
            Self::Sent { attempts, .. } | Self::Failed { attempts } => Some(*attempts),
            Self::Duplicate | Self::RateLimited => None,
        }
    }
}
