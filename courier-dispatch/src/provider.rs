//! Provider transport capability and fallback-chain entries.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use courier_common::Message;

use crate::{
    circuit_breaker::{CircuitBreaker, ProviderBreakerConfig},
    error::DeliveryError,
};

/// The delivery capability a provider supplies to the core.
///
/// Implementations own their connection handling and timeouts; the core
/// treats any returned error uniformly as a retryable attempt failure.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Attempt to deliver one message.
    ///
    /// # Errors
    ///
    /// Returns a [`DeliveryError`] describing why the attempt failed.
    async fn send(&self, message: &Message) -> Result<(), DeliveryError>;
}

/// One provider in the fallback chain: a name, its transport capability,
/// and the circuit breaker that guards it.
///
/// Entries are assembled at startup in priority order; the order is
/// configuration and is never mutated at runtime.
pub struct ProviderEntry {
    name: Arc<str>,
    transport: Arc<dyn ProviderTransport>,
    breaker: CircuitBreaker,
}

impl ProviderEntry {
    /// Create an entry with a breaker built from the given settings.
    #[must_use]
    pub fn new(
        name: impl Into<Arc<str>>,
        transport: Arc<dyn ProviderTransport>,
        breaker_config: &ProviderBreakerConfig,
    ) -> Self {
        let name = name.into();
        Self {
            breaker: CircuitBreaker::new(name.clone(), breaker_config),
            name,
            transport,
        }
    }

    /// The provider's configured name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The transport capability.
    #[must_use]
    pub fn transport(&self) -> &dyn ProviderTransport {
        self.transport.as_ref()
    }

    /// The breaker guarding this provider.
    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

impl fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}
