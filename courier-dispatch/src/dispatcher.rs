//! Retry-with-backoff dispatch over the provider fallback chain.
//!
//! Providers are tried in their fixed priority order. The breaker check
//! gates entry to a provider only: once a retry loop for a provider is in
//! flight it completes its own attempt budget even if the failures it
//! records trip that provider's breaker. Moving to the next provider
//! requires a fresh breaker check.

use courier_common::{DispatchOutcome, Message, outgoing};

use crate::{provider::ProviderEntry, retry::RetryPolicy};

/// Dispatches messages through the provider chain.
#[derive(Debug)]
pub struct Dispatcher {
    providers: Vec<ProviderEntry>,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Create a dispatcher over a fixed, priority-ordered provider chain.
    #[must_use]
    pub fn new(providers: Vec<ProviderEntry>, retry: RetryPolicy) -> Self {
        Self { providers, retry }
    }

    /// The provider chain, in priority order.
    #[must_use]
    pub fn providers(&self) -> &[ProviderEntry] {
        &self.providers
    }

    /// Dispatch a message, trying each provider in order with bounded
    /// backoff retries.
    ///
    /// `attempts` in the returned outcome counts actual delivery attempts
    /// made during this call, across all providers; skipped providers
    /// (breaker open) contribute nothing. An empty provider chain yields
    /// `Failed` with zero attempts.
    pub async fn dispatch(&self, message: &Message) -> DispatchOutcome {
        let mut total_attempts: u32 = 0;

        for provider in &self.providers {
            if !provider.breaker().should_allow() {
                tracing::debug!(
                    id = %message.id,
                    provider = provider.name(),
                    "Circuit open, skipping provider"
                );
                continue;
            }

            let mut attempts_here: u32 = 0;
            while self.retry.should_attempt(attempts_here) {
                attempts_here += 1;
                total_attempts += 1;

                let delay = self.retry.delay_before(attempts_here);
                if !delay.is_zero() {
                    // Non-blocking wait; holds no lock and does not stall
                    // admission of other submissions.
                    tokio::time::sleep(delay).await;
                }

                outgoing!(
                    level = DEBUG,
                    "Attempting delivery of {} via {} (attempt {attempts_here})",
                    message.id,
                    provider.name()
                );

                match provider.transport().send(message).await {
                    Ok(()) => {
                        provider.breaker().record_success();
                        tracing::info!(
                            id = %message.id,
                            provider = provider.name(),
                            attempts = total_attempts,
                            "Message delivered"
                        );
                        return DispatchOutcome::Sent {
                            provider: provider.name().to_owned(),
                            attempts: total_attempts,
                        };
                    }
                    Err(error) => {
                        provider.breaker().record_failure();
                        tracing::debug!(
                            id = %message.id,
                            provider = provider.name(),
                            attempt = attempts_here,
                            error = %error,
                            "Delivery attempt failed"
                        );
                    }
                }
            }

            tracing::debug!(
                id = %message.id,
                provider = provider.name(),
                attempts = attempts_here,
                "Provider exhausted, falling through"
            );
        }

        tracing::warn!(
            id = %message.id,
            attempts = total_attempts,
            "All providers skipped or exhausted"
        );
        DispatchOutcome::Failed {
            attempts: total_attempts,
        }
    }
}
