//! Single-consumer dispatch queue
//!
//! [`DispatchCore`] owns the whole submission pipeline: rate-limit check,
//! dedup check, FIFO queue, and the single consumer that drains it through
//! the [`Dispatcher`]. Admission is fast and concurrent; delivery is slow
//! and strictly serialized — one message completes its dispatch before the
//! next starts, which bounds concurrent load on providers and gives the
//! consumer exclusive ownership of breaker state.
//!
//! The consumer re-validates the ledger before dispatching each item, so
//! two submissions racing with the same id linearize: the first drives the
//! actual dispatch, the second resolves to the recorded outcome without any
//! provider contact, whichever order they were admitted in.
//!
//! The queue is unbounded; capping depth and rejecting with backpressure is
//! an extension point, not reference behavior.

use std::sync::atomic::{AtomicUsize, Ordering};

use courier_common::{DispatchOutcome, Message, Signal, incoming, internal};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::{
    config::DispatchConfig,
    dispatcher::Dispatcher,
    error::QueueError,
    ledger::Ledger,
    provider::ProviderEntry,
    rate_limiter::RateLimiter,
};

/// A queued submission: the message and the handle its outcome is reported
/// through. Destroyed once the outcome is signalled.
#[derive(Debug)]
struct QueueItem {
    message: Message,
    reply: oneshot::Sender<DispatchOutcome>,
}

/// The consumer stopped before an outcome was established for this
/// submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("dispatch core stopped before an outcome was recorded")]
pub struct CoreStopped;

/// Caller-side handle for an eventual [`DispatchOutcome`].
///
/// Dropping the handle does not cancel dispatch: delivery always runs to
/// completion and is recorded, since the ledger benefits future duplicate
/// submissions.
#[derive(Debug)]
pub struct OutcomeHandle {
    rx: oneshot::Receiver<DispatchOutcome>,
}

impl OutcomeHandle {
    /// Wait for the outcome of the submission.
    ///
    /// # Errors
    ///
    /// Returns [`CoreStopped`] if the core shut down with this submission
    /// still queued.
    pub async fn outcome(self) -> Result<DispatchOutcome, CoreStopped> {
        self.rx.await.map_err(|_| CoreStopped)
    }
}

/// The dispatch core: admission pipeline plus the serialized consumer.
///
/// Construct once at startup, share behind an `Arc`, and spawn
/// [`DispatchCore::serve`] as the consumer task.
#[derive(Debug)]
pub struct DispatchCore {
    dispatcher: Dispatcher,
    limiter: RateLimiter,
    ledger: Ledger,
    queue_tx: mpsc::UnboundedSender<QueueItem>,
    queue_rx: parking_lot::Mutex<Option<mpsc::UnboundedReceiver<QueueItem>>>,
    depth: AtomicUsize,
}

impl DispatchCore {
    /// Build a core from configuration and a priority-ordered provider
    /// chain.
    #[must_use]
    pub fn new(config: DispatchConfig, providers: Vec<ProviderEntry>) -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();

        Self {
            dispatcher: Dispatcher::new(providers, config.retry),
            limiter: RateLimiter::new(config.rate_limit),
            ledger: Ledger::new(),
            queue_tx,
            queue_rx: parking_lot::Mutex::new(Some(queue_rx)),
            depth: AtomicUsize::new(0),
        }
    }

    /// Submit a message on behalf of a client key.
    ///
    /// Admission runs inline: a rate-limited submission resolves to
    /// `RateLimited` without entering the queue, and a message whose id is
    /// already recorded resolves to the recorded outcome with no provider
    /// contact. Everything else is enqueued FIFO.
    pub fn submit(&self, client_key: &str, message: Message) -> OutcomeHandle {
        let (reply, rx) = oneshot::channel();

        if !self.limiter.try_admit(client_key) {
            incoming!(
                level = DEBUG,
                "Submission {} from {client_key} rejected by rate limiter",
                message.id
            );
            let _ = reply.send(DispatchOutcome::RateLimited);
            return OutcomeHandle { rx };
        }

        if let Some(existing) = self.ledger.lookup(&message.id) {
            incoming!(
                level = DEBUG,
                "Submission {} is a duplicate, resolving with recorded outcome",
                message.id
            );
            let _ = reply.send(existing);
            return OutcomeHandle { rx };
        }

        incoming!(level = DEBUG, "Submission {} admitted", message.id);
        self.depth.fetch_add(1, Ordering::SeqCst);
        if self
            .queue_tx
            .send(QueueItem { message, reply })
            .is_err()
        {
            // Consumer gone; the item (and its reply sender) is dropped and
            // the handle reports CoreStopped.
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }

        OutcomeHandle { rx }
    }

    /// Run the consumer until shutdown.
    ///
    /// Drains the queue strictly in submission order, one item fully
    /// dispatched before the next. On a [`Signal::Shutdown`] the in-flight
    /// item completes (and its outcome is recorded) before the loop exits;
    /// items still queued have their handles dropped.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::AlreadyServing`] if a consumer already took
    /// the queue.
    pub async fn serve(
        &self,
        mut shutdown: broadcast::Receiver<Signal>,
    ) -> Result<(), QueueError> {
        let Some(mut queue_rx) = self.queue_rx.lock().take() else {
            return Err(QueueError::AlreadyServing);
        };

        internal!(level = INFO, "Dispatch consumer starting");

        loop {
            tokio::select! {
                item = queue_rx.recv() => {
                    match item {
                        Some(item) => self.process_item(item).await,
                        // All senders dropped; nothing more will arrive
                        None => break,
                    }
                }
                signal = shutdown.recv() => {
                    match signal {
                        Ok(Signal::Shutdown) => {
                            internal!(level = INFO, "Dispatch consumer received shutdown signal");
                        }
                        Err(error) => {
                            tracing::error!("Dispatch consumer shutdown channel error: {error}");
                        }
                    }
                    break;
                }
            }
        }

        internal!(level = INFO, "Dispatch consumer stopped");
        Ok(())
    }

    /// Process one queued submission to completion.
    async fn process_item(&self, item: QueueItem) {
        self.depth.fetch_sub(1, Ordering::SeqCst);

        // Re-validate the ledger: a duplicate of this id may have been
        // admitted ahead of us and recorded its outcome already.
        if let Some(existing) = self.ledger.lookup(&item.message.id) {
            let _ = item.reply.send(existing);
            return;
        }

        let outcome = self.dispatcher.dispatch(&item.message).await;

        // First writer wins; a losing write reports the recorded entry.
        let outcome = if self.ledger.record_if_absent(&item.message.id, outcome.clone()) {
            outcome
        } else {
            self.ledger.lookup(&item.message.id).unwrap_or(outcome)
        };

        // The caller may have abandoned the handle; the outcome stays
        // recorded either way.
        let _ = item.reply.send(outcome);
    }

    /// Number of submissions admitted but not yet processed.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// The idempotency ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// The client-facing rate limiter.
    #[must_use]
    pub const fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// The dispatcher and its provider chain.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
