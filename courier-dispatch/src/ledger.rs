//! Idempotency ledger
//!
//! Maps message id to its recorded [`DispatchOutcome`]. An entry is written
//! at most once per id for the lifetime of the process: the first writer
//! wins and later writes are refused, so a resubmitted id short-circuits to
//! the original outcome without any provider contact.
//!
//! Entries are never evicted. Bounding ledger memory (TTL sweep, LRU cap)
//! is left to an external policy; callers relying on bounded memory must
//! add their own expiry.

use courier_common::DispatchOutcome;
use dashmap::{DashMap, mapref::entry::Entry};

/// Append-once map of message id to recorded outcome.
#[derive(Debug, Default)]
pub struct Ledger {
    entries: DashMap<String, DispatchOutcome>,
}

impl Ledger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the recorded outcome for a message id.
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<DispatchOutcome> {
        self.entries.get(id).map(|entry| entry.value().clone())
    }

    /// Record an outcome for an id unless one already exists.
    ///
    /// Returns `true` if this call established the entry, `false` if an
    /// entry was already present. A `false` return means the caller must
    /// discard its outcome and report the existing one instead.
    pub fn record_if_absent(&self, id: &str, outcome: DispatchOutcome) -> bool {
        match self.entries.entry(id.to_owned()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(outcome);
                true
            }
        }
    }

    /// Number of recorded outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any outcome has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
