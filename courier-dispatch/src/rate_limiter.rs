//! Per-client sliding-window rate limiting
//!
//! Admission control for submissions: each client key gets an independent
//! trailing window of admission timestamps. A submission is admitted when,
//! after pruning timestamps older than the window, fewer than `limit`
//! admissions remain; otherwise it is rejected without mutating the window.
//!
//! Pruning is lazy, amortized over the admission checks themselves; there is
//! no background sweep. Windows are created on first use and never evicted,
//! so a deployment facing unbounded distinct client keys needs an external
//! expiry (periodic sweep or an LRU cap on key count) — a known scope
//! limitation of the reference behavior, not something this module bounds
//! silently.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Configuration for rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Default admissions allowed per client key within the window
    #[serde(default = "default_limit")]
    pub limit: u32,

    /// Length of the trailing window (milliseconds)
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Per-client overrides
    #[serde(default)]
    pub client_overrides: ahash::AHashMap<String, ClientRateLimit>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            window_ms: default_window_ms(),
            client_overrides: ahash::AHashMap::default(),
        }
    }
}

const fn default_limit() -> u32 {
    100
}

const fn default_window_ms() -> u64 {
    60_000
}

/// Per-client rate limit override.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClientRateLimit {
    /// Admissions allowed within the window for this client
    pub limit: u32,
    /// Window length for this client (milliseconds)
    pub window_ms: u64,
}

/// Trailing window of admission timestamps for one client key.
#[derive(Debug)]
struct AdmissionWindow {
    admitted: VecDeque<Instant>,
    limit: usize,
    window: Duration,
}

impl AdmissionWindow {
    fn new(limit: u32, window_ms: u64) -> Self {
        Self {
            admitted: VecDeque::new(),
            limit: limit as usize,
            window: Duration::from_millis(window_ms),
        }
    }

    /// Drop timestamps that have aged out of the window.
    fn prune(&mut self, now: Instant) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= self.window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    /// Admit if capacity remains; rejection leaves the window unchanged.
    fn try_admit(&mut self, now: Instant) -> bool {
        self.prune(now);

        if self.admitted.len() >= self.limit {
            false
        } else {
            self.admitted.push_back(now);
            true
        }
    }
}

/// Per-client rate limiter.
///
/// Keys are independent; there is no global cap. Checks from concurrent
/// submission tasks synchronize per key, never through one global lock.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: DashMap<Arc<str>, Arc<Mutex<AdmissionWindow>>>,
}

impl RateLimiter {
    /// Create a rate limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: DashMap::new(),
        }
    }

    /// Get or create the window for a client key.
    fn window_for(&self, key: &str) -> Arc<Mutex<AdmissionWindow>> {
        if let Some(window) = self.windows.get(key) {
            return window.clone();
        }

        self.windows
            .entry(Arc::from(key))
            .or_insert_with(|| {
                let (limit, window_ms) = self.config.client_overrides.get(key).map_or(
                    (self.config.limit, self.config.window_ms),
                    |o| (o.limit, o.window_ms),
                );
                Arc::new(Mutex::new(AdmissionWindow::new(limit, window_ms)))
            })
            .clone()
    }

    /// Check whether a submission from this client key is admitted.
    ///
    /// Admission records the current instant against the key; rejection
    /// leaves the window untouched.
    pub fn try_admit(&self, key: &str) -> bool {
        let window = self.window_for(key);
        let admitted = window.lock().try_admit(Instant::now());

        if !admitted {
            tracing::debug!(client = %key, "Rate limit exceeded, rejecting submission");
        }

        admitted
    }

    /// Current window occupancy for a client key (for status surfaces).
    ///
    /// Returns `None` for a key that has never submitted.
    #[must_use]
    pub fn stats(&self, key: &str) -> Option<RateLimitStats> {
        self.windows.get(key).map(|window| {
            let mut window = window.lock();
            window.prune(Instant::now());
            RateLimitStats {
                current: window.admitted.len(),
                limit: window.limit,
                window: window.window,
            }
        })
    }
}

/// Statistics for one client's window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    /// Admissions currently inside the window
    pub current: usize,
    /// Maximum admissions per window
    pub limit: usize,
    /// Window length
    pub window: Duration,
}
