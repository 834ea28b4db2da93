//! Per-identity request spacing.
//!
//! Uses `Mutex` from std — no external dependencies. Each proxy
//! identity has its own timer, so workers sharing an identity queue up
//! on its lock while workers on other identities proceed.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Enforces a minimum interval between grants per proxy identity.
///
/// [`acquire`](RateLimiter::acquire) blocks (sleeps, not spins) until
/// the identity's interval has elapsed since its last grant. The sleep
/// happens while holding the identity's lock, so concurrent callers on
/// the same identity are served in lock-acquisition order and each gets
/// a full interval of spacing. `std::sync::Mutex` makes no FIFO
/// guarantee, so when several callers arrive within one interval their
/// relative order is up to the OS; the spacing invariant holds
/// regardless.
pub struct RateLimiter {
    interval: Duration,
    last_grant: Vec<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter for `identities` proxy identities.
    pub fn new(interval: Duration, identities: usize) -> Self {
        Self {
            interval,
            last_grant: (0..identities.max(1)).map(|_| Mutex::new(None)).collect(),
        }
    }

    /// Block until a request slot for `identity` is available.
    pub fn acquire(&self, identity: usize) {
        let slot = &self.last_grant[identity % self.last_grant.len()];
        let mut last = slot.lock().expect("rate limiter lock poisoned");
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        *last = Some(Instant::now());
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
