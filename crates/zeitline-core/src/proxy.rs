//! Proxy identity pool with failure-driven retirement

use std::sync::Mutex;

/// One outbound egress identity: a proxy gateway URL plus optional
/// credentials. `id` indexes into the rate limiter and the fetch
/// client's per-identity connection cache.
///
/// A `url` of `None` means a direct connection (no proxy) — used for
/// local testing and single-identity runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyIdentity {
    pub id: usize,
    pub url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ProxyIdentity {
    pub fn direct(id: usize) -> Self {
        Self {
            id,
            url: None,
            username: None,
            password: None,
        }
    }

    /// Short label for log lines (never includes credentials).
    pub fn label(&self) -> String {
        match &self.url {
            Some(url) => format!("proxy#{} ({url})", self.id),
            None => format!("proxy#{} (direct)", self.id),
        }
    }
}

/// No viable identity remains in the pool. Fatal for the owning worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted;

impl std::fmt::Display for PoolExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "no proxy identity left in rotation")
    }
}

impl std::error::Error for PoolExhausted {}

struct Slot {
    identity: ProxyIdentity,
    consecutive_failures: u32,
    retired: bool,
}

/// Round-robin rotation over a pool of proxy identities.
///
/// [`report`](ProxyRotator::report) tracks consecutive failures per
/// identity; an identity crossing `retire_after` is removed from
/// rotation for the rest of the run. Shared across all workers.
pub struct ProxyRotator {
    slots: Mutex<Vec<Slot>>,
    cursor: Mutex<usize>,
    retire_after: u32,
}

impl ProxyRotator {
    /// Build a pool. An empty identity list degrades to one direct
    /// connection so the rotation/retirement machinery still applies.
    pub fn new(identities: Vec<ProxyIdentity>, retire_after: u32) -> Self {
        let identities = if identities.is_empty() {
            vec![ProxyIdentity::direct(0)]
        } else {
            identities
        };
        Self {
            slots: Mutex::new(
                identities
                    .into_iter()
                    .map(|identity| Slot {
                        identity,
                        consecutive_failures: 0,
                        retired: false,
                    })
                    .collect(),
            ),
            cursor: Mutex::new(0),
            retire_after,
        }
    }

    /// Select the next non-retired identity, round-robin.
    pub fn next(&self) -> Result<ProxyIdentity, PoolExhausted> {
        let slots = self.slots.lock().expect("proxy pool lock poisoned");
        let mut cursor = self.cursor.lock().expect("proxy cursor lock poisoned");
        let n = slots.len();
        for step in 0..n {
            let idx = (*cursor + step) % n;
            if !slots[idx].retired {
                *cursor = idx + 1;
                return Ok(slots[idx].identity.clone());
            }
        }
        Err(PoolExhausted)
    }

    /// Record a fetch outcome for `identity`. A success resets its
    /// failure counter; a failure increments it and retires the
    /// identity once the counter reaches the threshold.
    pub fn report(&self, identity: usize, success: bool) {
        let mut slots = self.slots.lock().expect("proxy pool lock poisoned");
        let Some(slot) = slots.iter_mut().find(|s| s.identity.id == identity) else {
            return;
        };
        if success {
            slot.consecutive_failures = 0;
        } else if !slot.retired {
            slot.consecutive_failures += 1;
            if slot.consecutive_failures >= self.retire_after {
                slot.retired = true;
                log::warn!(
                    "{}: retired after {} consecutive failures",
                    slot.identity.label(),
                    slot.consecutive_failures
                );
            }
        }
    }

    /// Identities still in rotation.
    pub fn active_count(&self) -> usize {
        self.slots
            .lock()
            .expect("proxy pool lock poisoned")
            .iter()
            .filter(|s| !s.retired)
            .count()
    }

    /// Total pool size (retired included).
    pub fn pool_size(&self) -> usize {
        self.slots.lock().expect("proxy pool lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize, retire_after: u32) -> ProxyRotator {
        let ids = (0..n).map(ProxyIdentity::direct).collect();
        ProxyRotator::new(ids, retire_after)
    }

    #[test]
    fn round_robin_cycles() {
        let rotator = pool(3, 5);
        let picks: Vec<usize> = (0..6).map(|_| rotator.next().unwrap().id).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn empty_pool_gets_direct_identity() {
        let rotator = ProxyRotator::new(Vec::new(), 5);
        assert_eq!(rotator.pool_size(), 1);
        assert_eq!(rotator.next().unwrap().url, None);
    }

    #[test]
    fn retires_after_threshold() {
        let rotator = pool(2, 3);
        for _ in 0..3 {
            rotator.report(0, false);
        }
        assert_eq!(rotator.active_count(), 1);
        // Only identity 1 remains
        assert_eq!(rotator.next().unwrap().id, 1);
        assert_eq!(rotator.next().unwrap().id, 1);
    }

    #[test]
    fn success_resets_failure_counter() {
        let rotator = pool(1, 3);
        rotator.report(0, false);
        rotator.report(0, false);
        rotator.report(0, true);
        rotator.report(0, false);
        rotator.report(0, false);
        assert_eq!(rotator.active_count(), 1);
    }

    #[test]
    fn exhausted_pool_errors() {
        let rotator = pool(2, 1);
        rotator.report(0, false);
        rotator.report(1, false);
        assert_eq!(rotator.next(), Err(PoolExhausted));
    }

    #[test]
    fn retired_identity_never_returns() {
        let rotator = pool(2, 1);
        rotator.report(0, false);
        // Later successes do not resurrect a retired identity
        rotator.report(0, true);
        for _ in 0..4 {
            assert_eq!(rotator.next().unwrap().id, 1);
        }
    }
}
