//! Cooperative rate limiting for outbound collaborator calls.
//!
//! Both throttles are shared across runs: concurrent runs hitting the same
//! domain (or the same search provider) serialize on it, runs touching
//! different domains do not.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

// ─────────────────────────────────────────────────────────────────────────────
// Per-Domain Throttle
// ─────────────────────────────────────────────────────────────────────────────

/// Enforces a minimum interval between requests to the same domain.
///
/// The last-request map is global to the process, not per-run.
#[derive(Debug)]
pub struct DomainThrottle {
    min_delay: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl DomainThrottle {
    /// Create a throttle with the given minimum inter-request interval.
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until a request to `domain` is allowed, reserving the slot.
    ///
    /// Concurrent callers for one domain are granted successive slots one
    /// `min_delay` apart; other domains proceed immediately.
    pub async fn acquire(&self, domain: &str) {
        let slot = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let slot = match last.get(domain) {
                Some(prev) => (*prev + self.min_delay).max(now),
                None => now,
            };
            last.insert(domain.to_string(), slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            tracing::debug!(domain, delay_ms = (slot - now).as_millis() as u64, "Throttling domain request");
            tokio::time::sleep_until(slot).await;
        }
    }
}

impl Default for DomainThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Single-Call Throttle
// ─────────────────────────────────────────────────────────────────────────────

/// Enforces a minimum interval between calls to a single collaborator.
#[derive(Debug)]
pub struct CallThrottle {
    min_delay: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl CallThrottle {
    /// Create a throttle with the given minimum interval.
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until the next call is allowed, reserving the slot.
    pub async fn acquire(&self) {
        let slot = {
            let mut last = self.last_call.lock();
            let now = Instant::now();
            let slot = match *last {
                Some(prev) => (prev + self.min_delay).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };

        let now = Instant::now();
        if slot > now {
            tokio::time::sleep_until(slot).await;
        }
    }
}

impl Default for CallThrottle {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
