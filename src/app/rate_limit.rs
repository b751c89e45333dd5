use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

/// Expired keys are swept once every this many checks.
const SWEEP_EVERY: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: usize },
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Per-caller request counter. Injected into the router so a shared store can
/// replace the in-memory one when the service runs on several hosts.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Records one request for `key` at `now` unless the caller is over the limit.
    async fn check(&self, key: &str, now: Instant) -> RateDecision;
}

/// In-memory sliding window: at most `max_requests` per `window` per key.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: usize,
    state: Mutex<LimiterState>,
}

#[derive(Debug, Default)]
struct LimiterState {
    hits: HashMap<String, VecDeque<Instant>>,
    checks: u64,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests: max_requests.max(1),
            state: Mutex::new(LimiterState::default()),
        }
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut state = self.lock();

        state.checks = state.checks.wrapping_add(1);
        if state.checks % SWEEP_EVERY == 0 {
            let window = self.window;
            state.hits.retain(|_, hits| {
                prune(hits, now, window);
                !hits.is_empty()
            });
        }

        let hits = state.hits.entry(key.to_owned()).or_default();
        prune(hits, now, self.window);

        if hits.len() >= self.max_requests {
            let retry_after = hits
                .front()
                .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
                .unwrap_or(self.window);
            return RateDecision::Limited { retry_after };
        }

        hits.push_back(now);
        RateDecision::Allowed {
            remaining: self.max_requests - hits.len(),
        }
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.lock().hits.len()
    }

    fn lock(&self) -> MutexGuard<'_, LimiterState> {
        // A panic while holding the lock leaves the counters usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RateLimitStore for SlidingWindowLimiter {
    async fn check(&self, key: &str, now: Instant) -> RateDecision {
        self.check_at(key, now)
    }
}

fn prune(hits: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = hits.front() {
        if now.saturating_duration_since(*oldest) < window {
            break;
        }
        hits.pop_front();
    }
}
