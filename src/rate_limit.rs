//! Per-client token bucket
//!
//! Tokens are refilled lazily from the elapsed time on every check, so no
//! timer is needed. Checks never wait: a call either consumes a token or is
//! rejected.

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket
    pub fn new(refill_per_sec: f64, burst: u32, now: Instant) -> Self {
        let capacity = f64::from(burst);
        Self {
            capacity,
            refill_per_sec,
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Consume one token if available
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Tokens currently available (after refilling up to `now`)
    #[cfg(test)]
    fn available(&mut self, now: Instant) -> f64 {
        self.refill(now);
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        // saturating: callers may pass an instant older than the last refill
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now.max(self.last_refill);
    }
}
