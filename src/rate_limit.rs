use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

const MULTIPLIER_FLOOR: f64 = 1.0;
const MULTIPLIER_CEIL: f64 = 10.0;
const SUCCESS_DECAY: f64 = 0.9;
const FAILURE_GROWTH: f64 = 1.5;

struct Bucket {
    capacity: f64,
    tokens: f64,
    /// Refill rate in tokens per second at multiplier 1.0.
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(limit: u32, window: Duration) -> Self {
        let capacity = limit.max(1) as f64;
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec: capacity / window.as_secs_f64(),
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant, multiplier: f64) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec / multiplier).min(self.capacity);
        self.last_refill = now;
    }

    /// Seconds until one token is available, at the current fill level.
    fn wait_for_one(&self, multiplier: f64) -> f64 {
        if self.tokens >= 1.0 {
            0.0
        } else {
            (1.0 - self.tokens) * multiplier / self.refill_per_sec
        }
    }
}

struct RateState {
    minute: Bucket,
    hour: Bucket,
    adaptive_multiplier: f64,
}

/// Process-wide request pacing: a per-minute and a per-hour token bucket,
/// both scaled by an adaptive multiplier that grows on upstream rate-limit
/// failures and decays on success.
pub struct RateLimiter {
    state: Mutex<RateState>,
}

impl RateLimiter {
    pub fn new(per_minute: u32, per_hour: u32) -> Self {
        Self {
            state: Mutex::new(RateState {
                minute: Bucket::new(per_minute, Duration::from_secs(60)),
                hour: Bucket::new(per_hour, Duration::from_secs(3600)),
                adaptive_multiplier: MULTIPLIER_FLOOR,
            }),
        }
    }

    /// Take one token from both buckets, sleeping until both have capacity.
    /// Cancellable: dropping the future while it sleeps releases nothing,
    /// because tokens are only taken once both buckets can pay.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock();
                let now = Instant::now();
                let multiplier = state.adaptive_multiplier;
                state.minute.refill(now, multiplier);
                state.hour.refill(now, multiplier);

                let wait = state
                    .minute
                    .wait_for_one(multiplier)
                    .max(state.hour.wait_for_one(multiplier));
                if wait <= 0.0 {
                    state.minute.tokens -= 1.0;
                    state.hour.tokens -= 1.0;
                    None
                } else {
                    Some(Duration::from_secs_f64(wait.min(60.0)))
                }
            };

            match wait {
                None => return,
                Some(d) => {
                    debug!(wait_ms = d.as_millis() as u64, "rate limit wait");
                    tokio::time::sleep(d).await;
                }
            }
        }
    }

    /// Seconds the next caller would wait right now; advisory, for
    /// RATE_LIMIT_EXCEEDED responses.
    pub fn current_wait_secs(&self) -> u64 {
        let mut state = self.state.lock();
        let now = Instant::now();
        let multiplier = state.adaptive_multiplier;
        state.minute.refill(now, multiplier);
        state.hour.refill(now, multiplier);
        state
            .minute
            .wait_for_one(multiplier)
            .max(state.hour.wait_for_one(multiplier))
            .ceil() as u64
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.adaptive_multiplier =
            (state.adaptive_multiplier * SUCCESS_DECAY).max(MULTIPLIER_FLOOR);
    }

    pub fn record_rate_limit_failure(&self) {
        let mut state = self.state.lock();
        state.adaptive_multiplier =
            (state.adaptive_multiplier * FAILURE_GROWTH).min(MULTIPLIER_CEIL);
        debug!(
            multiplier = state.adaptive_multiplier,
            "rate limit failure recorded"
        );
    }

    pub fn multiplier(&self) -> f64 {
        self.state.lock().adaptive_multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplier_growth_and_cap() {
        let limiter = RateLimiter::new(60, 3600);
        assert_eq!(limiter.multiplier(), 1.0);

        for _ in 0..10 {
            limiter.record_rate_limit_failure();
        }
        assert_eq!(limiter.multiplier(), 10.0);
    }

    #[test]
    fn test_multiplier_decay_and_floor() {
        let limiter = RateLimiter::new(60, 3600);
        limiter.record_rate_limit_failure();
        let raised = limiter.multiplier();
        assert!(raised > 1.0);

        limiter.record_success();
        assert!(limiter.multiplier() < raised);

        for _ in 0..100 {
            limiter.record_success();
        }
        assert_eq!(limiter.multiplier(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_burst_is_immediate() {
        let limiter = RateLimiter::new(10, 100);
        let started = Instant::now();
        for _ in 0..10 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_when_exhausted() {
        let limiter = RateLimiter::new(1, 100);
        limiter.acquire().await;

        let started = Instant::now();
        // Bucket is empty; the next token refills at 1/minute.
        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_secs(59));
    }

    #[test]
    fn test_current_wait_advisory() {
        let limiter = RateLimiter::new(60, 3600);
        assert_eq!(limiter.current_wait_secs(), 0);
    }
}
