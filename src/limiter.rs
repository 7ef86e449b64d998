//! Token-bucket admission limiter.
//!
//! The sole cross-call synchronization point of the consumer: every
//! processor invocation must take a token here before performing simulated
//! work. Tokens regenerate continuously at the configured rate, capped at
//! the burst capacity.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::PipelineError;

/// Shared admission gate, safe for concurrent use by many simultaneous
/// dispatch calls.
///
/// Admission order is determined by token availability alone; FIFO fairness
/// across queued callers is not guaranteed. Constructed once at startup and
/// shared through an `Arc`.
pub struct AdmissionLimiter {
    /// Tokens regenerated per second.
    rate: f64,
    /// Maximum tokens held in the bucket.
    burst: f64,
    bucket: Mutex<Bucket>,
}

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        self.last_refill = now;
    }
}

impl AdmissionLimiter {
    /// Create a limiter admitting `rate` tasks per second with an initial
    /// (and maximum) burst of `burst` tokens.
    ///
    /// # Panics
    ///
    /// Panics if `rate` is not positive or `burst` is zero; config
    /// validation rejects both before construction.
    pub fn new(rate: f64, burst: u32) -> Self {
        assert!(rate > 0.0, "admission rate must be positive");
        assert!(burst > 0, "admission burst must be positive");
        Self {
            rate,
            burst: f64::from(burst),
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last_refill: Instant::now(),
            }),
        }
    }

    /// Block the calling task until a token is available, consuming one on
    /// success.
    ///
    /// Fails with [`PipelineError::AdmissionCancelled`] when `deadline` has
    /// already elapsed, or when the next token cannot become available
    /// before it. No token is consumed on failure.
    pub async fn acquire(&self, deadline: Option<Instant>) -> Result<(), PipelineError> {
        loop {
            let now = Instant::now();
            if let Some(d) = deadline {
                if now >= d {
                    return Err(PipelineError::AdmissionCancelled);
                }
            }

            // The lock is held only to refill and take a token, never across
            // the wait below.
            let wait = {
                let mut bucket = self.bucket.lock().expect("limiter lock poisoned");
                bucket.refill(now, self.rate, self.burst);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate)
            };

            let wake = now + wait;
            if let Some(d) = deadline {
                // Fail fast: the token cannot arrive before the deadline.
                if wake > d {
                    return Err(PipelineError::AdmissionCancelled);
                }
            }
            tokio::time::sleep_until(wake).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::future::join_all;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn burst_is_admitted_instantly() {
        let limiter = AdmissionLimiter::new(1.0, 3);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire(None).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_regenerate_at_configured_rate() {
        let limiter = AdmissionLimiter::new(1.0, 1);
        limiter.acquire(None).await.unwrap();

        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        assert!(
            start.elapsed() >= Duration::from_secs(1),
            "second token arrived after {:?}",
            start.elapsed()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_fails_without_consuming_a_token() {
        let limiter = AdmissionLimiter::new(1.0, 1);
        let res = limiter.acquire(Some(Instant::now())).await;
        assert!(matches!(res, Err(PipelineError::AdmissionCancelled)));

        // The single burst token is still there.
        let start = Instant::now();
        limiter.acquire(None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_fast_when_token_cannot_arrive_before_deadline() {
        let limiter = AdmissionLimiter::new(1.0, 1);
        limiter.acquire(None).await.unwrap();

        // Next token needs ~1s; a 100ms deadline cannot be met.
        let start = Instant::now();
        let res = limiter
            .acquire(Some(Instant::now() + Duration::from_millis(100)))
            .await;
        assert!(matches!(res, Err(PipelineError::AdmissionCancelled)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_drain_at_rate() {
        let limiter = Arc::new(AdmissionLimiter::new(1.0, 2));
        let start = Instant::now();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move { limiter.acquire(None).await })
            })
            .collect();
        for res in join_all(handles).await {
            res.unwrap().unwrap();
        }

        // 2 burst tokens instantly, 3 more at one per second.
        assert!(
            start.elapsed() >= Duration::from_secs(3),
            "all five admitted after {:?}",
            start.elapsed()
        );
    }
}
