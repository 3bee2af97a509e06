//! Token bucket admission control.
//!
//! Each provider client owns one [`RateLimiter`]. Every outbound call must
//! take a token first; when the bucket is dry the caller sleeps until the
//! refill makes one available. The bucket sits behind an async mutex, so
//! concurrent callers serialize and a token is never spent twice.
//!
//! Time comes from an injectable [`Clock`] so tests can drive the refill
//! deterministically. The default [`TokioClock`] follows tokio's clock,
//! which also makes paused-time tests work without extra wiring.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::ProviderConfig;
use crate::error::ProviderError;

/// Shortest wait when the bucket is dry.
const MIN_WAIT: Duration = Duration::from_millis(100);

/// Source of the current time for refill accounting.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`tokio::time::Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Token bucket state.
///
/// `0 <= tokens <= capacity` holds after every operation, and
/// `last_refill` never moves backwards.
#[derive(Debug, Clone)]
pub struct RateBucket {
    tokens: f64,
    capacity: f64,
    refill_rate_per_second: f64,
    last_refill: Instant,
}

impl RateBucket {
    /// Creates a full bucket.
    #[must_use]
    pub fn new(capacity: f64, refill_rate_per_second: f64, now: Instant) -> Self {
        let capacity = capacity.max(1.0);
        Self {
            tokens: capacity,
            capacity,
            refill_rate_per_second: refill_rate_per_second.max(f64::MIN_POSITIVE),
            last_refill: now,
        }
    }

    /// Adds tokens for the time elapsed since the last refill.
    ///
    /// An instant earlier than the last refill adds nothing and leaves the
    /// timestamp untouched.
    pub fn refill(&mut self, now: Instant) {
        if now <= self.last_refill {
            return;
        }
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = elapsed
            .mul_add(self.refill_rate_per_second, self.tokens)
            .min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token if available.
    pub fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Time until one token is available, never less than 100ms.
    #[must_use]
    pub fn wait_time(&self) -> Duration {
        let secs = (1.0 - self.tokens).max(0.0) / self.refill_rate_per_second;
        Duration::from_secs_f64(secs.min(f64::from(u32::MAX))).max(MIN_WAIT)
    }

    /// Empties the bucket so the next admission waits a full refill interval.
    pub const fn drain(&mut self) {
        self.tokens = 0.0;
    }

    /// Tokens currently available.
    #[must_use]
    pub const fn tokens(&self) -> f64 {
        self.tokens
    }

    /// Bucket capacity.
    #[must_use]
    pub const fn capacity(&self) -> f64 {
        self.capacity
    }
}

/// Admission gate wrapping a [`RateBucket`].
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<RateBucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter around an existing bucket and clock.
    #[must_use]
    pub fn new(bucket: RateBucket, clock: Arc<dyn Clock>) -> Self {
        Self {
            bucket: Mutex::new(bucket),
            clock,
        }
    }

    /// Creates a full limiter from provider limits using [`TokioClock`].
    #[must_use]
    pub fn from_config(config: &ProviderConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock);
        let bucket = RateBucket::new(
            config.rate_limit_capacity,
            config.refill_rate_per_second,
            clock.now(),
        );
        Self::new(bucket, clock)
    }

    /// Waits until a token is available, then takes it.
    ///
    /// The bucket lock is held for the whole admission, including the
    /// sleep, so waiting callers are admitted one at a time in lock order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Cancelled`] if `cancel` fires while waiting.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        let mut bucket = self.bucket.lock().await;
        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            bucket.refill(self.clock.now());
            if bucket.try_take() {
                debug!(tokens = bucket.tokens(), "rate limiter admitted call");
                return Ok(());
            }

            let wait = bucket.wait_time();
            warn!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit reached, waiting for quota refresh"
            );
            tokio::select! {
                () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                () = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Empties the bucket after the back-end reported a rate limit.
    pub async fn drain(&self) {
        self.bucket.lock().await.drain();
    }

    /// Tokens currently available, after applying elapsed refill.
    pub async fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock().await;
        bucket.refill(self.clock.now());
        bucket.tokens()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex as StdMutex;

    /// Clock that only moves when told to.
    #[derive(Debug)]
    struct ManualClock {
        now: StdMutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: StdMutex::new(Instant::now()),
            }
        }

        fn advance(&self, by: Duration) {
            if let Ok(mut now) = self.now.lock() {
                *now += by;
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.now.lock().map_or_else(|e| *e.into_inner(), |n| *n)
        }
    }

    #[test]
    fn test_bucket_starts_full_and_takes() {
        let start = Instant::now();
        let mut bucket = RateBucket::new(2.0, 1.0, start);
        assert!(bucket.try_take());
        assert!(bucket.try_take());
        assert!(!bucket.try_take());
        assert!(bucket.tokens().abs() < f64::EPSILON);
    }

    #[test]
    fn test_refill_caps_at_capacity() {
        let start = Instant::now();
        let mut bucket = RateBucket::new(3.0, 10.0, start);
        bucket.drain();
        bucket.refill(start + Duration::from_secs(60));
        assert!((bucket.tokens() - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_refill_ignores_earlier_instants() {
        let start = Instant::now();
        let mut bucket = RateBucket::new(5.0, 1.0, start + Duration::from_secs(10));
        bucket.drain();
        bucket.refill(start);
        assert!(bucket.tokens().abs() < f64::EPSILON);
        bucket.refill(start + Duration::from_secs(12));
        assert!((bucket.tokens() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_wait_time_floor_and_rate() {
        let start = Instant::now();
        let mut bucket = RateBucket::new(10.0, 100.0 / 60.0, start);
        bucket.drain();
        let wait = bucket.wait_time();
        assert!((wait.as_secs_f64() - 0.6).abs() < 1e-6);

        let mut fast = RateBucket::new(10.0, 1000.0, start);
        fast.drain();
        assert_eq!(fast.wait_time(), MIN_WAIT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_for_refill() {
        let config = ProviderConfig::builder()
            .rate_limit_capacity(1.0)
            .refill_rate_per_second(0.5)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let limiter = RateLimiter::from_config(&config);
        let cancel = CancellationToken::new();

        let start = Instant::now();
        assert!(limiter.acquire(&cancel).await.is_ok());
        assert!(limiter.acquire(&cancel).await.is_ok());
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_never_double_spend() {
        let clock = Arc::new(ManualClock::new());
        let bucket = RateBucket::new(3.0, 0.001, clock.now());
        let limiter = Arc::new(RateLimiter::new(bucket, clock.clone()));
        let cancel = CancellationToken::new();

        let mut handles = Vec::new();
        for _ in 0..3 {
            let limiter = Arc::clone(&limiter);
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { limiter.acquire(&cancel).await }));
        }
        for handle in handles {
            assert!(matches!(handle.await, Ok(Ok(()))));
        }
        assert!(limiter.available().await < 1.0);

        // The manual clock never advances, so a fourth caller stays parked.
        let fourth = tokio::time::timeout(Duration::from_secs(5), limiter.acquire(&cancel)).await;
        assert!(fourth.is_err());

        clock.advance(Duration::from_secs(2000));
        assert!(limiter.acquire(&cancel).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_observes_cancellation() {
        let config = ProviderConfig::builder()
            .rate_limit_capacity(1.0)
            .refill_rate_per_second(0.001)
            .build()
            .unwrap_or_else(|_| unreachable!());
        let limiter = RateLimiter::from_config(&config);
        let cancel = CancellationToken::new();
        assert!(limiter.acquire(&cancel).await.is_ok());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        assert_eq!(
            limiter.acquire(&cancel).await,
            Err(ProviderError::Cancelled)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_empties_bucket() {
        let limiter = RateLimiter::from_config(&ProviderConfig::default());
        assert!(limiter.available().await >= 99.0);
        limiter.drain().await;
        assert!(limiter.available().await < 1.0);
    }

    proptest! {
        #[test]
        fn prop_tokens_stay_within_bounds(
            capacity in 1.0f64..50.0,
            rate in 0.01f64..20.0,
            steps in proptest::collection::vec((0u64..5_000, any::<bool>()), 0..64),
        ) {
            let start = Instant::now();
            let mut bucket = RateBucket::new(capacity, rate, start);
            let mut now = start;
            for (advance_ms, drain) in steps {
                now += Duration::from_millis(advance_ms);
                let before = bucket.tokens();
                bucket.refill(now);
                prop_assert!(bucket.tokens() >= before);
                if drain {
                    bucket.drain();
                }
                let before_take = bucket.tokens();
                if bucket.try_take() {
                    prop_assert!((before_take - bucket.tokens() - 1.0).abs() < 1e-9);
                }
                prop_assert!(bucket.tokens() >= 0.0);
                prop_assert!(bucket.tokens() <= bucket.capacity());
            }
        }
    }
}
