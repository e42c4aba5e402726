//! Request Admission Control
//!
//! Fixed-window limiter in front of the generative backend. The free tier
//! allows roughly 1.8 requests per minute, so the default admits one request
//! per 60 second window.
//!
//! ## Window rule
//!
//! ```text
//! now - window_start >= period  =>  window_start = now, count = 0
//! admit                         <=> count + in_flight < limit
//! ```
//!
//! The window rolls lazily on every call, so a query after a long idle period
//! always admits. Callers that perform a network exchange between the check
//! and the commit use [`RateLimiter::try_reserve`], which holds the slot until
//! the [`AdmissionSlot`] is committed or dropped.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::constants::rate_limit as rl_constants;

/// Configuration for the admission window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests admitted per window
    pub limit: u32,
    /// Window length
    pub period: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            limit: rl_constants::MAX_REQUESTS_PER_WINDOW,
            period: Duration::from_millis(rl_constants::WINDOW_MS),
        }
    }
}

/// All mutable window state in a single struct so rollover and counting
/// happen under one lock
#[derive(Debug)]
struct RateWindow {
    window_start: Instant,
    count: u32,
    in_flight: u32,
}

impl RateWindow {
    fn roll(&mut self, now: Instant, period: Duration) {
        if now.saturating_duration_since(self.window_start) >= period {
            self.window_start = now;
            self.count = 0;
        }
    }

    fn used(&self) -> u32 {
        self.count.saturating_add(self.in_flight)
    }
}

/// Thread-safe fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    inner: Mutex<RateWindow>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimiterConfig::default())
    }
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(RateWindow {
                window_start: Instant::now(),
                count: 0,
                in_flight: 0,
            }),
        }
    }

    pub fn config(&self) -> RateLimiterConfig {
        self.config
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RateWindow> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether a request could be admitted right now
    pub fn can_admit(&self) -> bool {
        self.can_admit_at(Instant::now())
    }

    pub fn can_admit_at(&self, now: Instant) -> bool {
        let mut window = self.lock();
        window.roll(now, self.config.period);
        window.used() < self.config.limit
    }

    /// Count one admission against the current window
    pub fn record_admission(&self) {
        self.record_admission_at(Instant::now());
    }

    pub fn record_admission_at(&self, now: Instant) {
        let mut window = self.lock();
        window.roll(now, self.config.period);
        window.count = window.count.saturating_add(1);
        tracing::debug!(
            count = window.count,
            limit = self.config.limit,
            "Request admitted"
        );
    }

    /// Time until a request can be admitted (zero when one can be admitted now)
    pub fn wait_time(&self) -> Duration {
        self.wait_time_at(Instant::now())
    }

    pub fn wait_time_at(&self, now: Instant) -> Duration {
        let mut window = self.lock();
        window.roll(now, self.config.period);
        if window.used() < self.config.limit {
            Duration::ZERO
        } else {
            (window.window_start + self.config.period).saturating_duration_since(now)
        }
    }

    /// Admissions left in the current window, counting held reservations
    pub fn remaining(&self) -> u32 {
        self.remaining_at(Instant::now())
    }

    pub fn remaining_at(&self, now: Instant) -> u32 {
        let mut window = self.lock();
        window.roll(now, self.config.period);
        self.config.limit.saturating_sub(window.used())
    }

    /// Time until the current window ends, regardless of admission state
    pub fn window_reset_in(&self) -> Duration {
        self.window_reset_in_at(Instant::now())
    }

    pub fn window_reset_in_at(&self, now: Instant) -> Duration {
        let mut window = self.lock();
        window.roll(now, self.config.period);
        (window.window_start + self.config.period).saturating_duration_since(now)
    }

    /// Start a fresh window with no recorded admissions
    pub fn reset(&self) {
        let mut window = self.lock();
        window.window_start = Instant::now();
        window.count = 0;
        tracing::info!("Rate limiter manually reset");
    }

    /// Atomically check admission and hold the slot.
    ///
    /// On denial returns the wait until the window resets.
    pub fn try_reserve(&self) -> Result<AdmissionSlot<'_>, Duration> {
        self.try_reserve_at(Instant::now())
    }

    pub fn try_reserve_at(&self, now: Instant) -> Result<AdmissionSlot<'_>, Duration> {
        let mut window = self.lock();
        window.roll(now, self.config.period);
        if window.used() >= self.config.limit {
            let wait = (window.window_start + self.config.period).saturating_duration_since(now);
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Admission denied");
            return Err(wait);
        }
        window.in_flight += 1;
        Ok(AdmissionSlot {
            limiter: self,
            committed: false,
        })
    }
}

/// A held admission. Counts against [`RateLimiter::remaining`] until it is
/// committed (recorded as an admission) or dropped (released).
#[derive(Debug)]
#[must_use = "dropping the slot releases it immediately"]
pub struct AdmissionSlot<'a> {
    limiter: &'a RateLimiter,
    committed: bool,
}

impl AdmissionSlot<'_> {
    pub fn commit(self) {
        self.commit_at(Instant::now());
    }

    pub fn commit_at(mut self, now: Instant) {
        let mut window = self.limiter.lock();
        window.in_flight = window.in_flight.saturating_sub(1);
        window.roll(now, self.limiter.config.period);
        window.count = window.count.saturating_add(1);
        self.committed = true;
    }
}

impl Drop for AdmissionSlot<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let mut window = self.limiter.lock();
            window.in_flight = window.in_flight.saturating_sub(1);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::{AtomicU32, Ordering};

    const MINUTE: Duration = Duration::from_millis(60_000);

    #[test]
    fn test_second_request_in_window_denied() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();

        assert!(limiter.can_admit_at(t0));
        limiter.record_admission_at(t0);
        assert!(!limiter.can_admit_at(t0 + Duration::from_millis(10)));
        assert_eq!(limiter.remaining_at(t0), 0);
    }

    #[test]
    fn test_admits_after_window_elapsed() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        limiter.record_admission_at(t0);

        let later = t0 + MINUTE + Duration::from_millis(1);
        assert!(limiter.can_admit_at(later));
        assert_eq!(limiter.remaining_at(later), 1);
    }

    #[test]
    fn test_idle_period_always_admits() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        limiter.record_admission_at(t0);
        assert!(limiter.can_admit_at(t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn test_wait_time_bounds() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        assert_eq!(limiter.wait_time_at(t0), Duration::ZERO);

        limiter.record_admission_at(t0);
        let wait = limiter.wait_time_at(t0 + Duration::from_secs(20));
        assert!(wait > Duration::ZERO);
        assert!(wait <= MINUTE);
    }

    #[test]
    fn test_window_reset_in() {
        let limiter = RateLimiter::default();
        let t0 = Instant::now();
        limiter.record_admission_at(t0);
        let left = limiter.window_reset_in_at(t0 + Duration::from_secs(45));
        assert!(left <= Duration::from_secs(15));
    }

    #[test]
    fn test_reset_clears_window() {
        let limiter = RateLimiter::default();
        limiter.record_admission();
        assert!(!limiter.can_admit());
        limiter.reset();
        assert!(limiter.can_admit());
    }

    #[test]
    fn test_reservation_counts_until_released() {
        let limiter = RateLimiter::default();
        let slot = limiter.try_reserve().expect("first slot");
        assert_eq!(limiter.remaining(), 0);
        assert!(limiter.try_reserve().is_err());

        drop(slot);
        assert_eq!(limiter.remaining(), 1);
    }

    #[test]
    fn test_reservation_commit_records_admission() {
        let limiter = RateLimiter::default();
        limiter.try_reserve().expect("slot").commit();
        assert_eq!(limiter.remaining(), 0);
        assert!(limiter.wait_time() > Duration::ZERO);
    }

    #[test]
    fn test_higher_limit() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            limit: 3,
            period: MINUTE,
        });
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(limiter.can_admit_at(t0));
            limiter.record_admission_at(t0);
        }
        assert!(!limiter.can_admit_at(t0));
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_limit() {
        let limiter = RateLimiter::new(RateLimiterConfig {
            limit: 2,
            period: MINUTE,
        });
        let admitted = AtomicU32::new(0);
        let barrier = Barrier::new(16);

        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    barrier.wait();
                    if let Ok(slot) = limiter.try_reserve() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        slot.commit();
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.remaining(), 0);
    }
}
