//! Token Quota Accounting
//!
//! Tracks two ceilings for backend usage:
//!
//! - **Daily**: resets when the UTC calendar date changes
//! - **Minute**: resets when its 60 second window has elapsed
//!
//! Both ceilings are checked before any debit. Reservations taken with
//! [`QuotaTracker::try_reserve`] count against both ceilings until they are
//! committed or dropped, so concurrent callers cannot overdraw the quota
//! between the check and the exchange.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use crate::constants::quota as quota_constants;
use crate::types::ClientError;

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuotaConfig {
    pub daily_limit: u64,
    pub minute_limit: u64,
    pub minute_window: Duration,
    /// Daily utilization that triggers a one-shot warning
    pub warning_threshold: f64,
    /// Daily utilization that triggers a one-shot error log
    pub critical_threshold: f64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_limit: quota_constants::DAILY_LIMIT,
            minute_limit: quota_constants::MINUTE_LIMIT,
            minute_window: Duration::from_millis(quota_constants::MINUTE_WINDOW_MS),
            warning_threshold: quota_constants::WARNING_THRESHOLD,
            critical_threshold: quota_constants::CRITICAL_THRESHOLD,
        }
    }
}

/// Debit refused because a ceiling would be broken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "Quota exceeded: requested {requested}, remaining daily {remaining_daily}, remaining this minute {remaining_minute}"
)]
pub struct QuotaDenied {
    pub requested: u64,
    pub remaining_daily: u64,
    pub remaining_minute: u64,
}

impl From<QuotaDenied> for ClientError {
    fn from(denied: QuotaDenied) -> Self {
        ClientError::QuotaExceeded {
            requested: denied.requested,
            remaining_daily: denied.remaining_daily,
            remaining_minute: denied.remaining_minute,
        }
    }
}

// =============================================================================
// Quota State
// =============================================================================

#[derive(Debug)]
struct QuotaState {
    day: NaiveDate,
    daily_used: u64,
    minute_window_start: Instant,
    minute_used: u64,
    reserved: u64,
}

impl QuotaState {
    fn remaining_daily(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.daily_used.saturating_add(self.reserved))
    }

    fn remaining_minute(&self, limit: u64) -> u64 {
        limit.saturating_sub(self.minute_used.saturating_add(self.reserved))
    }
}

/// Thread-safe daily + per-minute token quota
#[derive(Debug)]
pub struct QuotaTracker {
    config: QuotaConfig,
    inner: Mutex<QuotaState>,
    warning_emitted: AtomicBool,
    critical_emitted: AtomicBool,
}

impl Default for QuotaTracker {
    fn default() -> Self {
        Self::new(QuotaConfig::default())
    }
}

impl QuotaTracker {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(QuotaState {
                day: Self::today(),
                daily_used: 0,
                minute_window_start: Instant::now(),
                minute_used: 0,
                reserved: 0,
            }),
            warning_emitted: AtomicBool::new(false),
            critical_emitted: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> QuotaConfig {
        self.config
    }

    /// Estimated quota units for a payload: one unit per three characters,
    /// rounded up
    pub fn estimate_units(payload: &str) -> u64 {
        (payload.chars().count() as u64).div_ceil(quota_constants::CHARS_PER_UNIT)
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// Lock the state and apply both rollover rules
    fn state_at(&self, now: Instant, today: NaiveDate) -> std::sync::MutexGuard<'_, QuotaState> {
        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if today != state.day {
            tracing::info!(
                previous = %state.day,
                used = state.daily_used,
                "Daily quota rolled over"
            );
            state.day = today;
            state.daily_used = 0;
            self.clear_threshold_flags();
        }
        if now.saturating_duration_since(state.minute_window_start) >= self.config.minute_window {
            state.minute_window_start = now;
            state.minute_used = 0;
        }
        state
    }

    fn denied(&self, state: &QuotaState, units: u64) -> QuotaDenied {
        QuotaDenied {
            requested: units,
            remaining_daily: state.remaining_daily(self.config.daily_limit),
            remaining_minute: state.remaining_minute(self.config.minute_limit),
        }
    }

    fn fits(&self, state: &QuotaState, units: u64) -> bool {
        units <= state.remaining_daily(self.config.daily_limit)
            && units <= state.remaining_minute(self.config.minute_limit)
    }

    /// Whether `units` fit under both ceilings. Never mutates usage.
    pub fn can_consume(&self, units: u64) -> bool {
        self.can_consume_at(units, Instant::now())
    }

    pub fn can_consume_at(&self, units: u64, now: Instant) -> bool {
        let state = self.state_at(now, Self::today());
        self.fits(&state, units)
    }

    /// Debit `units`, refusing a debit that would break either ceiling
    pub fn consume(&self, units: u64) -> Result<(), QuotaDenied> {
        self.consume_at(units, Instant::now())
    }

    pub fn consume_at(&self, units: u64, now: Instant) -> Result<(), QuotaDenied> {
        let mut state = self.state_at(now, Self::today());
        if !self.fits(&state, units) {
            return Err(self.denied(&state, units));
        }
        state.daily_used += units;
        state.minute_used += units;
        let daily_used = state.daily_used;
        drop(state);
        self.check_thresholds(daily_used);
        Ok(())
    }

    pub fn remaining_daily(&self) -> u64 {
        let state = self.state_at(Instant::now(), Self::today());
        state.remaining_daily(self.config.daily_limit)
    }

    pub fn remaining_minute(&self) -> u64 {
        self.remaining_minute_at(Instant::now())
    }

    pub fn remaining_minute_at(&self, now: Instant) -> u64 {
        let state = self.state_at(now, Self::today());
        state.remaining_minute(self.config.minute_limit)
    }

    /// Atomically check both ceilings and hold `units` against them
    pub fn try_reserve(&self, units: u64) -> Result<QuotaReservation<'_>, QuotaDenied> {
        self.try_reserve_at(units, Instant::now())
    }

    pub fn try_reserve_at(&self, units: u64, now: Instant) -> Result<QuotaReservation<'_>, QuotaDenied> {
        let mut state = self.state_at(now, Self::today());
        if !self.fits(&state, units) {
            return Err(self.denied(&state, units));
        }
        state.reserved += units;
        Ok(QuotaReservation {
            tracker: self,
            units,
            committed: false,
        })
    }

    /// Clear daily usage (normally done automatically at UTC midnight)
    pub fn reset_daily(&self) {
        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.day = Self::today();
        state.daily_used = 0;
        self.clear_threshold_flags();
        tracing::info!("Daily quota reset");
    }

    pub fn stats(&self) -> QuotaStats {
        let state = self.state_at(Instant::now(), Self::today());
        let utilization = if self.config.daily_limit > 0 {
            state.daily_used as f64 / self.config.daily_limit as f64
        } else {
            0.0
        };
        QuotaStats {
            daily_used: state.daily_used,
            daily_limit: self.config.daily_limit,
            minute_used: state.minute_used,
            minute_limit: self.config.minute_limit,
            reserved: state.reserved,
            utilization,
            is_warning: utilization >= self.config.warning_threshold,
            is_critical: utilization >= self.config.critical_threshold,
        }
    }

    fn clear_threshold_flags(&self) {
        self.warning_emitted.store(false, Ordering::Relaxed);
        self.critical_emitted.store(false, Ordering::Relaxed);
    }

    fn check_thresholds(&self, daily_used: u64) {
        if self.config.daily_limit == 0 {
            return;
        }
        let util = daily_used as f64 / self.config.daily_limit as f64;
        if util >= self.config.critical_threshold
            && !self.critical_emitted.swap(true, Ordering::Relaxed)
        {
            tracing::error!(
                used = daily_used,
                limit = self.config.daily_limit,
                "CRITICAL: Daily token quota at critical threshold"
            );
        } else if util >= self.config.warning_threshold
            && !self.warning_emitted.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                used = daily_used,
                limit = self.config.daily_limit,
                "Daily token quota approaching limit"
            );
        }
    }
}

/// Units held against both ceilings until committed (debited) or dropped
/// (released)
#[derive(Debug)]
#[must_use = "dropping the reservation releases it immediately"]
pub struct QuotaReservation<'a> {
    tracker: &'a QuotaTracker,
    units: u64,
    committed: bool,
}

impl QuotaReservation<'_> {
    pub fn units(&self) -> u64 {
        self.units
    }

    pub fn commit(mut self) {
        let daily_used = {
            let mut state = self.tracker.state_at(Instant::now(), QuotaTracker::today());
            state.reserved = state.reserved.saturating_sub(self.units);
            state.daily_used += self.units;
            state.minute_used += self.units;
            state.daily_used
        };
        self.committed = true;
        self.tracker.check_thresholds(daily_used);
    }
}

impl Drop for QuotaReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let mut state = self
                .tracker
                .inner
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            state.reserved = state.reserved.saturating_sub(self.units);
        }
    }
}

// =============================================================================
// Quota Statistics
// =============================================================================

#[derive(Debug, Clone)]
pub struct QuotaStats {
    pub daily_used: u64,
    pub daily_limit: u64,
    pub minute_used: u64,
    pub minute_limit: u64,
    pub reserved: u64,
    pub utilization: f64,
    pub is_warning: bool,
    pub is_critical: bool,
}

impl QuotaStats {
    pub fn summary(&self) -> String {
        format!(
            "Daily: {} / {} tokens ({:.1}%) | Minute: {} / {} tokens",
            self.daily_used,
            self.daily_limit,
            self.utilization * 100.0,
            self.minute_used,
            self.minute_limit
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicU32;

    fn roomy_minute() -> QuotaTracker {
        QuotaTracker::new(QuotaConfig {
            minute_limit: u64::MAX,
            ..Default::default()
        })
    }

    #[test]
    fn test_estimate_units() {
        assert_eq!(QuotaTracker::estimate_units(""), 0);
        assert_eq!(QuotaTracker::estimate_units("a"), 1);
        assert_eq!(QuotaTracker::estimate_units("abc"), 1);
        assert_eq!(QuotaTracker::estimate_units("abcd"), 2);
        assert_eq!(QuotaTracker::estimate_units(&"x".repeat(300)), 100);
    }

    #[test]
    fn test_estimate_counts_characters_not_bytes() {
        assert_eq!(QuotaTracker::estimate_units("ééé"), 1);
    }

    #[test]
    fn test_daily_ceiling_boundary_before_any_debit() {
        let tracker = roomy_minute();
        assert!(tracker.can_consume(2_000_000));
        assert!(!tracker.can_consume(2_000_001));
        assert_eq!(tracker.remaining_daily(), 2_000_000);
    }

    #[test]
    fn test_daily_ceiling_exhausted() {
        let tracker = roomy_minute();
        tracker.consume(2_000_000).unwrap();
        assert!(!tracker.can_consume(1));
        assert_eq!(tracker.remaining_daily(), 0);
    }

    #[test]
    fn test_minute_ceiling() {
        let tracker = QuotaTracker::default();
        let t0 = Instant::now();
        assert!(tracker.can_consume_at(123_999, t0));
        assert!(!tracker.can_consume_at(124_000, t0));

        tracker.consume_at(100_000, t0).unwrap();
        assert_eq!(tracker.remaining_minute_at(t0), 23_999);
        assert!(tracker.consume_at(30_000, t0).is_err());

        let next_minute = t0 + Duration::from_millis(60_000);
        assert!(tracker.can_consume_at(100_000, next_minute));
        assert_eq!(tracker.remaining_daily(), 1_900_000);
    }

    #[test]
    fn test_can_consume_does_not_mutate() {
        let tracker = QuotaTracker::default();
        for _ in 0..10 {
            assert!(tracker.can_consume(50_000));
        }
        assert_eq!(tracker.remaining_daily(), 2_000_000);
        assert_eq!(tracker.stats().minute_used, 0);
    }

    #[test]
    fn test_refused_debit_leaves_usage_unchanged() {
        let tracker = QuotaTracker::default();
        let err = tracker.consume(200_000).unwrap_err();
        assert_eq!(err.requested, 200_000);
        assert_eq!(err.remaining_minute, 123_999);
        assert_eq!(tracker.stats().daily_used, 0);
    }

    #[test]
    fn test_daily_rollover_on_date_change() {
        let tracker = roomy_minute();
        tracker.consume(1_500_000).unwrap();

        let tomorrow = QuotaTracker::today().succ_opt().unwrap();
        let state = tracker.state_at(Instant::now(), tomorrow);
        assert_eq!(state.daily_used, 0);
        assert_eq!(state.day, tomorrow);
    }

    #[test]
    fn test_reset_daily() {
        let tracker = roomy_minute();
        tracker.consume(2_000_000).unwrap();
        tracker.reset_daily();
        assert!(tracker.can_consume(1));
    }

    #[test]
    fn test_reservation_lifecycle() {
        let tracker = QuotaTracker::default();
        let held = tracker.try_reserve(100_000).unwrap();
        assert_eq!(held.units(), 100_000);
        assert!(!tracker.can_consume(30_000));

        drop(held);
        assert!(tracker.can_consume(30_000));

        tracker.try_reserve(1_000).unwrap().commit();
        let stats = tracker.stats();
        assert_eq!(stats.daily_used, 1_000);
        assert_eq!(stats.reserved, 0);
    }

    #[test]
    fn test_concurrent_reservations_never_overdraw() {
        let tracker = QuotaTracker::new(QuotaConfig {
            daily_limit: 1_000,
            minute_limit: 1_000,
            ..Default::default()
        });
        let granted = AtomicU32::new(0);
        let barrier = Barrier::new(12);

        std::thread::scope(|s| {
            for _ in 0..12 {
                s.spawn(|| {
                    barrier.wait();
                    if let Ok(reservation) = tracker.try_reserve(300) {
                        granted.fetch_add(1, Ordering::SeqCst);
                        reservation.commit();
                    }
                });
            }
        });

        assert_eq!(granted.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.stats().daily_used, 900);
    }

    #[test]
    fn test_stats_summary_and_thresholds() {
        let tracker = roomy_minute();
        tracker.consume(1_600_000).unwrap();
        let stats = tracker.stats();
        assert!(stats.is_warning);
        assert!(!stats.is_critical);
        assert_eq!(
            stats.summary(),
            "Daily: 1600000 / 2000000 tokens (80.0%) | Minute: 1600000 / 18446744073709551615 tokens"
        );

        tracker.consume(250_000).unwrap();
        assert!(tracker.stats().is_critical);
    }

    #[test]
    fn test_denied_converts_to_client_error() {
        let err: ClientError = QuotaDenied {
            requested: 5,
            remaining_daily: 4,
            remaining_minute: 3,
        }
        .into();
        assert!(matches!(
            err,
            ClientError::QuotaExceeded {
                requested: 5,
                remaining_daily: 4,
                remaining_minute: 3
            }
        ));
    }
}
