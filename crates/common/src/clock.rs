//! Injectable time source.
//!
//! Suspension and warning expiry is evaluated at read time against
//! [`Clock::now`], so services take a clock instead of calling
//! `Utc::now()` directly. Production uses [`SystemClock`]; tests use
//! [`ManualClock`] and fast-forward it.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Shared, type-erased clock handle held by services.
pub type SharedClock = Arc<dyn Clock>;

/// Real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests.
///
/// Time only moves when [`ManualClock::advance`] or [`ManualClock::set`]
/// is called. Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start.timestamp_millis())),
        }
    }

    /// Create a clock frozen at 2025-01-01 00:00:00 UTC.
    #[must_use]
    pub fn from_recent() -> Self {
        Self::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        )
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
    }

    /// Jump to an absolute instant.
    pub fn set(&self, at: DateTime<Utc>) {
        self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.millis.load(Ordering::SeqCst);
        Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_frozen_until_advanced() {
        let clock = ManualClock::from_recent();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::days(7));
        assert_eq!(clock.now() - t0, Duration::days(7));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::from_recent();
        let other = clock.clone();
        clock.advance(Duration::hours(1));
        assert_eq!(clock.now(), other.now());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let a = SystemClock.now();
        let b = SystemClock.now();
        assert!(b >= a);
    }
}
