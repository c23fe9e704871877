//! Clock abstraction for the channel's timers.
//!
//! Production code reads the system clock; tests drive a `ManualClock`
//! forward so idle-timeout and reconnect scenarios run instantly.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Instant;

    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

pub type SharedClock = Arc<dyn Clock>;

/// Timers never wait longer than this
pub const MAX_TIMER_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// `now + delay`, with `delay` capped at [`MAX_TIMER_DELAY`]
pub fn deadline(now: Instant, delay: Duration) -> Instant {
    let delay = delay.min(MAX_TIMER_DELAY);
    now.checked_add(delay).unwrap_or(now)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Logical clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn advance(&self, by: Duration) {
        self.offset_nanos
            .fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::SeqCst))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_only_moves_when_advanced() {
        let clock = ManualClock::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.elapsed_since(start), Duration::from_secs(5));
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_deadline_caps_huge_delays() {
        let now = Instant::now();
        assert_eq!(deadline(now, Duration::from_secs(3)), now + Duration::from_secs(3));
        assert_eq!(deadline(now, Duration::MAX), now + MAX_TIMER_DELAY);
        assert_eq!(
            deadline(now, Duration::from_secs(u64::MAX / 2)),
            now + MAX_TIMER_DELAY
        );
    }
}
