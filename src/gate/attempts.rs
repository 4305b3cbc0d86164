//! Per-address login attempt throttling.
//!
//! Sliding 10-minute window, at most 20 attempts per client address. The
//! counter is consumed by every evaluated login — including the one that
//! eventually succeeds — and the cap check happens *before* the increment,
//! so callers pair [`AttemptTracker::check`] with a later
//! [`AttemptTracker::record`]. The tracker is approximate: concurrent logins
//! racing on one address may lose an update, which a soft anti-brute-force
//! heuristic tolerates.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use super::Clock;

/// Attempt window length.
pub const WINDOW_SECS: u64 = 10 * 60;
/// Maximum attempts per address within one window.
pub const MAX_ATTEMPTS: u32 = 20;

#[derive(Clone, Copy, Debug)]
struct AttemptWindow {
    count: u32,
    window_start: u64,
}

/// Tracks login attempts per client address for the process lifetime.
pub struct AttemptTracker {
    max_attempts: u32,
    window_secs: u64,
    clock: Arc<dyn Clock>,
    windows: Mutex<HashMap<String, AttemptWindow>>,
}

impl AttemptTracker {
    pub fn new(max_attempts: u32, window_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_attempts,
            window_secs,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` if `addr` may attempt a login right now.
    ///
    /// Resets the window first when it has gone stale. Does not count the
    /// attempt; call [`record`](Self::record) once the login was evaluated.
    pub fn check(&self, addr: &str) -> bool {
        let now = self.clock.now_epoch_secs();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let window = windows
            .entry(addr.to_owned())
            .or_insert(AttemptWindow {
                count: 0,
                window_start: now,
            });
        if now.saturating_sub(window.window_start) > self.window_secs {
            window.count = 0;
            window.window_start = now;
        }
        window.count < self.max_attempts
    }

    /// Count one evaluated attempt against `addr`.
    pub fn record(&self, addr: &str) {
        let now = self.clock.now_epoch_secs();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let window = windows
            .entry(addr.to_owned())
            .or_insert(AttemptWindow {
                count: 0,
                window_start: now,
            });
        if now.saturating_sub(window.window_start) > self.window_secs {
            window.count = 0;
            window.window_start = now;
        }
        window.count += 1;
    }

    /// Drop entries whose window expired. Throttling behavior inside a live
    /// window is unaffected; this only bounds the map for long-running
    /// processes.
    pub fn sweep_stale(&self) {
        let now = self.clock.now_epoch_secs();
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        windows.retain(|_, window| now.saturating_sub(window.window_start) <= self.window_secs);
    }

    #[cfg(test)]
    fn tracked_addresses(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::testutil::ManualClock;

    fn tracker_at(now: u64) -> (AttemptTracker, Arc<ManualClock>) {
        let clock = ManualClock::new(now);
        (
            AttemptTracker::new(MAX_ATTEMPTS, WINDOW_SECS, clock.clone()),
            clock,
        )
    }

    #[test]
    fn fresh_address_is_allowed() {
        let (tracker, _clock) = tracker_at(0);
        assert!(tracker.check("10.0.0.1"));
    }

    #[test]
    fn check_alone_never_consumes_quota() {
        let (tracker, _clock) = tracker_at(0);
        for _ in 0..100 {
            assert!(tracker.check("10.0.0.1"));
        }
    }

    #[test]
    fn cap_blocks_the_twenty_first_attempt() {
        let (tracker, _clock) = tracker_at(0);
        for _ in 0..MAX_ATTEMPTS {
            assert!(tracker.check("10.0.0.1"));
            tracker.record("10.0.0.1");
        }
        assert!(!tracker.check("10.0.0.1"));
    }

    #[test]
    fn addresses_are_throttled_independently() {
        let (tracker, _clock) = tracker_at(0);
        for _ in 0..MAX_ATTEMPTS {
            tracker.record("10.0.0.1");
        }
        assert!(!tracker.check("10.0.0.1"));
        assert!(tracker.check("10.0.0.2"));
    }

    #[test]
    fn window_resets_after_ten_minutes() {
        let (tracker, clock) = tracker_at(0);
        for _ in 0..MAX_ATTEMPTS {
            tracker.record("10.0.0.1");
        }
        assert!(!tracker.check("10.0.0.1"));

        // Still inside the window one second before it lapses.
        clock.set(WINDOW_SECS);
        assert!(!tracker.check("10.0.0.1"));

        clock.set(WINDOW_SECS + 1);
        assert!(tracker.check("10.0.0.1"));
    }

    #[test]
    fn record_after_stale_window_starts_a_fresh_count() {
        let (tracker, clock) = tracker_at(0);
        for _ in 0..MAX_ATTEMPTS {
            tracker.record("10.0.0.1");
        }
        clock.set(WINDOW_SECS + 1);
        tracker.record("10.0.0.1");
        assert!(tracker.check("10.0.0.1"));
    }

    #[test]
    fn sweep_removes_only_stale_entries() {
        let (tracker, clock) = tracker_at(0);
        tracker.record("10.0.0.1");
        clock.set(WINDOW_SECS - 10);
        tracker.record("10.0.0.2");
        clock.set(WINDOW_SECS + 1);
        tracker.sweep_stale();
        assert_eq!(tracker.tracked_addresses(), 1);
        // The surviving entry keeps its live-window quota.
        assert!(tracker.check("10.0.0.2"));
    }
}
