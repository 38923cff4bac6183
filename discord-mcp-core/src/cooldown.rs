// ABOUTME: Per-user fixed-window rate limiter for sampling requests
// ABOUTME: Time comes from an injected Clock so tests can drive it by hand

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
    }
}

/// Tracks the last accepted request per user.
///
/// The table is never pruned; it lives as long as one enabled bridge.
pub struct CooldownTracker {
    window_ms: u64,
    clock: Arc<dyn Clock>,
    last_accepted: Mutex<HashMap<String, u64>>,
}

impl CooldownTracker {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
            clock,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Accept a request from `user_id` at the clock's current time
    pub fn try_acquire(&self, user_id: &str) -> bool {
        self.try_acquire_at(user_id, self.clock.now_millis())
    }

    /// Accept a request from `user_id` at `now_ms` if the window has passed.
    /// A rejected request leaves the recorded time unchanged.
    pub fn try_acquire_at(&self, user_id: &str, now_ms: u64) -> bool {
        let mut table = self
            .last_accepted
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let last = table.get(user_id).copied().unwrap_or(0);
        if now_ms.saturating_sub(last) < self.window_ms {
            return false;
        }
        table.insert(user_id.to_string(), now_ms);
        true
    }

    /// Number of users with a recorded request
    pub fn tracked_users(&self) -> usize {
        self.last_accepted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    const T: u64 = 1_700_000_000_000;
    const W: u64 = 2_000;

    fn tracker() -> CooldownTracker {
        CooldownTracker::new(Duration::from_millis(W), Arc::new(SystemClock))
    }

    #[test]
    fn test_first_request_accepted() {
        assert!(tracker().try_acquire_at("u1", T));
    }

    #[test]
    fn test_request_inside_window_throttled() {
        let tracker = tracker();
        assert!(tracker.try_acquire_at("u1", T));
        assert!(!tracker.try_acquire_at("u1", T + W - 1));
    }

    #[test]
    fn test_request_at_window_edge_accepted() {
        let tracker = tracker();
        assert!(tracker.try_acquire_at("u1", T));
        assert!(tracker.try_acquire_at("u1", T + W));
    }

    #[test]
    fn test_rejection_does_not_extend_window() {
        let tracker = tracker();
        assert!(tracker.try_acquire_at("u1", T));
        assert!(!tracker.try_acquire_at("u1", T + W / 2));
        // Window still measured from the accepted request
        assert!(tracker.try_acquire_at("u1", T + W));
    }

    #[test]
    fn test_users_are_independent() {
        let tracker = tracker();
        assert!(tracker.try_acquire_at("u1", T));
        assert!(tracker.try_acquire_at("u2", T + 1));
        assert!(!tracker.try_acquire_at("u1", T + 2));
        assert_eq!(tracker.tracked_users(), 2);
    }

    #[test]
    fn test_zero_window_never_throttles() {
        let tracker = CooldownTracker::new(Duration::ZERO, Arc::new(SystemClock));
        assert!(tracker.try_acquire_at("u1", T));
        assert!(tracker.try_acquire_at("u1", T));
    }

    #[test]
    fn test_clock_going_backwards_is_throttled() {
        let tracker = tracker();
        assert!(tracker.try_acquire_at("u1", T));
        assert!(!tracker.try_acquire_at("u1", T - 10_000));
    }

    #[test]
    fn test_try_acquire_uses_injected_clock() {
        let clock = Arc::new(ManualClock::new(T));
        let tracker = CooldownTracker::new(Duration::from_millis(W), clock.clone());

        assert!(tracker.try_acquire("u1"));
        clock.advance(Duration::from_millis(W - 1));
        assert!(!tracker.try_acquire("u1"));
        clock.advance(Duration::from_millis(1));
        assert!(tracker.try_acquire("u1"));
    }

    #[test]
    fn test_system_clock_is_recent() {
        // 2023-01-01 in millis
        assert!(SystemClock.now_millis() > 1_672_531_200_000);
    }
}
