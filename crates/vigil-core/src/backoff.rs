//! Exponential backoff schedule for reconnect loops.
//!
//! The bus subscription bridge and the feed client reconnect on the same
//! schedule: the delay doubles on every consecutive failure up to a cap,
//! and a successful connection resets the schedule to the base delay.

use std::time::Duration;

use crate::defaults;

/// Delay before reconnect attempt `attempt` (zero-based).
///
/// Computes `base * 2^attempt`, capped at `cap`. Saturates instead of
/// overflowing for large attempt counts.
pub fn backoff_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    let base_ms = base.as_millis() as u64;
    let cap_ms = cap.as_millis() as u64;
    let factor = 1u64 << attempt.min(63);
    Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
}

/// Stateful reconnect schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay to sleep before the next attempt, advancing the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = backoff_delay(self.base, self.cap, self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset the schedule after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Consecutive failed attempts recorded so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(defaults::RECONNECT_BASE_DELAY_MS),
            Duration::from_millis(defaults::RECONNECT_MAX_DELAY_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_until_cap() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);

        assert_eq!(backoff_delay(base, cap, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, cap, 1), Duration::from_secs(2));
        assert_eq!(backoff_delay(base, cap, 2), Duration::from_secs(4));
        assert_eq!(backoff_delay(base, cap, 3), Duration::from_secs(8));
        assert_eq!(backoff_delay(base, cap, 4), Duration::from_secs(16));
        // 32s would exceed the cap
        assert_eq!(backoff_delay(base, cap, 5), Duration::from_secs(30));
        assert_eq!(backoff_delay(base, cap, 6), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_saturates_for_large_attempts() {
        let base = Duration::from_secs(1);
        let cap = Duration::from_secs(30);

        assert_eq!(backoff_delay(base, cap, 63), cap);
        assert_eq!(backoff_delay(base, cap, 64), cap);
        assert_eq!(backoff_delay(base, cap, u32::MAX), cap);
    }

    #[test]
    fn test_schedule_advances_and_resets() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));

        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
        assert_eq!(backoff.next_delay(), Duration::from_secs(4));
        assert_eq!(backoff.attempt(), 3);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_schedule_uses_configured_bounds() {
        let mut backoff = Backoff::default();
        assert_eq!(
            backoff.next_delay(),
            Duration::from_millis(defaults::RECONNECT_BASE_DELAY_MS)
        );

        for _ in 0..20 {
            backoff.next_delay();
        }
        assert_eq!(
            backoff.next_delay(),
            Duration::from_millis(defaults::RECONNECT_MAX_DELAY_MS)
        );
    }
}
