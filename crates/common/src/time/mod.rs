//! Wall-clock abstraction for testability
//!
//! Cache expiry and token expiry are both judged against wall-clock time.
//! Components take a [`Clock`] so tests can move time forward without
//! sleeping.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//!
//! use tether_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::at_millis(0);
//! clock.advance(Duration::from_millis(150));
//! assert_eq!(clock.now_millis(), 150);
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

/// Source of wall-clock time
pub trait Clock: Send + Sync + 'static {
    /// Milliseconds since the UNIX epoch
    fn now_millis(&self) -> i64;

    /// Current time as a UTC timestamp
    fn now_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_millis()).single().unwrap_or_else(Utc::now)
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient sharing
impl<T: Clock> Clock for Arc<T> {
    fn now_millis(&self) -> i64 {
        (**self).now_millis()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same time, so a clock handed to a component can be
/// advanced from the test.
#[derive(Debug, Clone)]
pub struct MockClock {
    millis: Arc<AtomicI64>,
}

impl MockClock {
    /// Create a mock clock frozen at the current system time
    pub fn new() -> Self {
        Self::at_millis(Utc::now().timestamp_millis())
    }

    /// Create a mock clock frozen at the given epoch milliseconds
    pub fn at_millis(millis: i64) -> Self {
        Self { millis: Arc::new(AtomicI64::new(millis)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        let delta = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.millis.fetch_add(delta, Ordering::SeqCst);
    }

    /// Set the mock clock to specific epoch milliseconds
    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for time abstractions.
    use super::*;

    /// Validates that clones of a `MockClock` observe the same time.
    ///
    /// Assertions:
    /// - Confirms advancing one handle moves the other.
    #[test]
    fn test_mock_clock_clones_share_time() {
        let clock = MockClock::at_millis(1_000);
        let shared = clock.clone();

        clock.advance(Duration::from_millis(500));
        assert_eq!(shared.now_millis(), 1_500);

        shared.set_millis(10);
        assert_eq!(clock.now_millis(), 10);
    }

    /// Validates `now_utc` derived from epoch milliseconds.
    #[test]
    fn test_mock_clock_utc() {
        let clock = MockClock::at_millis(86_400_000);
        assert_eq!(clock.now_utc().timestamp(), 86_400);
    }

    /// Validates the system clock is close to chrono's notion of now.
    #[test]
    fn test_system_clock_is_current() {
        let before = Utc::now().timestamp_millis();
        let now = SystemClock.now_millis();
        assert!(now >= before);
    }
}
