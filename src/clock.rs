//! Time source abstraction for the scheduler and notification gate.
//!
//! All wall-clock reads and sleeps go through the [`Clock`] trait so the
//! retry and rate-limit logic can be exercised in tests with a virtual
//! clock instead of real sleeps. Production code uses [`SystemClock`];
//! tests use [`FakeClock`] (behind the `testing-support` feature).

use std::time::Duration as StdDuration;

use chrono::NaiveDateTime;

/// Wall-clock time source. Times are timezone-naive local instants,
/// matching the arithmetic in the absence window calculator.
pub trait Clock {
    /// Current local time.
    fn now(&self) -> NaiveDateTime;

    /// Suspend the calling thread for `duration`.
    fn sleep(&self, duration: StdDuration);
}

/// Real local-time clock backed by `chrono::Local` and `thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn sleep(&self, duration: StdDuration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock for tests: `sleep` advances the stored instant
/// instead of suspending the thread, and every sleep is recorded so tests
/// can assert on retry spacing.
#[cfg(any(test, feature = "testing-support"))]
pub use fake::FakeClock;

#[cfg(any(test, feature = "testing-support"))]
mod fake {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone)]
    pub struct FakeClock {
        inner: Arc<Mutex<NaiveDateTime>>,
        slept: Arc<Mutex<Vec<StdDuration>>>,
    }

    impl FakeClock {
        pub fn new(start: NaiveDateTime) -> Self {
            Self {
                inner: Arc::new(Mutex::new(start)),
                slept: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Jump the clock to an absolute instant.
        pub fn set(&self, instant: NaiveDateTime) {
            *self.inner.lock().unwrap() = instant;
        }

        /// Total virtual time spent sleeping.
        pub fn total_slept(&self) -> StdDuration {
            self.slept.lock().unwrap().iter().sum()
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> NaiveDateTime {
            *self.inner.lock().unwrap()
        }

        fn sleep(&self, duration: StdDuration) {
            let mut now = self.inner.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
            self.slept.lock().unwrap().push(duration);
        }
    }
}
