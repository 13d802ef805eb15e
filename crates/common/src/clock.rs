//! Wall-clock abstraction.
//!
//! Token expiry and signing-key rotation are pure functions of "now". The
//! host process supplies "now" through [`Clock`] so that components can be
//! constructed with a deterministic clock under test.
//!
//! Production code uses [`SystemClock`]. Tests enable the `test-utils`
//! feature and drive time explicitly with [`ManualClock`].

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use manual::ManualClock;

#[cfg(any(test, feature = "test-utils"))]
mod manual {
    use super::Clock;
    use chrono::{DateTime, Duration, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Arc;

    /// Settable clock with millisecond resolution.
    ///
    /// Clones share the same underlying instant, so a test can hand one
    /// clone to the component under test and advance time with another.
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

        /// Create a clock frozen at the current system time.
        #[must_use]
        pub fn starting_now() -> Self {
            Self::new(Utc::now())
        }

        /// Move the clock forward (or backward, for a negative duration).
        pub fn advance(&self, by: Duration) {
            self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }

        /// Jump to an absolute instant.
        pub fn set(&self, to: DateTime<Utc>) {
            self.millis.store(to.timestamp_millis(), Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst)).unwrap_or_default()
        }
    }
}
