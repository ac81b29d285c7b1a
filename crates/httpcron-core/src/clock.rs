//! Injectable clock abstraction.
//!
//! All timestamps in httpcron are naive UTC with microsecond precision
//! All timestamps are naive UTC, no timezone awareness. Production code
//! reads `SystemClock`; tests substitute
//! a `FakeClock` so due/expired predicates can be exercised deterministically
//! without real sleeps.

use chrono::NaiveDateTime;

/// A source of the current instant, abstracted so tests can control time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> NaiveDateTime;
}

/// Production clock backed by the OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Utc::now().naive_utc()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// A clock whose value is advanced explicitly by tests.
    #[derive(Clone)]
    pub struct FakeClock {
        inner: Arc<Mutex<NaiveDateTime>>,
    }

    impl FakeClock {
        pub fn new(start: NaiveDateTime) -> Self {
            Self {
                inner: Arc::new(Mutex::new(start)),
            }
        }

        pub fn advance(&self, duration: chrono::Duration) {
            let mut guard = self.inner.lock();
            *guard += duration;
        }

        pub fn set(&self, value: NaiveDateTime) {
            *self.inner.lock() = value;
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> NaiveDateTime {
            *self.inner.lock()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeClock;
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn fake_clock_advances_on_command() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let clock = FakeClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(clock.now(), start + chrono::Duration::seconds(2));
    }
}
