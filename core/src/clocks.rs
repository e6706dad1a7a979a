// Bookshelf
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.


//! Sources of the current time.
//!
//! Timestamps handed out by these clocks never carry sub-microsecond digits, which is the finest
//! resolution that both the SQLite and the PostgreSQL stores persist.

use time::{Duration, OffsetDateTime};

/// Anything that can tell the current time.
pub trait Clock {
    /// Returns the current UTC time at microsecond resolution.
    fn now_utc(&self) -> OffsetDateTime;
}

/// Drops the sub-microsecond part of `instant`.
pub fn truncate_to_micros(instant: OffsetDateTime) -> OffsetDateTime {
    instant - Duration::nanoseconds(i64::from(instant.nanosecond() % 1000))
}

/// Clock backed by the host's wall clock.
#[derive(Clone, Default)]
pub struct SystemClock {}

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        truncate_to_micros(OffsetDateTime::now_utc())
    }
}

/// Test utilities.
#[cfg(any(test, feature = "testutils"))]
pub mod testutils {
    use super::*;
    use std::sync::Mutex;

    /// A clock frozen at a given instant until the test moves it.
    pub struct SettableClock {
        now: Mutex<OffsetDateTime>,
    }

    impl SettableClock {
        /// Creates a clock frozen at `now`, which must not have sub-microsecond digits.
        pub fn new(now: OffsetDateTime) -> Self {
            assert_eq!(now, truncate_to_micros(now), "Nanosecond precision not supported");
            Self { now: Mutex::new(now) }
        }

        /// Moves the clock to `now`, which must not have sub-microsecond digits.
        pub fn set(&self, now: OffsetDateTime) {
            assert_eq!(now, truncate_to_micros(now), "Nanosecond precision not supported");
            *self.now.lock().unwrap() = now;
        }

        /// Moves the clock forward by `delta`, which must be a whole number of microseconds.
        pub fn advance(&self, delta: std::time::Duration) {
            assert_eq!(0, delta.subsec_nanos() % 1000, "Nanosecond precision not supported");
            *self.now.lock().unwrap() += delta;
        }
    }

    impl Clock for SettableClock {
        fn now_utc(&self) -> OffsetDateTime {
            *self.now.lock().unwrap()
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_truncate_to_micros() {
        assert_eq!(
            datetime!(2024-03-05 08:00:00.123456 UTC),
            truncate_to_micros(datetime!(2024-03-05 08:00:00.123456999 UTC))
        );
        assert_eq!(
            datetime!(2024-03-05 08:00:00.123456 UTC),
            truncate_to_micros(datetime!(2024-03-05 08:00:00.123456 UTC))
        );
        assert_eq!(
            datetime!(1969-12-31 23:59:59.999999 UTC),
            truncate_to_micros(datetime!(1969-12-31 23:59:59.9999995 UTC))
        );
    }

    #[test]
    fn test_systemclock_is_monotonic_enough() {
        let clock = SystemClock::default();
        let before = clock.now_utc();
        let after = clock.now_utc();
        assert!(before.unix_timestamp() > 0);
        assert!(after >= before);
    }

    #[test]
    fn test_systemclock_microsecond_resolution() {
        let clock = SystemClock::default();
        for _ in 0..10 {
            assert_eq!(0, clock.now_utc().nanosecond() % 1000);
        }
    }
}
