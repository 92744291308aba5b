//! Wall-clock abstraction
//!
//! Every hour-of-day, weekday and elapsed-time decision in the assistant reads
//! the injected [`Clock`], so tests can pin "now".

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveTime, TimeZone, Utc};
use std::sync::Mutex;

/// Source of the current local time.
pub trait Clock: Send + Sync {
    /// Current time in the device's local offset.
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current instant in UTC (what gets persisted).
    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// The real system clock in the local time zone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A settable clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Build a clock at a UTC wall time, e.g. `ManualClock::at(2025, 6, 2, 9, 0)`.
    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let now = Utc
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .map(|dt| dt.fixed_offset())
            .unwrap_or_else(|| Utc::now().fixed_offset());
        Self::new(now)
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }
}

/// Local midnight of the day containing `now`.
pub fn start_of_day(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    now.date_naive()
        .and_time(NaiveTime::MIN)
        .and_local_timezone(*now.offset())
        .single()
        .unwrap_or(now)
}
