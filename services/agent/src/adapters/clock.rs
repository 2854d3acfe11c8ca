use chrono::{Local, NaiveDateTime, Utc};
use habit_reminder_core::ports::Clock;

/// The host's local wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn timestamp_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
