//! crates/habit_reminder_core/src/schedule.rs
//!
//! The due-ness algorithm. Everything here is a pure function of a record and a
//! local wall-clock instant; DST and timezone changes are not compensated.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{Frequency, ReminderRecord};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("time '{0}' is not a valid HH:MM value")]
    MalformedTime(String),
    #[error("'{0}' is not a weekday name")]
    UnknownDay(String),
}

fn time_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])$").ok())
        .as_ref()
}

/// A parsed `HH:MM` time-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderTime {
    hour: u32,
    minute: u32,
}

impl ReminderTime {
    pub fn parse(s: &str) -> Result<Self, ScheduleError> {
        let captures = time_pattern()
            .and_then(|pattern| pattern.captures(s))
            .ok_or_else(|| ScheduleError::MalformedTime(s.to_string()))?;
        let hour = captures[1]
            .parse()
            .map_err(|_| ScheduleError::MalformedTime(s.to_string()))?;
        let minute = captures[2]
            .parse()
            .map_err(|_| ScheduleError::MalformedTime(s.to_string()))?;
        Ok(Self { hour, minute })
    }

    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.as_naive_time())
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

pub fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    match name.trim().to_ascii_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        _ => Err(ScheduleError::UnknownDay(name.to_string())),
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Cadence {
    Daily,
    /// Weekly or custom. May be empty, in which case nothing ever fires.
    OnDays(Vec<Weekday>),
}

/// A validated schedule derived from a record's `time`, `days` and `frequency`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    time: ReminderTime,
    cadence: Cadence,
}

impl Schedule {
    pub fn from_record(record: &ReminderRecord) -> Result<Self, ScheduleError> {
        let time = ReminderTime::parse(&record.time)?;
        let cadence = match record.frequency {
            Frequency::Daily => Cadence::Daily,
            Frequency::Weekly | Frequency::Custom => {
                let mut days = record
                    .days
                    .iter()
                    .map(|d| parse_weekday(d))
                    .collect::<Result<Vec<_>, _>>()?;
                days.sort_by_key(|d| d.num_days_from_monday());
                days.dedup();
                Cadence::OnDays(days)
            }
        };
        Ok(Self { time, cadence })
    }

    fn fires_on(&self, date: NaiveDate) -> bool {
        match &self.cadence {
            Cadence::Daily => true,
            Cadence::OnDays(days) => days.contains(&date.weekday()),
        }
    }

    /// The next fire time as seen from `now`.
    ///
    /// Daily reminders never fire at `now` itself: a candidate at or before `now`
    /// rolls to tomorrow. Weekly and custom reminders accept a candidate exactly at `now`.
    pub fn next_fire(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match &self.cadence {
            Cadence::Daily => {
                let today = self.time.on(now.date());
                if today <= now {
                    Some(today + Duration::days(1))
                } else {
                    Some(today)
                }
            }
            Cadence::OnDays(_) => self.first_matching(now, |candidate| candidate >= now),
        }
    }

    /// The first occurrence strictly after `instant`, used when re-arming after a fire.
    pub fn next_after(&self, instant: NaiveDateTime) -> Option<NaiveDateTime> {
        self.first_matching(instant, |candidate| candidate > instant)
    }

    /// Today's occurrence if it has already arrived.
    pub fn latest_due(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let date = now.date();
        if !self.fires_on(date) {
            return None;
        }
        let occurrence = self.time.on(date);
        (occurrence <= now).then_some(occurrence)
    }

    fn first_matching(
        &self,
        from: NaiveDateTime,
        accept: impl Fn(NaiveDateTime) -> bool,
    ) -> Option<NaiveDateTime> {
        // Eight days covers "same weekday next week" when today's slot has passed.
        (0..=7)
            .map(|offset| from.date() + Duration::days(offset))
            .filter(|date| self.fires_on(*date))
            .map(|date| self.time.on(date))
            .find(|candidate| accept(*candidate))
    }
}

/// Whole-record form of the scheduler. `Ok(None)` means there is no candidate,
/// which is a valid state for a weekly reminder without days.
pub fn next_fire(
    record: &ReminderRecord,
    now: NaiveDateTime,
) -> Result<Option<NaiveDateTime>, ScheduleError> {
    Ok(Schedule::from_record(record)?.next_fire(now))
}

/// The delay from `now` until the next fire, or `None` when nothing will ever fire.
pub fn next_delay(
    record: &ReminderRecord,
    now: NaiveDateTime,
) -> Result<Option<std::time::Duration>, ScheduleError> {
    Ok(next_fire(record, now)?.map(|at| delay_until(now, at)))
}

pub fn delay_until(now: NaiveDateTime, at: NaiveDateTime) -> std::time::Duration {
    (at - now).to_std().unwrap_or(std::time::Duration::ZERO)
}

/// When the runtime should next wake up for this record: the earlier of a pending
/// snooze and the next unhandled occurrence. Disabled records never wake.
pub fn next_wakeup(
    record: &ReminderRecord,
    now: NaiveDateTime,
) -> Result<Option<NaiveDateTime>, ScheduleError> {
    if !record.enabled {
        return Ok(None);
    }
    let schedule = Schedule::from_record(record)?;
    let due_now = schedule
        .latest_due(now)
        .filter(|at| record.handled_through.map_or(true, |handled| *at > handled))
        .map(|_| now);
    let occurrence = due_now.or_else(|| schedule.next_after(now));
    Ok(match (occurrence, record.snoozed_until) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    })
}
