//! crates/habit_reminder_core/src/evaluate.rs
//!
//! One evaluation pass of the background runtime, expressed as a pure function from
//! the current time and a snapshot of the reminder table to the notifications that
//! must fire and the records that must be written back.

use chrono::NaiveDateTime;

use crate::domain::ReminderRecord;
use crate::schedule::{Schedule, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireReason {
    Scheduled,
    Snoozed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fire {
    pub habit_id: String,
    pub title: String,
    pub reason: FireReason,
    /// The occurrence (or snooze deadline) being honoured.
    pub at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    pub id: String,
    pub error: ScheduleError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Evaluation {
    pub fires: Vec<Fire>,
    /// Records whose bookkeeping changed and must be persisted.
    pub updated: Vec<ReminderRecord>,
    /// Records skipped because their schedule could not be parsed.
    pub rejected: Vec<Rejected>,
}

impl Evaluation {
    pub fn is_idle(&self) -> bool {
        self.fires.is_empty() && self.updated.is_empty()
    }
}

/// Evaluates every record independently: a malformed record is reported and skipped
/// without affecting the others. At most one notification fires per record per pass.
pub fn evaluate(now: NaiveDateTime, records: &[ReminderRecord]) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for record in records.iter().filter(|r| r.enabled) {
        let schedule = match Schedule::from_record(record) {
            Ok(schedule) => schedule,
            Err(error) => {
                evaluation.rejected.push(Rejected {
                    id: record.id.clone(),
                    error,
                });
                continue;
            }
        };

        let mut next = record.clone();
        let mut fire = None;

        if let Some(occurrence) = schedule.latest_due(now) {
            let unhandled = record
                .handled_through
                .map_or(true, |handled| occurrence > handled);
            if unhandled {
                next.handled_through = Some(occurrence);
                fire = Some((FireReason::Scheduled, occurrence));
            }
        }

        if let Some(until) = record.snoozed_until.filter(|until| *until <= now) {
            next.snoozed_until = None;
            fire.get_or_insert((FireReason::Snoozed, until));
        }

        if let Some((reason, at)) = fire {
            evaluation.fires.push(Fire {
                habit_id: record.id.clone(),
                title: record.title.clone(),
                reason,
                at,
            });
            evaluation.updated.push(next);
        }
    }

    evaluation
}
