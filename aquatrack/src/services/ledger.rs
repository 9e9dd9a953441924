//! Intake ledger
//!
//! Appends intake events to the current day's bucket and derives the
//! read views shown on the dashboard. Persistence is left to the session,
//! which owns the snapshot.

use crate::models::{History, IntakeEvent, StoredSnapshot};
use crate::services::streak::compute_streak;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;

/// Result of logging one drink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntakeRecorded {
    pub event: IntakeEvent,
    pub total_before: u32,
    pub total_after: u32,
    /// True only on the log that takes today's total from below the goal
    /// to at or above it
    pub goal_reached: bool,
}

/// Goal-aware view over the snapshot history
#[derive(Debug, Clone, Copy)]
pub struct IntakeLedger {
    daily_goal: u32,
}

impl IntakeLedger {
    pub fn new(daily_goal: u32) -> Self {
        Self { daily_goal }
    }

    pub fn daily_goal(&self) -> u32 {
        self.daily_goal
    }

    /// Append `amount` at `now` to the bucket of `now`'s local date and
    /// advance the snapshot's modification stamp
    pub fn record(
        &self,
        snapshot: &mut StoredSnapshot,
        amount: u32,
        now: DateTime<Local>,
    ) -> IntakeRecorded {
        let today = now.date_naive();
        let total_before = snapshot.history.total_for(today);

        let event = IntakeEvent::new(amount, now.with_timezone(&Utc));
        snapshot.history.append(today, event);
        snapshot.touch(now.with_timezone(&Utc));

        let total_after = snapshot.history.total_for(today);
        let goal_reached = total_before < self.daily_goal && total_after >= self.daily_goal;

        tracing::debug!(
            "Recorded {} ml on {} ({} -> {} ml)",
            amount,
            today,
            total_before,
            total_after
        );

        IntakeRecorded {
            event,
            total_before,
            total_after,
            goal_reached,
        }
    }

    pub fn todays_total(&self, history: &History, today: NaiveDate) -> u32 {
        history.total_for(today)
    }

    pub fn todays_logs<'a>(&self, history: &'a History, today: NaiveDate) -> &'a [IntakeEvent] {
        history.bucket(today)
    }

    pub fn streak(&self, history: &History, today: NaiveDate) -> u32 {
        compute_streak(history, today, self.daily_goal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 6, 3, hour, 0, 0).earliest().unwrap()
    }

    #[test]
    fn test_goal_transition_fires_once() {
        let ledger = IntakeLedger::new(3000);
        let mut snapshot = StoredSnapshot::empty(at(0).with_timezone(&Utc));

        let first = ledger.record(&mut snapshot, 1000, at(8));
        let second = ledger.record(&mut snapshot, 1000, at(12));
        let third = ledger.record(&mut snapshot, 1500, at(18));
        let fourth = ledger.record(&mut snapshot, 250, at(20));

        assert!(!first.goal_reached);
        assert!(!second.goal_reached);
        assert!(third.goal_reached);
        assert_eq!(third.total_before, 2000);
        assert_eq!(third.total_after, 3500);
        assert!(!fourth.goal_reached);

        let today = at(8).date_naive();
        assert_eq!(ledger.todays_total(&snapshot.history, today), 3750);
    }

    #[test]
    fn test_logs_are_chronological() {
        let ledger = IntakeLedger::new(3000);
        let mut snapshot = StoredSnapshot::empty(at(0).with_timezone(&Utc));

        ledger.record(&mut snapshot, 250, at(9));
        ledger.record(&mut snapshot, 500, at(10));

        let logs = ledger.todays_logs(&snapshot.history, at(9).date_naive());
        assert_eq!(logs.len(), 2);
        assert!(logs[0].timestamp < logs[1].timestamp);
        assert_eq!(logs[1].amount, 500);
    }

    #[test]
    fn test_record_advances_last_modified() {
        let ledger = IntakeLedger::new(3000);
        let start = at(0).with_timezone(&Utc);
        let mut snapshot = StoredSnapshot::empty(start);

        ledger.record(&mut snapshot, 250, at(9));

        assert!(snapshot.last_modified > start);
    }
}
