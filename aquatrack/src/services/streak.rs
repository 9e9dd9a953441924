//! Streak and consistency calculations
//!
//! Pure functions over a [`History`]. They take `today` explicitly so the
//! caller decides the local calendar date once per read.

use crate::models::History;
use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

/// Number of consecutive days, ending today or yesterday, on which the
/// cumulative intake reached `daily_goal`.
///
/// Today only counts once its goal is met. An incomplete today is skipped
/// rather than breaking the streak.
pub fn compute_streak(history: &History, today: NaiveDate, daily_goal: u32) -> u32 {
    if history.is_empty() {
        return 0;
    }

    let goal_met = |date: NaiveDate| {
        !history.bucket(date).is_empty() && history.total_for(date) >= daily_goal
    };

    let mut cursor = today;
    if !goal_met(cursor) {
        match cursor.pred_opt() {
            Some(yesterday) => cursor = yesterday,
            None => return 0,
        }
    }

    let mut streak = 0;
    while goal_met(cursor) {
        streak += 1;
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }

    streak
}

/// Heatmap intensity for one day: 0 = nothing logged, 4 = goal met
pub fn intensity_level(total: u32, daily_goal: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    if total >= daily_goal {
        return 4;
    }

    let ratio = f64::from(total) / f64::from(daily_goal);
    if ratio > 0.66 {
        3
    } else if ratio > 0.33 {
        2
    } else {
        1
    }
}

/// One cell of the consistency calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub total: u32,
    pub level: u8,
}

/// Per-day totals for the last `days` days, extended back to the Monday
/// of the first week so the grid starts on a full week.
pub fn calendar_heatmap(
    history: &History,
    today: NaiveDate,
    daily_goal: u32,
    days: u32,
) -> Vec<DaySummary> {
    let span = u64::from(days.max(1) - 1);
    let window_start = today.checked_sub_days(Days::new(span)).unwrap_or(today);
    let to_monday = u64::from(window_start.weekday().num_days_from_monday());
    let first = window_start
        .checked_sub_days(Days::new(to_monday))
        .unwrap_or(window_start);

    first
        .iter_days()
        .take_while(|date| *date <= today)
        .map(|date| {
            let total = history.total_for(date);
            DaySummary {
                date,
                total,
                level: intensity_level(total, daily_goal),
            }
        })
        .collect()
}
