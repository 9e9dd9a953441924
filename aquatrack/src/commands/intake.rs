//! Intake-related commands

use crate::app::AppState;
use crate::config::{GOAL_REACHED_TITLE, MAX_SINGLE_INTAKE_ML};
use crate::error::{AppError, Result};
use crate::models::date_key;
use crate::services::streak::DaySummary;
use crate::services::IntakeOutcome;
use chrono::{DateTime, Duration, Local, NaiveDate};
use serde::Serialize;

/// Toast shown when a drink completes the daily goal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GoalMessage {
    pub title: String,
    pub description: String,
}

impl GoalMessage {
    pub fn for_streak(streak: u32) -> Self {
        Self {
            title: GOAL_REACHED_TITLE.to_string(),
            description: format!("You've started a {}-day streak!", streak),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrinkView {
    #[serde(flatten)]
    pub outcome: IntakeOutcome,
    pub message: Option<GoalMessage>,
}

/// One day of the history listing
#[derive(Debug, Serialize)]
pub struct DayTotal {
    pub date: String,
    pub total: u32,
    pub drinks: usize,
    pub goal_met: bool,
}

/// Log a drink of `amount` ml
pub async fn add_water(state: &AppState, amount: u32) -> Result<DrinkView> {
    add_water_at(state, amount, Local::now()).await
}

pub async fn add_water_at(
    state: &AppState,
    amount: u32,
    now: DateTime<Local>,
) -> Result<DrinkView> {
    if amount == 0 || amount > MAX_SINGLE_INTAKE_ML {
        return Err(AppError::Validation(format!(
            "Amount must be between 1 and {} ml",
            MAX_SINGLE_INTAKE_ML
        )));
    }

    let outcome = state.session.record_intake_at(amount, now).await;
    let message = outcome
        .goal_reached
        .then(|| GoalMessage::for_streak(outcome.streak));

    Ok(DrinkView { outcome, message })
}

/// Daily totals for the last `days` days, newest first
pub async fn get_history(state: &AppState, days: u32) -> Result<Vec<DayTotal>> {
    get_history_on(state, days, Local::now().date_naive()).await
}

pub async fn get_history_on(
    state: &AppState,
    days: u32,
    today: NaiveDate,
) -> Result<Vec<DayTotal>> {
    let history = state.session.history().await;
    let goal = state.session.daily_goal();

    Ok((0..i64::from(days))
        .map(|offset| today - Duration::days(offset))
        .map(|date| {
            let total = history.total_for(date);
            DayTotal {
                date: date_key(date),
                total,
                drinks: history.bucket(date).len(),
                goal_met: total >= goal,
            }
        })
        .collect())
}

/// Consistency calendar for the last `days` days
pub async fn get_heatmap(state: &AppState, days: u32) -> Result<Vec<DaySummary>> {
    Ok(state.session.heatmap(days).await)
}
