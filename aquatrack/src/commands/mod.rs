//! Commands exposed to the presentation layer
//!
//! This module organizes commands into logical submodules:
//! - `intake`: Logging water and reading history
//! - `reminders`: Reminder operations
//! - `settings`: Application settings
//!
//! All commands take `AppState` first and return `Result<T, AppError>`
//! with serializable views.

pub mod intake;
pub mod reminders;
pub mod settings;

use crate::app::AppState;
use crate::error::Result;
use crate::models::IntakeEvent;
use chrono::{Local, NaiveDate};
use serde::Serialize;

pub use intake::*;
pub use reminders::*;
pub use settings::*;

// ===== General Commands =====

#[derive(Debug, Serialize)]
pub struct AppInfo {
    pub version: String,
    pub app_data_dir: String,
    pub signed_in_as: Option<String>,
}

pub async fn get_app_info(state: &AppState) -> Result<AppInfo> {
    Ok(AppInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        app_data_dir: state.app_data_dir.to_string_lossy().to_string(),
        signed_in_as: state.session.identity().await.map(|identity| identity.email),
    })
}

/// Everything the dashboard shows
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub total: u32,
    pub daily_goal: u32,
    /// Progress towards the goal, capped at 100
    pub percent: u32,
    pub remaining: u32,
    pub streak: u32,
    pub is_syncing: bool,
    /// Today's drinks, newest first
    pub logs: Vec<IntakeEvent>,
    pub presets: Vec<u32>,
}

pub async fn get_status(state: &AppState) -> Result<StatusView> {
    get_status_on(state, Local::now().date_naive()).await
}

pub async fn get_status_on(state: &AppState, today: NaiveDate) -> Result<StatusView> {
    let session = &state.session;
    let total = session.total_on(today).await;
    let daily_goal = session.daily_goal();

    let mut logs = session.logs_on(today).await;
    logs.reverse();

    Ok(StatusView {
        total,
        daily_goal,
        percent: progress_percent(total, daily_goal),
        remaining: daily_goal.saturating_sub(total),
        streak: session.streak_on(today).await,
        is_syncing: session.is_syncing(),
        logs,
        presets: state.settings.tracker.intake_presets.clone(),
    })
}

fn progress_percent(total: u32, daily_goal: u32) -> u32 {
    if daily_goal == 0 {
        return 100;
    }
    let percent = u64::from(total) * 100 / u64::from(daily_goal);
    percent.min(100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 3000), 0);
        assert_eq!(progress_percent(1500, 3000), 50);
        assert_eq!(progress_percent(4500, 3000), 100);
        assert_eq!(progress_percent(10, 0), 100);
    }
}
