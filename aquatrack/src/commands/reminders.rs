//! Reminder-related commands
//!
//! CRUD operations for hydration reminders.

use crate::app::AppState;
use crate::config::{REMINDER_DELETED_MESSAGE, REMINDER_SAVED_MESSAGE};
use crate::error::Result;
use crate::models::{ReminderRequest, ReminderRule};
use serde::Serialize;

/// Reminder as listed in the reminder panel
#[derive(Debug, Serialize)]
pub struct ReminderView {
    #[serde(flatten)]
    pub rule: ReminderRule,
    pub schedule: String,
}

impl From<ReminderRule> for ReminderView {
    fn from(rule: ReminderRule) -> Self {
        let schedule = rule.describe();
        Self { rule, schedule }
    }
}

#[derive(Debug, Serialize)]
pub struct SavedReminder {
    pub reminder: ReminderView,
    pub message: String,
}

/// List all reminders in their stored order
pub async fn list_reminders(state: &AppState) -> Result<Vec<ReminderView>> {
    Ok(state
        .session
        .reminders()
        .await
        .into_iter()
        .map(ReminderView::from)
        .collect())
}

/// Create or replace a reminder
pub async fn save_reminder(state: &AppState, request: ReminderRequest) -> Result<SavedReminder> {
    let rule = state.session.save_reminder(request).await?;

    Ok(SavedReminder {
        reminder: rule.into(),
        message: REMINDER_SAVED_MESSAGE.to_string(),
    })
}

/// Delete a reminder
pub async fn delete_reminder(state: &AppState, id: &str) -> Result<String> {
    state.session.delete_reminder(id).await?;
    Ok(REMINDER_DELETED_MESSAGE.to_string())
}
