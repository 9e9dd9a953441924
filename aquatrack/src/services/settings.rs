//! Settings service
//!
//! Manages application settings persistence using JSON file storage.

use crate::config::*;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// When mutations are pushed to the remote document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushPolicy {
    /// Push after every persisted mutation, intake logging included
    EveryWrite,
    /// Push only after reminder changes; intake reaches the remote on the
    /// next reminder change or the next session start
    #[default]
    RemindersOnly,
}

/// Goal and quick-add configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    #[serde(default = "default_daily_goal")]
    pub daily_goal_ml: u32,
    #[serde(default = "default_intake_presets")]
    pub intake_presets: Vec<u32>,
}

fn default_daily_goal() -> u32 {
    DEFAULT_DAILY_GOAL_ML
}

fn default_intake_presets() -> Vec<u32> {
    DEFAULT_INTAKE_PRESETS_ML.to_vec()
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            daily_goal_ml: default_daily_goal(),
            intake_presets: default_intake_presets(),
        }
    }
}

/// Remote synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(default)]
    pub push_policy: PushPolicy,
    #[serde(default = "default_drive_api_url")]
    pub drive_api_url: String,
    #[serde(default = "default_drive_upload_url")]
    pub drive_upload_url: String,
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_drive_api_url() -> String {
    DRIVE_API_URL.to_string()
}

fn default_drive_upload_url() -> String {
    DRIVE_UPLOAD_URL.to_string()
}

fn default_file_name() -> String {
    DRIVE_FILE_NAME.to_string()
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_policy: PushPolicy::default(),
            drive_api_url: default_drive_api_url(),
            drive_upload_url: default_drive_upload_url(),
            file_name: default_file_name(),
        }
    }
}

/// Reminder notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderSettings {
    /// Seconds between reminder evaluation ticks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_notification_title")]
    pub notification_title: String,
    /// Show system notifications; off writes them to the log only
    #[serde(default = "default_desktop_notifications")]
    pub desktop_notifications: bool,
}

fn default_poll_interval() -> u64 {
    DEFAULT_REMINDER_POLL_SECS
}

fn default_notification_title() -> String {
    DEFAULT_NOTIFICATION_TITLE.to_string()
}

fn default_desktop_notifications() -> bool {
    true
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            notification_title: default_notification_title(),
            desktop_notifications: default_desktop_notifications(),
        }
    }
}

/// Calendar mirroring of reminders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_calendar_api_url")]
    pub api_url: String,
    #[serde(default = "default_calendar_name")]
    pub calendar_name: String,
    /// IANA zone for recurring events (e.g. "Europe/Berlin"); UTC when unset
    #[serde(default)]
    pub time_zone: Option<String>,
}

fn default_calendar_api_url() -> String {
    CALENDAR_API_URL.to_string()
}

fn default_calendar_name() -> String {
    CALENDAR_SUMMARY.to_string()
}

impl Default for CalendarSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_url: default_calendar_api_url(),
            calendar_name: default_calendar_name(),
            time_zone: None,
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppSettings {
    #[serde(default)]
    pub tracker: TrackerSettings,
    #[serde(default)]
    pub sync: SyncSettings,
    #[serde(default)]
    pub reminders: ReminderSettings,
    #[serde(default)]
    pub calendar: CalendarSettings,
}

impl AppSettings {
    /// Check values against the limits in `config`
    pub fn validate(&self) -> Result<()> {
        let goal = self.tracker.daily_goal_ml;
        if !(MIN_DAILY_GOAL_ML..=MAX_DAILY_GOAL_ML).contains(&goal) {
            return Err(AppError::Validation(format!(
                "Daily goal must be between {} and {} ml, got {}",
                MIN_DAILY_GOAL_ML, MAX_DAILY_GOAL_ML, goal
            )));
        }

        if let Some(bad) = self
            .tracker
            .intake_presets
            .iter()
            .find(|p| **p == 0 || **p > MAX_SINGLE_INTAKE_ML)
        {
            return Err(AppError::Validation(format!(
                "Intake preset {} ml is outside 1..={} ml",
                bad, MAX_SINGLE_INTAKE_ML
            )));
        }

        let poll = self.reminders.poll_interval_secs;
        if !(MIN_REMINDER_POLL_SECS..=MAX_REMINDER_POLL_SECS).contains(&poll) {
            return Err(AppError::Validation(format!(
                "Reminder poll interval must be between {} and {} seconds, got {}",
                MIN_REMINDER_POLL_SECS, MAX_REMINDER_POLL_SECS, poll
            )));
        }

        Ok(())
    }
}

/// Service for managing application settings
#[derive(Clone)]
pub struct SettingsService {
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new(app_data_dir: PathBuf) -> Self {
        Self {
            settings_path: app_data_dir.join(SETTINGS_FILE_NAME),
        }
    }

    /// Load settings from disk or create default if not exists
    pub async fn load(&self) -> Result<AppSettings> {
        if !self.settings_path.exists() {
            tracing::info!("Settings file not found, creating default settings");
            let default = AppSettings::default();
            self.save(&default).await?;
            return Ok(default);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(|e| AppError::Generic(format!("Failed to parse settings: {}", e)))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Save settings to disk
    pub async fn save(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;

        let content = serde_json::to_string_pretty(settings)
            .map_err(|e| AppError::Generic(format!("Failed to serialize settings: {}", e)))?;

        fs::write(&self.settings_path, content).await?;
        tracing::info!("Settings saved to {:?}", self.settings_path);

        Ok(())
    }

    /// Update tracker settings
    pub async fn update_tracker(&self, tracker: TrackerSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.tracker = tracker;
        self.save(&settings).await
    }

    /// Update sync settings
    pub async fn update_sync(&self, sync: SyncSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.sync = sync;
        self.save(&settings).await
    }

    /// Update reminder settings
    pub async fn update_reminders(&self, reminders: ReminderSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.reminders = reminders;
        self.save(&settings).await
    }

    /// Update calendar settings
    pub async fn update_calendar(&self, calendar: CalendarSettings) -> Result<()> {
        let mut settings = self.load().await?;
        settings.calendar = calendar;
        self.save(&settings).await
    }
}
