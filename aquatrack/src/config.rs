//! Application configuration constants
//!
//! Central location for defaults, remote endpoints and validation
//! boundaries used throughout the application.

// ===== Tracker Defaults =====

/// Daily intake goal in millilitres (3 L)
pub const DEFAULT_DAILY_GOAL_ML: u32 = 3000;

/// Quick-add amounts offered by the presentation layer
pub const DEFAULT_INTAKE_PRESETS_ML: &[u32] = &[250, 500, 750];

/// Lowest daily goal accepted from settings
pub const MIN_DAILY_GOAL_ML: u32 = 500;

/// Highest daily goal accepted from settings (10 L)
pub const MAX_DAILY_GOAL_ML: u32 = 10_000;

/// Largest single intake the command layer accepts
pub const MAX_SINGLE_INTAKE_ML: u32 = 5_000;

/// Number of days shown in the consistency heatmap (16 weeks)
pub const HEATMAP_DAYS: u32 = 112;

// ===== Reminder Scheduling =====

/// Interval between reminder evaluation ticks
pub const DEFAULT_REMINDER_POLL_SECS: u64 = 30;

/// Poll interval bounds. The match granularity is one minute, so the
/// interval must stay well below 60 seconds to never skip a minute.
pub const MIN_REMINDER_POLL_SECS: u64 = 1;
pub const MAX_REMINDER_POLL_SECS: u64 = 55;

/// Title of every reminder notification
pub const DEFAULT_NOTIFICATION_TITLE: &str = "💧 Time to Hydrate!";

/// Application name shown by the desktop notification service
pub const NOTIFICATION_APP_NAME: &str = "AquaTrack";

/// Body used when a reminder has no label
pub const DEFAULT_REMINDER_LABEL: &str = "Don't forget to drink some water.";

/// Two-letter weekday names indexed by weekday number (Sunday = 0)
pub const WEEKDAY_SHORT_NAMES: [&str; 7] = ["Su", "Mo", "Tu", "We", "Th", "Fr", "Sa"];

// ===== Remote Storage (Google Drive appDataFolder) =====

pub const DRIVE_API_URL: &str = "https://www.googleapis.com/drive/v3";
pub const DRIVE_UPLOAD_URL: &str = "https://www.googleapis.com/upload/drive/v3";

/// Name of the single snapshot document kept in the app data folder
pub const DRIVE_FILE_NAME: &str = "aquatrack.data.json";

// ===== Calendar =====

pub const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Name of the secondary calendar holding reminder events
pub const CALENDAR_SUMMARY: &str = "AquaTrack Hydration";

/// Length of a reminder event in minutes
pub const CALENDAR_EVENT_MINUTES: i64 = 5;

pub const CALENDAR_EVENT_DESCRIPTION: &str = "Reminder from AquaTrack to drink water.";

pub const CALENDAR_DEFAULT_SUMMARY: &str = "Time to Hydrate!";

// ===== Files =====

/// Settings file name inside the data directory
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Directory holding one snapshot slot per signed-in user
pub const SLOTS_DIR_NAME: &str = "slots";

// ===== Messages =====

pub const GOAL_REACHED_TITLE: &str = "🎉 Goal reached! You're awesome!";

pub const REMINDER_SAVED_MESSAGE: &str = "Reminder has been saved successfully!";

pub const REMINDER_DELETED_MESSAGE: &str = "Reminder cancelled.";
