//! Domain models
//!
//! Rust structs representing the persisted entity graph.
//! All models use serde; the JSON shape matches the snapshot document
//! stored both locally and in the remote app data folder.

use crate::config::{DEFAULT_REMINDER_LABEL, WEEKDAY_SHORT_NAMES};
use crate::error::{AppError, Result};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Format of history bucket keys
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Bucket key for a calendar date
pub fn date_key(date: NaiveDate) -> String {
    date.format(DATE_KEY_FORMAT).to_string()
}

/// A single logged drink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeEvent {
    /// Amount of water drunk in millilitres
    pub amount: u32,
    /// When the drink was recorded
    pub timestamp: DateTime<Utc>,
}

impl IntakeEvent {
    pub fn new(amount: u32, timestamp: DateTime<Utc>) -> Self {
        Self { amount, timestamp }
    }

    /// Local calendar date this event belongs to
    pub fn local_date(&self) -> NaiveDate {
        self.timestamp.with_timezone(&Local).date_naive()
    }
}

/// Intake events grouped by local calendar date.
///
/// Buckets keep insertion order, which is chronological because the
/// ledger only ever appends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(BTreeMap<String, Vec<IntakeEvent>>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of days that have at least one bucket
    pub fn day_count(&self) -> usize {
        self.0.len()
    }

    /// Events logged on `date`, empty if none
    pub fn bucket(&self, date: NaiveDate) -> &[IntakeEvent] {
        self.0
            .get(&date_key(date))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Cumulative intake on `date`
    pub fn total_for(&self, date: NaiveDate) -> u32 {
        self.bucket(date)
            .iter()
            .fold(0u32, |sum, event| sum.saturating_add(event.amount))
    }

    /// Append an event to the bucket for `date`
    pub fn append(&mut self, date: NaiveDate, event: IntakeEvent) {
        self.0.entry(date_key(date)).or_default().push(event);
    }

    /// Iterate buckets in ascending date order
    pub fn days(&self) -> impl Iterator<Item = (&str, &[IntakeEvent])> {
        self.0.iter().map(|(key, events)| (key.as_str(), events.as_slice()))
    }
}

/// Time of day a reminder fires, minute precision, local time
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ReminderTime {
    hour: u8,
    minute: u8,
}

impl ReminderTime {
    pub fn new(hour: u8, minute: u8) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(AppError::Validation(format!(
                "Invalid reminder time {}:{}",
                hour, minute
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// Whether `time` falls inside this reminder's minute
    pub fn matches(&self, time: NaiveTime) -> bool {
        time.hour() == u32::from(self.hour) && time.minute() == u32::from(self.minute)
    }

    /// This time of day on `date`
    pub fn on(&self, date: NaiveDate) -> NaiveDateTime {
        // hour and minute are range-checked on construction
        date.and_time(
            NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
                .unwrap_or(NaiveTime::MIN),
        )
    }
}

impl FromStr for ReminderTime {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (hour, minute) = s
            .split_once(':')
            .ok_or_else(|| AppError::Validation(format!("Invalid reminder time '{}'", s)))?;

        let hour: u8 = hour
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid hour in '{}'", s)))?;
        let minute: u8 = minute
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid minute in '{}'", s)))?;

        Self::new(hour, minute)
    }
}

impl fmt::Display for ReminderTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl TryFrom<String> for ReminderTime {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ReminderTime> for String {
    fn from(time: ReminderTime) -> Self {
        time.to_string()
    }
}

/// How often a reminder repeats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    Once,
    #[default]
    Daily,
    #[serde(rename = "custom")]
    CustomDays,
}

impl FromStr for Repeat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "once" => Ok(Repeat::Once),
            "daily" => Ok(Repeat::Daily),
            "custom" | "custom-days" => Ok(Repeat::CustomDays),
            other => Err(AppError::Validation(format!(
                "Invalid repeat '{}'. Use 'once', 'daily' or 'custom'",
                other
            ))),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A recurring (or one-shot) hydration reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRule {
    pub id: String,
    pub time: ReminderTime,
    pub repeat: Repeat,
    /// Weekday numbers (Sunday = 0), only consulted for `CustomDays`
    #[serde(default)]
    pub days: BTreeSet<u8>,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Mirror event in the user's calendar, if one was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_event_id: Option<String>,
}

impl ReminderRule {
    /// Whether the rule applies on the weekday numbered `weekday` (Sunday = 0)
    pub fn applies_on(&self, weekday: u8) -> bool {
        match self.repeat {
            Repeat::Daily | Repeat::Once => true,
            Repeat::CustomDays => self.days.contains(&weekday),
        }
    }

    /// Notification body for this rule
    pub fn notification_body(&self) -> &str {
        if self.label.trim().is_empty() {
            DEFAULT_REMINDER_LABEL
        } else {
            &self.label
        }
    }

    /// Human readable schedule, e.g. "Mo, We at 09:00"
    pub fn describe(&self) -> String {
        match self.repeat {
            Repeat::Daily => format!("Daily at {}", self.time),
            Repeat::Once => format!("Once at {}", self.time),
            Repeat::CustomDays => {
                let days: Vec<&str> = self
                    .days
                    .iter()
                    .filter_map(|d| WEEKDAY_SHORT_NAMES.get(usize::from(*d)).copied())
                    .collect();
                format!("{} at {}", days.join(", "), self.time)
            }
        }
    }
}

/// Save reminder request, as submitted by the reminder editor
#[derive(Debug, Clone, Deserialize)]
pub struct ReminderRequest {
    /// Existing rule to replace; a new id is generated when absent
    #[serde(default)]
    pub id: Option<String>,
    pub time: String,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default)]
    pub days: Vec<u8>,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Default for ReminderRequest {
    fn default() -> Self {
        Self {
            id: None,
            time: String::new(),
            repeat: Repeat::default(),
            days: Vec::new(),
            label: String::new(),
            enabled: true,
        }
    }
}

impl ReminderRequest {
    /// Validate the request and build the rule it describes
    pub fn into_rule(self) -> Result<ReminderRule> {
        if self.time.trim().is_empty() {
            return Err(AppError::Validation(
                "Please select a time for the reminder.".to_string(),
            ));
        }
        let time: ReminderTime = self.time.parse()?;

        let days: BTreeSet<u8> = match self.repeat {
            Repeat::CustomDays => {
                if self.days.is_empty() {
                    return Err(AppError::Validation(
                        "Please select at least one day for custom reminders.".to_string(),
                    ));
                }
                if let Some(bad) = self.days.iter().find(|d| **d > 6) {
                    return Err(AppError::Validation(format!(
                        "Invalid weekday {} (expected 0-6, Sunday = 0)",
                        bad
                    )));
                }
                self.days.into_iter().collect()
            }
            Repeat::Once | Repeat::Daily => BTreeSet::new(),
        };

        let id = match self.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => uuid::Uuid::new_v4().to_string(),
        };

        Ok(ReminderRule {
            id,
            time,
            repeat: self.repeat,
            days,
            label: self.label.trim().to_string(),
            enabled: self.enabled,
            calendar_event_id: None,
        })
    }
}

/// The unit of persistence and synchronization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSnapshot {
    #[serde(default)]
    pub history: History,
    #[serde(default)]
    pub reminders: Vec<ReminderRule>,
    pub last_modified: DateTime<Utc>,
}

impl StoredSnapshot {
    /// Fresh snapshot with no history and no reminders
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            history: History::new(),
            reminders: Vec::new(),
            last_modified: now,
        }
    }

    /// Advance `last_modified` after a mutation.
    ///
    /// Uses `now` when it is later than the current stamp, otherwise bumps
    /// the stamp by one millisecond so it always strictly increases.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_modified = if now > self.last_modified {
            now
        } else {
            self.last_modified + Duration::milliseconds(1)
        };
    }

    pub fn reminder(&self, id: &str) -> Option<&ReminderRule> {
        self.reminders.iter().find(|r| r.id == id)
    }

    /// Insert or replace a rule by id, keeping its position when replacing.
    /// Returns the rule that was replaced.
    pub fn upsert_reminder(&mut self, rule: ReminderRule) -> Option<ReminderRule> {
        match self.reminders.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => Some(std::mem::replace(existing, rule)),
            None => {
                self.reminders.push(rule);
                None
            }
        }
    }

    pub fn remove_reminder(&mut self, id: &str) -> Option<ReminderRule> {
        let index = self.reminders.iter().position(|r| r.id == id)?;
        Some(self.reminders.remove(index))
    }
}

/// The signed-in user, as produced by the sign-in flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Expiry of the sign-in credential
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionIdentity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: None,
            expires_at: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|exp| exp <= now).unwrap_or(false)
    }
}
