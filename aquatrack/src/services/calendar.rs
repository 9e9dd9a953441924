//! Calendar mirroring of reminders
//!
//! Best-effort: each saved reminder gets a matching event (with a popup
//! alert) in a dedicated calendar, so reminders also reach devices where
//! the app is not running. Failures here never block the local change.

use crate::config::{
    CALENDAR_DEFAULT_SUMMARY, CALENDAR_EVENT_DESCRIPTION, CALENDAR_EVENT_MINUTES,
};
use crate::error::{ensure_success, AppError, Result};
use crate::models::{ReminderRule, Repeat};
use crate::services::settings::CalendarSettings;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::OnceCell;

const RRULE_WEEKDAYS: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// Event calendar holding reminder mirrors
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Create an event for `rule`, returning its id
    async fn create_event(&self, rule: &ReminderRule) -> Result<String>;

    /// Delete an event; deleting an already removed event succeeds
    async fn delete_event(&self, event_id: &str) -> Result<()>;
}

/// Start or end of an event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    pub time_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventReminderOverride {
    pub method: String,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReminders {
    pub use_default: bool,
    pub overrides: Vec<EventReminderOverride>,
}

/// Calendar event body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub reminders: EventReminders,
    pub recurrence: Vec<String>,
}

/// Recurrence line for a rule, `None` for one-shot rules
pub fn recurrence_rule(rule: &ReminderRule) -> Option<String> {
    match rule.repeat {
        Repeat::Once => None,
        Repeat::Daily => Some("RRULE:FREQ=DAILY".to_string()),
        Repeat::CustomDays => {
            let byday: Vec<&str> = rule
                .days
                .iter()
                .filter_map(|d| RRULE_WEEKDAYS.get(usize::from(*d)).copied())
                .collect();
            if byday.is_empty() {
                return None;
            }
            Some(format!("RRULE:FREQ=WEEKLY;BYDAY={}", byday.join(",")))
        }
    }
}

/// First occurrence of `rule` relative to `now`.
///
/// Repeating rules whose time already passed today start tomorrow.
pub fn first_occurrence(rule: &ReminderRule, now: NaiveDateTime) -> NaiveDateTime {
    let today = rule.time.on(now.date());
    if rule.repeat != Repeat::Once && today < now {
        today + Duration::days(1)
    } else {
        today
    }
}

fn event_time(at: NaiveDateTime, time_zone: Option<&str>) -> EventTime {
    match time_zone {
        Some(tz) => EventTime {
            date_time: at.format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: tz.to_string(),
        },
        None => {
            let utc: DateTime<Utc> = Local
                .from_local_datetime(&at)
                .earliest()
                .map(|local| local.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&at));
            EventTime {
                date_time: utc.to_rfc3339_opts(SecondsFormat::Secs, true),
                time_zone: "UTC".to_string(),
            }
        }
    }
}

/// Build the event mirroring `rule`.
///
/// With a named `time_zone` the local wall time is sent as is; otherwise
/// it is converted to UTC.
pub fn event_for_rule(
    rule: &ReminderRule,
    now: NaiveDateTime,
    time_zone: Option<&str>,
) -> CalendarEvent {
    let start = first_occurrence(rule, now);
    let end = start + Duration::minutes(CALENDAR_EVENT_MINUTES);

    let label = if rule.label.trim().is_empty() {
        CALENDAR_DEFAULT_SUMMARY
    } else {
        rule.label.as_str()
    };

    CalendarEvent {
        summary: format!("💧 {}", label),
        description: CALENDAR_EVENT_DESCRIPTION.to_string(),
        start: event_time(start, time_zone),
        end: event_time(end, time_zone),
        reminders: EventReminders {
            use_default: false,
            overrides: vec![EventReminderOverride {
                method: "popup".to_string(),
                minutes: 0,
            }],
        },
        recurrence: recurrence_rule(rule).into_iter().collect(),
    }
}

#[derive(Deserialize)]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: String,
}

#[derive(Deserialize)]
struct CalendarList {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Deserialize)]
struct CreatedResource {
    id: String,
}

/// Google Calendar implementation of [`CalendarClient`]
pub struct GoogleCalendar {
    client: reqwest::Client,
    access_token: String,
    api_url: String,
    calendar_name: String,
    time_zone: Option<String>,
    calendar_id: OnceCell<String>,
}

impl GoogleCalendar {
    pub fn new(access_token: impl Into<String>, settings: &CalendarSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("aquatrack/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            api_url: settings.api_url.trim_end_matches('/').to_string(),
            calendar_name: settings.calendar_name.clone(),
            time_zone: settings.time_zone.clone(),
            calendar_id: OnceCell::new(),
        })
    }

    /// Id of the AquaTrack calendar, created on first use
    async fn calendar_id(&self) -> Result<&str> {
        let id = self
            .calendar_id
            .get_or_try_init(|| self.find_or_create_calendar())
            .await?;
        Ok(id.as_str())
    }

    async fn find_or_create_calendar(&self) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/users/me/calendarList", self.api_url))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let list: CalendarList = ensure_success(response, "list calendars", AppError::Calendar)
            .await?
            .json()
            .await?;

        if let Some(existing) = list
            .items
            .into_iter()
            .find(|cal| cal.summary == self.calendar_name)
        {
            return Ok(existing.id);
        }

        let response = self
            .client
            .post(format!("{}/calendars", self.api_url))
            .bearer_auth(&self.access_token)
            .json(&json!({ "summary": self.calendar_name }))
            .send()
            .await?;
        let created: CreatedResource =
            ensure_success(response, "create calendar", AppError::Calendar)
                .await?
                .json()
                .await?;

        tracing::info!("Created calendar '{}' ({})", self.calendar_name, created.id);
        Ok(created.id)
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendar {
    async fn create_event(&self, rule: &ReminderRule) -> Result<String> {
        let calendar_id = self.calendar_id().await?;
        let event = event_for_rule(rule, Local::now().naive_local(), self.time_zone.as_deref());

        let response = self
            .client
            .post(format!("{}/calendars/{}/events", self.api_url, calendar_id))
            .bearer_auth(&self.access_token)
            .json(&event)
            .send()
            .await?;
        let created: CreatedResource =
            ensure_success(response, "create calendar event", AppError::Calendar)
                .await?
                .json()
                .await?;

        tracing::debug!("Created calendar event {} for reminder {}", created.id, rule.id);
        Ok(created.id)
    }

    async fn delete_event(&self, event_id: &str) -> Result<()> {
        let calendar_id = self.calendar_id().await?;

        let response = self
            .client
            .delete(format!(
                "{}/calendars/{}/events/{}",
                self.api_url, calendar_id, event_id
            ))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        // Already gone counts as deleted
        let status = response.status().as_u16();
        if status == 404 || status == 410 {
            return Ok(());
        }
        ensure_success(response, "delete calendar event", AppError::Calendar).await?;

        tracing::debug!("Deleted calendar event {}", event_id);
        Ok(())
    }
}
