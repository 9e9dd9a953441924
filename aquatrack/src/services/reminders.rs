//! Reminder scheduler
//!
//! Evaluates reminder rules once per polling tick. A rule fires at most
//! once per calendar day, in the tick that falls inside its minute. Missed
//! minutes are not caught up. One-shot rules disable themselves after
//! firing.

use crate::error::{AppError, Result};
use crate::models::{ReminderRule, Repeat};
use crate::services::session::WeakSession;
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use notify_rust::Notification;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Whether the platform lets us show notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Granted,
    Denied,
}

/// Capability to display a system notification
pub trait NotificationSink: Send + Sync {
    fn permission(&self) -> NotificationPermission {
        NotificationPermission::Granted
    }

    fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Sink that writes notifications to the log
#[derive(Debug, Clone)]
pub struct LogNotifier {
    permission: NotificationPermission,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self {
            permission: NotificationPermission::Granted,
        }
    }

    pub fn denied() -> Self {
        Self {
            permission: NotificationPermission::Denied,
        }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationSink for LogNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        tracing::info!("Notification: {} - {}", title, body);
        Ok(())
    }
}

/// Sink that shows system notifications through the desktop's
/// notification service
#[derive(Debug)]
pub struct DesktopNotifier {
    app_name: String,
    refused: AtomicBool,
}

impl DesktopNotifier {
    /// Check that the platform accepts notifications.
    ///
    /// Blocks on the session bus on Linux; call it off the async runtime.
    pub fn detect(app_name: &str) -> Self {
        let notifier = Self::with_permission(app_name, NotificationPermission::Granted);

        #[cfg(all(unix, not(target_os = "macos")))]
        {
            match notify_rust::get_server_information() {
                Ok(server) => {
                    tracing::debug!("Notification server: {} {}", server.name, server.version);
                }
                Err(e) => {
                    tracing::warn!("No desktop notification service available: {}", e);
                    notifier.refused.store(true, Ordering::SeqCst);
                }
            }
        }

        notifier
    }

    pub fn with_permission(app_name: &str, permission: NotificationPermission) -> Self {
        Self {
            app_name: app_name.to_string(),
            refused: AtomicBool::new(permission == NotificationPermission::Denied),
        }
    }

    /// The platform rejected a notification; stop delivering for this session
    fn refuse(&self, reason: &str) -> AppError {
        if !self.refused.swap(true, Ordering::SeqCst) {
            tracing::warn!("Desktop notifications refused: {}", reason);
        }
        AppError::Notification(reason.to_string())
    }
}

impl NotificationSink for DesktopNotifier {
    fn permission(&self) -> NotificationPermission {
        if self.refused.load(Ordering::SeqCst) {
            NotificationPermission::Denied
        } else {
            NotificationPermission::Granted
        }
    }

    fn show(&self, title: &str, body: &str) -> Result<()> {
        if self.refused.load(Ordering::SeqCst) {
            return Err(AppError::Notification(
                "desktop notifications are not permitted".to_string(),
            ));
        }

        Notification::new()
            .appname(&self.app_name)
            .summary(title)
            .body(body)
            .show()
            .map_err(|e| self.refuse(&e.to_string()))?;

        tracing::debug!("Notification shown: {}", title);
        Ok(())
    }
}

/// A rule that fired during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredReminder {
    pub id: String,
    pub label: String,
    pub body: String,
    /// The rule was one-shot and is now disabled
    pub disabled: bool,
}

/// Tick evaluation state: which rule fired on which day.
///
/// Transient; a new session starts with an empty memo.
#[derive(Debug, Default)]
pub struct ReminderScheduler {
    fired_on: HashMap<String, NaiveDate>,
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `rules` at local time `now`
    pub fn tick(&mut self, rules: &mut [ReminderRule], now: NaiveDateTime) -> Vec<FiredReminder> {
        let today = now.date();
        let weekday = now.weekday().num_days_from_sunday() as u8;

        self.fired_on
            .retain(|id, _| rules.iter().any(|rule| &rule.id == id));

        let mut fired = Vec::new();

        for rule in rules.iter_mut().filter(|rule| rule.enabled) {
            if self.fired_on.get(&rule.id) == Some(&today) {
                continue;
            }
            if !rule.time.matches(now.time()) {
                continue;
            }
            if !rule.applies_on(weekday) {
                continue;
            }

            self.fired_on.insert(rule.id.clone(), today);

            let disabled = rule.repeat == Repeat::Once;
            if disabled {
                rule.enabled = false;
            }

            tracing::info!("Reminder {} fired ({})", rule.id, rule.describe());

            fired.push(FiredReminder {
                id: rule.id.clone(),
                label: rule.label.clone(),
                body: rule.notification_body().to_string(),
                disabled,
            });
        }

        fired
    }

    /// Drop the fired-today mark of one rule, e.g. after it was edited
    pub fn forget(&mut self, id: &str) {
        self.fired_on.remove(id);
    }

    /// Forget every fired-today mark
    pub fn reset(&mut self) {
        self.fired_on.clear();
    }

    pub fn fired_today(&self, id: &str, today: NaiveDate) -> bool {
        self.fired_on.get(id) == Some(&today)
    }
}

/// Handle to a running polling loop
pub struct SchedulerHandle {
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for the current tick to finish
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            tracing::error!("Reminder loop ended abnormally: {}", e);
        }
        tracing::info!("Reminders scheduler stopped");
    }
}

/// Start the polling loop for `session`.
///
/// The loop only holds a weak reference and ends once the session is gone.
pub fn start_scheduler(session: WeakSession, period: Duration) -> SchedulerHandle {
    let shutdown = Arc::new(Notify::new());
    let stop = shutdown.clone();

    let task = tokio::spawn(async move {
        tracing::info!("Starting reminders scheduler ({:?} interval)", period);

        let mut interval = tokio::time::interval(period);
        // A device that slept through a minute does not catch up
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let Some(session) = session.upgrade() else {
                        tracing::debug!("Session dropped, reminder loop exiting");
                        break;
                    };
                    session.run_reminder_tick(Local::now().naive_local()).await;
                }
                _ = stop.notified() => {
                    break;
                }
            }
        }
    });

    SchedulerHandle { shutdown, task }
}
