//! Session context
//!
//! A `Session` owns the signed-in user's snapshot for the lifetime of the
//! sign-in. It is created by reconciling local and remote data, hands the
//! snapshot to the ledger and the reminder scheduler, and writes every
//! mutation through to the local slot.
//!
//! Without an identity the session is purely in-memory: intake can be
//! logged but nothing is persisted, and reminder changes are refused.

use crate::error::{AppError, Result};
use crate::models::{
    History, IntakeEvent, ReminderRequest, ReminderRule, SessionIdentity, StoredSnapshot,
};
use crate::services::calendar::CalendarClient;
use crate::services::ledger::IntakeLedger;
use crate::services::reminders::{
    start_scheduler, FiredReminder, LogNotifier, NotificationPermission, NotificationSink,
    ReminderScheduler, SchedulerHandle,
};
use crate::services::settings::{AppSettings, PushPolicy};
use crate::services::streak::{calendar_heatmap, DaySummary};
use crate::services::sync::{PushWorker, SyncEngine, SyncOutcome};
use crate::storage::{LocalStore, RemoteStore};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Today's total just crossed the daily goal
    GoalReached { total: u32, streak: u32 },
    ReminderFired { id: String, label: String },
    /// Degraded functionality the user should know about
    Warning { message: String },
    SyncStateChanged { syncing: bool },
}

/// Result of logging one drink
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntakeOutcome {
    pub amount: u32,
    pub total: u32,
    pub daily_goal: u32,
    pub goal_reached: bool,
    pub streak: u32,
}

/// Builds a [`Session`] from settings and collaborators
pub struct SessionBuilder {
    settings: AppSettings,
    local: LocalStore,
    identity: Option<SessionIdentity>,
    remote: Option<Arc<dyn RemoteStore>>,
    calendar: Option<Arc<dyn CalendarClient>>,
    notifier: Arc<dyn NotificationSink>,
}

impl SessionBuilder {
    pub fn new(settings: AppSettings, local: LocalStore) -> Self {
        Self {
            settings,
            local,
            identity: None,
            remote: None,
            calendar: None,
            notifier: Arc::new(LogNotifier::new()),
        }
    }

    pub fn identity(mut self, identity: SessionIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn calendar(mut self, calendar: Arc<dyn CalendarClient>) -> Self {
        self.calendar = Some(calendar);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Reconcile data and open the session
    pub async fn start(self) -> Result<Session> {
        self.start_at(Utc::now()).await
    }

    pub async fn start_at(self, now: DateTime<Utc>) -> Result<Session> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let syncing = Arc::new(AtomicBool::new(false));

        let (identity, snapshot, pusher, sync_outcome) = match self.identity {
            None => {
                tracing::info!("Starting session without identity, nothing will be persisted");
                (None, StoredSnapshot::empty(now), None, None)
            }
            Some(identity) => {
                if identity.is_expired(now) {
                    return Err(AppError::SessionExpired);
                }

                syncing.store(true, Ordering::SeqCst);
                let engine = SyncEngine::new(self.local.clone(), self.remote.clone());
                let reconciled = engine.reconcile(&identity, now).await;
                syncing.store(false, Ordering::SeqCst);

                let pusher = self.remote.map(|remote| {
                    PushWorker::spawn(
                        remote,
                        reconciled.handle.clone(),
                        syncing.clone(),
                        events.clone(),
                    )
                });

                tracing::info!("Session started for {}", identity.email);
                (
                    Some(identity),
                    reconciled.snapshot,
                    pusher,
                    Some(reconciled.outcome),
                )
            }
        };

        let inner = SessionInner {
            ledger: IntakeLedger::new(self.settings.tracker.daily_goal_ml),
            push_policy: self.settings.sync.push_policy,
            notification_title: self.settings.reminders.notification_title.clone(),
            poll_interval: Duration::from_secs(self.settings.reminders.poll_interval_secs),
            local: self.local,
            calendar: self.calendar,
            notifier: self.notifier,
            events,
            syncing,
            permission_warned: AtomicBool::new(false),
            sync_outcome,
            state: Mutex::new(SessionState {
                identity,
                snapshot,
                reminders: ReminderScheduler::new(),
                pusher,
            }),
            scheduler: Mutex::new(None),
        };

        Ok(Session {
            inner: Arc::new(inner),
        })
    }
}

struct SessionState {
    identity: Option<SessionIdentity>,
    snapshot: StoredSnapshot,
    reminders: ReminderScheduler,
    pusher: Option<PushWorker>,
}

impl SessionState {
    /// Write the snapshot to the local slot and, when `push`, queue it for
    /// the remote
    fn persist(&self, local: &LocalStore, push: bool) {
        let Some(identity) = &self.identity else {
            return;
        };

        if let Err(e) = local.save(identity, &self.snapshot) {
            tracing::error!("Failed to save snapshot locally: {}", e);
        }

        if push {
            if let Some(pusher) = &self.pusher {
                pusher.submit(self.snapshot.clone());
            }
        }
    }
}

struct SessionInner {
    ledger: IntakeLedger,
    push_policy: PushPolicy,
    notification_title: String,
    poll_interval: Duration,
    local: LocalStore,
    calendar: Option<Arc<dyn CalendarClient>>,
    notifier: Arc<dyn NotificationSink>,
    events: broadcast::Sender<SessionEvent>,
    syncing: Arc<AtomicBool>,
    permission_warned: AtomicBool,
    sync_outcome: Option<SyncOutcome>,
    state: Mutex<SessionState>,
    scheduler: Mutex<Option<SchedulerHandle>>,
}

/// The signed-in user's session, cheap to clone
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

/// Non-owning reference to a [`Session`], held by background loops
#[derive(Clone)]
pub struct WeakSession {
    inner: Weak<SessionInner>,
}

impl WeakSession {
    pub fn upgrade(&self) -> Option<Session> {
        self.inner.upgrade().map(|inner| Session { inner })
    }
}

impl Session {
    pub fn downgrade(&self) -> WeakSession {
        WeakSession {
            inner: Arc::downgrade(&self.inner),
        }
    }

    // ===== Read API =====

    pub fn daily_goal(&self) -> u32 {
        self.inner.ledger.daily_goal()
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.syncing.load(Ordering::SeqCst)
    }

    /// How the snapshot was chosen at start, `None` without identity
    pub fn sync_outcome(&self) -> Option<SyncOutcome> {
        self.inner.sync_outcome
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn identity(&self) -> Option<SessionIdentity> {
        self.inner.state.lock().await.identity.clone()
    }

    pub async fn snapshot(&self) -> StoredSnapshot {
        self.inner.state.lock().await.snapshot.clone()
    }

    pub async fn history(&self) -> History {
        self.inner.state.lock().await.snapshot.history.clone()
    }

    pub async fn todays_total(&self) -> u32 {
        self.total_on(Local::now().date_naive()).await
    }

    pub async fn total_on(&self, date: NaiveDate) -> u32 {
        let state = self.inner.state.lock().await;
        self.inner.ledger.todays_total(&state.snapshot.history, date)
    }

    pub async fn todays_logs(&self) -> Vec<IntakeEvent> {
        self.logs_on(Local::now().date_naive()).await
    }

    pub async fn logs_on(&self, date: NaiveDate) -> Vec<IntakeEvent> {
        let state = self.inner.state.lock().await;
        self.inner
            .ledger
            .todays_logs(&state.snapshot.history, date)
            .to_vec()
    }

    pub async fn streak(&self) -> u32 {
        self.streak_on(Local::now().date_naive()).await
    }

    pub async fn streak_on(&self, today: NaiveDate) -> u32 {
        let state = self.inner.state.lock().await;
        self.inner.ledger.streak(&state.snapshot.history, today)
    }

    /// Consistency calendar for the last `days` days
    pub async fn heatmap(&self, days: u32) -> Vec<DaySummary> {
        self.heatmap_on(Local::now().date_naive(), days).await
    }

    pub async fn heatmap_on(&self, today: NaiveDate, days: u32) -> Vec<DaySummary> {
        let state = self.inner.state.lock().await;
        calendar_heatmap(&state.snapshot.history, today, self.daily_goal(), days)
    }

    pub async fn reminders(&self) -> Vec<ReminderRule> {
        self.inner.state.lock().await.snapshot.reminders.clone()
    }

    // ===== Intake =====

    /// Log a drink of `amount` ml now
    pub async fn record_intake(&self, amount: u32) -> IntakeOutcome {
        self.record_intake_at(amount, Local::now()).await
    }

    pub async fn record_intake_at(&self, amount: u32, now: DateTime<Local>) -> IntakeOutcome {
        let (recorded, streak) = {
            let mut state = self.inner.state.lock().await;
            let recorded = self.inner.ledger.record(&mut state.snapshot, amount, now);
            state.persist(
                &self.inner.local,
                self.inner.push_policy == PushPolicy::EveryWrite,
            );
            let streak = self
                .inner
                .ledger
                .streak(&state.snapshot.history, now.date_naive());
            (recorded, streak)
        };

        if recorded.goal_reached {
            tracing::info!(
                "Daily goal reached ({} ml), streak is now {} days",
                recorded.total_after,
                streak
            );
            self.emit(SessionEvent::GoalReached {
                total: recorded.total_after,
                streak,
            });
        }

        IntakeOutcome {
            amount,
            total: recorded.total_after,
            daily_goal: self.daily_goal(),
            goal_reached: recorded.goal_reached,
            streak,
        }
    }

    // ===== Reminders =====

    /// Validate and store a reminder, then mirror it to the calendar
    pub async fn save_reminder(&self, request: ReminderRequest) -> Result<ReminderRule> {
        let mut rule = request.into_rule()?;

        let previous_event = {
            let mut state = self.inner.state.lock().await;
            if state.identity.is_none() {
                return Err(AppError::NoSession);
            }

            let previous_event = state
                .snapshot
                .reminder(&rule.id)
                .and_then(|existing| existing.calendar_event_id.clone());
            rule.calendar_event_id = previous_event.clone();

            state.snapshot.upsert_reminder(rule.clone());
            // An edited or re-enabled rule may fire again today
            state.reminders.forget(&rule.id);
            state.snapshot.touch(Utc::now());
            state.persist(&self.inner.local, true);
            previous_event
        };

        tracing::info!("Saved reminder {} ({})", rule.id, rule.describe());
        self.warn_if_notifications_denied();

        if let Some(calendar) = self.inner.calendar.clone() {
            rule = self
                .mirror_to_calendar(calendar.as_ref(), rule, previous_event)
                .await;
        }

        Ok(rule)
    }

    /// Remove a reminder and its calendar event
    pub async fn delete_reminder(&self, id: &str) -> Result<()> {
        let removed = {
            let mut state = self.inner.state.lock().await;
            if state.identity.is_none() {
                return Err(AppError::NoSession);
            }

            let removed = state
                .snapshot
                .remove_reminder(id)
                .ok_or_else(|| AppError::ReminderNotFound(id.to_string()))?;
            state.reminders.forget(id);
            state.snapshot.touch(Utc::now());
            state.persist(&self.inner.local, true);
            removed
        };

        tracing::info!("Deleted reminder {}", id);

        if let (Some(calendar), Some(event_id)) =
            (&self.inner.calendar, removed.calendar_event_id.as_deref())
        {
            if let Err(e) = calendar.delete_event(event_id).await {
                tracing::warn!("Failed to delete calendar event {}: {}", event_id, e);
                self.warn(format!("Could not remove the calendar event: {}", e));
            }
        }

        Ok(())
    }

    async fn mirror_to_calendar(
        &self,
        calendar: &dyn CalendarClient,
        mut rule: ReminderRule,
        previous_event: Option<String>,
    ) -> ReminderRule {
        if let Some(event_id) = previous_event {
            if let Err(e) = calendar.delete_event(&event_id).await {
                tracing::warn!("Failed to delete calendar event {}: {}", event_id, e);
                self.warn(format!("Could not remove the old calendar event: {}", e));
            }
        }

        let event_id = if rule.enabled {
            match calendar.create_event(&rule).await {
                Ok(id) => Some(id),
                Err(e) => {
                    tracing::warn!("Failed to create calendar event for {}: {}", rule.id, e);
                    self.warn(format!("Reminder saved, but calendar sync failed: {}", e));
                    None
                }
            }
        } else {
            None
        };
        rule.calendar_event_id = event_id.clone();

        let mut state = self.inner.state.lock().await;
        let changed = match state.snapshot.reminders.iter_mut().find(|r| r.id == rule.id) {
            Some(stored) if stored.calendar_event_id != event_id => {
                stored.calendar_event_id = event_id;
                true
            }
            _ => false,
        };
        if changed {
            state.snapshot.touch(Utc::now());
            state.persist(&self.inner.local, true);
        }

        rule
    }

    /// Evaluate reminders at local time `now` and deliver what fired
    pub async fn run_reminder_tick(&self, now: NaiveDateTime) -> Vec<FiredReminder> {
        let fired = {
            let mut guard = self.inner.state.lock().await;
            let state = &mut *guard;
            let fired = state.reminders.tick(&mut state.snapshot.reminders, now);

            if fired.iter().any(|f| f.disabled) {
                state.snapshot.touch(Utc::now());
                state.persist(&self.inner.local, true);
            }
            fired
        };

        let deliver = self.inner.notifier.permission() == NotificationPermission::Granted;

        for reminder in &fired {
            if deliver {
                if let Err(e) = self
                    .inner
                    .notifier
                    .show(&self.inner.notification_title, &reminder.body)
                {
                    tracing::error!("Failed to send notification: {}", e);
                }
            } else {
                tracing::debug!(
                    "Notifications not permitted, reminder {} not delivered",
                    reminder.id
                );
            }

            self.emit(SessionEvent::ReminderFired {
                id: reminder.id.clone(),
                label: reminder.label.clone(),
            });
        }

        fired
    }

    /// Start the reminder polling loop; no-op when already running
    pub async fn start_reminders(&self) {
        let mut scheduler = self.inner.scheduler.lock().await;
        if scheduler.is_none() {
            *scheduler = Some(start_scheduler(self.downgrade(), self.inner.poll_interval));
        }
    }

    // ===== Lifecycle =====

    /// End the session.
    ///
    /// Stops the reminder loop, drops the fired-today memo, waits for the
    /// last queued push and empties the in-memory state. The local slot is
    /// kept as the cache for the next sign-in.
    pub async fn logout(&self) {
        let scheduler = self.inner.scheduler.lock().await.take();
        if let Some(handle) = scheduler {
            handle.stop().await;
        }

        let pusher = {
            let mut state = self.inner.state.lock().await;
            state.reminders.reset();
            if let Some(identity) = state.identity.take() {
                tracing::info!("Logging out {}", identity.email);
            }
            state.snapshot = StoredSnapshot::empty(Utc::now());
            state.pusher.take()
        };

        if let Some(pusher) = pusher {
            pusher.shutdown().await;
        }
    }

    /// Delete the signed-in user's local slot (account switch)
    pub async fn forget_local_data(&self) -> Result<()> {
        let state = self.inner.state.lock().await;
        let identity = state.identity.as_ref().ok_or(AppError::NoSession)?;
        self.inner.local.clear(identity)
    }

    fn warn_if_notifications_denied(&self) {
        if self.inner.notifier.permission() == NotificationPermission::Denied
            && !self.inner.permission_warned.swap(true, Ordering::SeqCst)
        {
            tracing::warn!("Notification permission denied");
            self.warn(
                "Notification permission denied. Reminders are saved but won't be delivered."
                    .to_string(),
            );
        }
    }

    fn warn(&self, message: String) {
        self.emit(SessionEvent::Warning { message });
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }
}
