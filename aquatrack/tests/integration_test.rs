//! Integration tests for AquaTrack
//!
//! These tests drive a full session end to end including:
//! - Intake logging and goal detection
//! - Local/remote reconciliation
//! - Reminder ticks, persistence and calendar mirroring

use aquatrack::error::{AppError, Result};
use aquatrack::models::{ReminderRequest, ReminderRule, Repeat, SessionIdentity, StoredSnapshot};
use aquatrack::services::calendar::CalendarClient;
use aquatrack::services::{
    AppSettings, NotificationPermission, NotificationSink, PushPolicy, Session, SessionBuilder,
    SessionEvent, SyncOutcome,
};
use aquatrack::storage::{FileHandle, LocalStore, RemoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ===== Test doubles =====

/// Remote document held in memory
#[derive(Default)]
struct MemoryRemote {
    document: Mutex<Option<StoredSnapshot>>,
    offline: bool,
    /// Lookups that time out before the remote answers
    failing_lookups: Mutex<usize>,
    lookups: Mutex<usize>,
    writes: Mutex<usize>,
}

impl MemoryRemote {
    fn holding(snapshot: StoredSnapshot) -> Self {
        Self {
            document: Mutex::new(Some(snapshot)),
            ..Default::default()
        }
    }

    fn offline() -> Self {
        Self {
            offline: true,
            ..Default::default()
        }
    }

    fn failing_lookups(count: usize) -> Self {
        Self {
            failing_lookups: Mutex::new(count),
            ..Default::default()
        }
    }

    fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }

    fn document(&self) -> Option<StoredSnapshot> {
        self.document.lock().unwrap().clone()
    }

    fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(AppError::Remote("network unreachable".to_string()));
        }
        Ok(())
    }
}

fn doc_handle() -> FileHandle {
    FileHandle {
        id: "doc-1".to_string(),
        name: "aquatrack.data.json".to_string(),
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn find(&self) -> Result<Option<FileHandle>> {
        *self.lookups.lock().unwrap() += 1;
        self.check_online()?;
        {
            let mut failing = self.failing_lookups.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(AppError::Remote("lookup timed out".to_string()));
            }
        }
        Ok(self.document.lock().unwrap().as_ref().map(|_| doc_handle()))
    }

    async fn read(&self, _handle: &FileHandle) -> Result<StoredSnapshot> {
        self.check_online()?;
        self.document()
            .ok_or_else(|| AppError::Remote("not found".to_string()))
    }

    async fn create(&self, snapshot: &StoredSnapshot) -> Result<FileHandle> {
        self.check_online()?;
        *self.writes.lock().unwrap() += 1;
        *self.document.lock().unwrap() = Some(snapshot.clone());
        Ok(doc_handle())
    }

    async fn update(&self, handle: &FileHandle, snapshot: &StoredSnapshot) -> Result<FileHandle> {
        self.check_online()?;
        *self.writes.lock().unwrap() += 1;
        *self.document.lock().unwrap() = Some(snapshot.clone());
        Ok(handle.clone())
    }
}

/// Calendar that records created and deleted events
#[derive(Default)]
struct MemoryCalendar {
    created: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    failing: bool,
}

#[async_trait]
impl CalendarClient for MemoryCalendar {
    async fn create_event(&self, rule: &ReminderRule) -> Result<String> {
        if self.failing {
            return Err(AppError::Calendar("quota exceeded".to_string()));
        }
        let mut created = self.created.lock().unwrap();
        let id = format!("event-{}-{}", rule.id, created.len());
        created.push(id.clone());
        Ok(id)
    }

    async fn delete_event(&self, event_id: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(event_id.to_string());
        Ok(())
    }
}

/// Notifier that keeps every shown notification
struct RecordingNotifier {
    permission: NotificationPermission,
    shown: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn new(permission: NotificationPermission) -> Self {
        Self {
            permission,
            shown: Mutex::new(Vec::new()),
        }
    }

    fn shown(&self) -> usize {
        self.shown.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingNotifier {
    fn permission(&self) -> NotificationPermission {
        self.permission
    }

    fn show(&self, _title: &str, body: &str) -> Result<()> {
        self.shown.lock().unwrap().push(body.to_string());
        Ok(())
    }
}

// ===== Helpers =====

fn identity() -> SessionIdentity {
    SessionIdentity::new("ana@example.com")
}

fn create_local_store() -> (LocalStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let local = LocalStore::new(temp_dir.path().join("slots"));
    local.initialize().unwrap();
    (local, temp_dir)
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 12).unwrap()
}

fn local_at(date: NaiveDate, hour: u32) -> DateTime<Local> {
    Local
        .from_local_datetime(&date.and_hms_opt(hour, 0, 0).unwrap())
        .earliest()
        .unwrap()
}

fn wall_clock(date: NaiveDate, hour: u32, minute: u32, second: u32) -> NaiveDateTime {
    date.and_hms_opt(hour, minute, second).unwrap()
}

fn reminder(id: &str, time: &str, repeat: Repeat) -> ReminderRequest {
    ReminderRequest {
        id: Some(id.to_string()),
        time: time.to_string(),
        repeat,
        ..Default::default()
    }
}

async fn start_session(local: &LocalStore, remote: Arc<MemoryRemote>) -> Session {
    SessionBuilder::new(AppSettings::default(), local.clone())
        .identity(identity())
        .remote(remote)
        .start()
        .await
        .unwrap()
}

// ===== Intake =====

#[tokio::test]
async fn test_goal_notification_fires_once_per_day() {
    let (local, _temp) = create_local_store();
    let session = start_session(&local, Arc::new(MemoryRemote::default())).await;
    let mut events = session.subscribe();

    let morning = session.record_intake_at(1000, local_at(day(), 8)).await;
    let noon = session.record_intake_at(1000, local_at(day(), 12)).await;
    let evening = session.record_intake_at(1500, local_at(day(), 18)).await;

    assert_eq!(session.total_on(day()).await, 3500);
    assert!(!morning.goal_reached);
    assert!(!noon.goal_reached);
    assert!(evening.goal_reached);

    let goal_events: Vec<SessionEvent> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, SessionEvent::GoalReached { .. }))
        .collect();
    assert_eq!(
        goal_events,
        vec![SessionEvent::GoalReached {
            total: 3500,
            streak: 1
        }]
    );

    // Every mutation is written through to the local slot
    let stored = local.load(&identity()).unwrap();
    assert_eq!(stored.history.total_for(day()), 3500);
    assert_eq!(stored.history.bucket(day()).len(), 3);
}

#[tokio::test]
async fn test_streak_skips_unfinished_today() {
    let (local, _temp) = create_local_store();
    let session = start_session(&local, Arc::new(MemoryRemote::default())).await;

    let d3 = day() - Duration::days(3);
    let d2 = day() - Duration::days(2);
    let d1 = day() - Duration::days(1);
    session.record_intake_at(1000, local_at(d3, 10)).await;
    session.record_intake_at(3000, local_at(d2, 10)).await;
    session.record_intake_at(2000, local_at(d1, 9)).await;
    session.record_intake_at(1200, local_at(d1, 17)).await;

    assert_eq!(session.streak_on(day()).await, 2);

    session.record_intake_at(500, local_at(day(), 8)).await;
    assert_eq!(session.streak_on(day()).await, 2);

    session.record_intake_at(2500, local_at(day(), 20)).await;
    assert_eq!(session.streak_on(day()).await, 3);
}

#[tokio::test]
async fn test_intake_pushes_depend_on_policy() {
    let (local, _temp) = create_local_store();

    let remote = Arc::new(MemoryRemote::default());
    let session = start_session(&local, remote.clone()).await;
    session.record_intake_at(250, local_at(day(), 9)).await;
    session.logout().await;
    // Only the initial document was written
    assert_eq!(remote.writes(), 1);
    assert!(remote.document().unwrap().history.is_empty());

    let mut settings = AppSettings::default();
    settings.sync.push_policy = PushPolicy::EveryWrite;
    let remote = Arc::new(MemoryRemote::default());
    let session = SessionBuilder::new(settings, local.clone())
        .identity(SessionIdentity::new("ben@example.com"))
        .remote(remote.clone())
        .start()
        .await
        .unwrap();
    session.record_intake_at(250, local_at(day(), 9)).await;
    session.record_intake_at(500, local_at(day(), 10)).await;
    session.logout().await;

    assert!(remote.writes() >= 2);
    assert_eq!(remote.document().unwrap().history.total_for(day()), 750);
}

// ===== Reconciliation =====

#[tokio::test]
async fn test_newer_remote_overwrites_local() {
    let (local, _temp) = create_local_store();

    let mut older = StoredSnapshot::empty(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    older.upsert_reminder(reminder("local", "08:00", Repeat::Daily).into_rule().unwrap());
    local.save(&identity(), &older).unwrap();

    let mut newer = StoredSnapshot::empty(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    newer.upsert_reminder(reminder("remote", "09:00", Repeat::Daily).into_rule().unwrap());
    let remote = Arc::new(MemoryRemote::holding(newer.clone()));

    let session = start_session(&local, remote.clone()).await;

    assert_eq!(session.sync_outcome(), Some(SyncOutcome::RemoteWon));
    assert_eq!(session.snapshot().await, newer);
    assert_eq!(local.load(&identity()).unwrap(), newer);
    assert_eq!(remote.writes(), 0);
}

#[tokio::test]
async fn test_newer_local_is_pushed() {
    let (local, _temp) = create_local_store();

    let older = StoredSnapshot::empty(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    let mut newer = StoredSnapshot::empty(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap());
    newer.upsert_reminder(reminder("local", "08:00", Repeat::Daily).into_rule().unwrap());
    local.save(&identity(), &newer).unwrap();
    let remote = Arc::new(MemoryRemote::holding(older));

    let session = start_session(&local, remote.clone()).await;

    assert_eq!(session.sync_outcome(), Some(SyncOutcome::LocalWon));
    assert_eq!(remote.writes(), 1);
    assert_eq!(remote.document().unwrap(), newer);
}

#[tokio::test]
async fn test_offline_remote_falls_back_to_local() {
    let (local, _temp) = create_local_store();
    let mut cached = StoredSnapshot::empty(Utc::now());
    cached.upsert_reminder(reminder("cached", "10:00", Repeat::Daily).into_rule().unwrap());
    local.save(&identity(), &cached).unwrap();

    let remote = Arc::new(MemoryRemote::offline());
    let session = start_session(&local, remote.clone()).await;

    assert_eq!(session.sync_outcome(), Some(SyncOutcome::LocalOnly));
    assert_eq!(session.reminders().await.len(), 1);
    assert!(!session.is_syncing());
    // The push of local data was attempted after the failed lookup
    assert_eq!(remote.lookups(), 2);
    assert_eq!(remote.writes(), 0);
}

#[tokio::test]
async fn test_local_data_pushed_after_lookup_failure() {
    let (local, _temp) = create_local_store();
    let mut cached = StoredSnapshot::empty(Utc::now());
    cached.upsert_reminder(reminder("cached", "10:00", Repeat::Daily).into_rule().unwrap());
    local.save(&identity(), &cached).unwrap();

    let remote = Arc::new(MemoryRemote::failing_lookups(1));
    let session = start_session(&local, remote.clone()).await;

    assert_eq!(session.sync_outcome(), Some(SyncOutcome::LocalOnly));
    assert_eq!(remote.writes(), 1);
    let pushed = remote.document().unwrap();
    assert_eq!(pushed.reminders[0].id, "cached");
    assert_eq!(pushed.last_modified, cached.last_modified);
}

#[tokio::test]
async fn test_data_survives_new_session() {
    let (local, _temp) = create_local_store();
    let remote = Arc::new(MemoryRemote::default());

    let first = start_session(&local, remote.clone()).await;
    first.record_intake_at(750, local_at(day(), 9)).await;
    first
        .save_reminder(reminder("r1", "09:30", Repeat::Daily))
        .await
        .unwrap();
    first.logout().await;

    let second = start_session(&local, remote).await;
    assert_eq!(second.sync_outcome(), Some(SyncOutcome::RemoteWon));
    assert_eq!(second.total_on(day()).await, 750);
    assert_eq!(second.reminders().await[0].id, "r1");
}

#[tokio::test]
async fn test_forget_local_data_clears_slot() {
    let (local, _temp) = create_local_store();
    let session = start_session(&local, Arc::new(MemoryRemote::default())).await;
    assert!(local.exists(&identity()));

    session.forget_local_data().await.unwrap();

    assert!(!local.exists(&identity()));
}

// ===== Reminders =====

#[tokio::test]
async fn test_once_rule_is_persisted_disabled() {
    let (local, _temp) = create_local_store();
    let remote = Arc::new(MemoryRemote::default());
    let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
    let session = SessionBuilder::new(AppSettings::default(), local.clone())
        .identity(identity())
        .remote(remote.clone())
        .notifier(notifier.clone())
        .start()
        .await
        .unwrap();

    session
        .save_reminder(reminder("once", "07:00", Repeat::Once))
        .await
        .unwrap();

    let fired = session.run_reminder_tick(wall_clock(day(), 7, 0, 10)).await;
    assert_eq!(fired.len(), 1);
    assert!(fired[0].disabled);

    let stored = local.load(&identity()).unwrap();
    assert!(!stored.reminder("once").unwrap().enabled);

    let tomorrow = day() + Duration::days(1);
    assert!(session
        .run_reminder_tick(wall_clock(tomorrow, 7, 0, 10))
        .await
        .is_empty());
    assert_eq!(notifier.shown(), 1);

    session.logout().await;
    assert!(!remote.document().unwrap().reminder("once").unwrap().enabled);
}

#[tokio::test]
async fn test_daily_rule_fires_twice_in_two_days() {
    let (local, _temp) = create_local_store();
    let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Granted));
    let session = SessionBuilder::new(AppSettings::default(), local)
        .identity(identity())
        .notifier(notifier.clone())
        .start()
        .await
        .unwrap();
    let mut events = session.subscribe();

    session
        .save_reminder(ReminderRequest {
            label: "Morning glass".to_string(),
            ..reminder("daily", "09:15", Repeat::Daily)
        })
        .await
        .unwrap();

    let mut now = wall_clock(day(), 0, 0, 0);
    let end = now + Duration::hours(48);
    while now < end {
        session.run_reminder_tick(now).await;
        now += Duration::seconds(30);
    }

    assert_eq!(notifier.shown(), 2);
    assert_eq!(
        notifier.shown.lock().unwrap().clone(),
        vec!["Morning glass".to_string(), "Morning glass".to_string()]
    );

    let fired: Vec<SessionEvent> = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, SessionEvent::ReminderFired { .. }))
        .collect();
    assert_eq!(fired.len(), 2);
}

#[tokio::test]
async fn test_denied_permission_skips_delivery_only() {
    let (local, _temp) = create_local_store();
    let notifier = Arc::new(RecordingNotifier::new(NotificationPermission::Denied));
    let session = SessionBuilder::new(AppSettings::default(), local)
        .identity(identity())
        .notifier(notifier.clone())
        .start()
        .await
        .unwrap();

    session
        .save_reminder(reminder("once", "07:00", Repeat::Once))
        .await
        .unwrap();

    let fired = session.run_reminder_tick(wall_clock(day(), 7, 0, 0)).await;

    assert_eq!(fired.len(), 1);
    assert_eq!(notifier.shown(), 0);
    assert!(!session.reminders().await[0].enabled);
}

#[tokio::test]
async fn test_invalid_reminder_changes_nothing() {
    let (local, _temp) = create_local_store();
    let session = start_session(&local, Arc::new(MemoryRemote::default())).await;
    let before = session.snapshot().await;

    let missing_days = session
        .save_reminder(reminder("custom", "18:00", Repeat::CustomDays))
        .await;
    let missing_time = session.save_reminder(reminder("blank", "", Repeat::Daily)).await;

    match missing_days {
        Err(AppError::Validation(message)) => {
            assert_eq!(message, "Please select at least one day for custom reminders.")
        }
        other => panic!("expected validation error, got {:?}", other),
    }
    assert!(matches!(missing_time, Err(AppError::Validation(_))));
    assert_eq!(session.snapshot().await, before);
    assert_eq!(local.load(&identity()).unwrap(), before);
}

#[tokio::test]
async fn test_edited_reminder_fires_at_new_time_same_day() {
    let (local, _temp) = create_local_store();
    let session = start_session(&local, Arc::new(MemoryRemote::default())).await;

    session.save_reminder(reminder("r", "09:00", Repeat::Daily)).await.unwrap();
    assert_eq!(session.run_reminder_tick(wall_clock(day(), 9, 0, 5)).await.len(), 1);

    session.save_reminder(reminder("r", "15:00", Repeat::Daily)).await.unwrap();
    assert_eq!(session.run_reminder_tick(wall_clock(day(), 15, 0, 5)).await.len(), 1);

    session.save_reminder(reminder("o", "16:00", Repeat::Once)).await.unwrap();
    assert_eq!(session.run_reminder_tick(wall_clock(day(), 16, 0, 5)).await.len(), 1);

    // Saving the fired one-shot again re-arms it
    session.save_reminder(reminder("o", "17:00", Repeat::Once)).await.unwrap();
    let fired = session.run_reminder_tick(wall_clock(day(), 17, 0, 5)).await;
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].id, "o");
}

#[tokio::test]
async fn test_delete_unknown_reminder() {
    let (local, _temp) = create_local_store();
    let session = start_session(&local, Arc::new(MemoryRemote::default())).await;

    let result = session.delete_reminder("missing").await;

    assert!(matches!(result, Err(AppError::ReminderNotFound(id)) if id == "missing"));
}

// ===== Calendar =====

#[tokio::test]
async fn test_calendar_events_follow_reminder() {
    let (local, _temp) = create_local_store();
    let calendar = Arc::new(MemoryCalendar::default());
    let session = SessionBuilder::new(AppSettings::default(), local.clone())
        .identity(identity())
        .calendar(calendar.clone())
        .start()
        .await
        .unwrap();

    let saved = session
        .save_reminder(reminder("r1", "09:00", Repeat::Daily))
        .await
        .unwrap();
    let first_event = saved.calendar_event_id.clone().unwrap();
    assert_eq!(
        local.load(&identity()).unwrap().reminder("r1").unwrap().calendar_event_id,
        Some(first_event.clone())
    );

    let resaved = session
        .save_reminder(reminder("r1", "10:00", Repeat::Daily))
        .await
        .unwrap();
    assert_eq!(calendar.deleted.lock().unwrap().clone(), vec![first_event]);
    let second_event = resaved.calendar_event_id.clone().unwrap();

    session.delete_reminder("r1").await.unwrap();
    assert_eq!(calendar.deleted.lock().unwrap().last(), Some(&second_event));
    assert!(session.reminders().await.is_empty());
}

#[tokio::test]
async fn test_calendar_failure_only_warns() {
    let (local, _temp) = create_local_store();
    let calendar = Arc::new(MemoryCalendar {
        failing: true,
        ..Default::default()
    });
    let session = SessionBuilder::new(AppSettings::default(), local)
        .identity(identity())
        .calendar(calendar)
        .start()
        .await
        .unwrap();
    let mut events = session.subscribe();

    let saved = session
        .save_reminder(reminder("r1", "09:00", Repeat::Daily))
        .await
        .unwrap();

    assert!(saved.calendar_event_id.is_none());
    assert_eq!(session.reminders().await.len(), 1);
    assert!(matches!(
        events.try_recv().unwrap(),
        SessionEvent::Warning { .. }
    ));
}

// ===== Identity =====

#[tokio::test]
async fn test_anonymous_session_refuses_reminders() {
    let (local, temp) = create_local_store();
    let session = SessionBuilder::new(AppSettings::default(), local)
        .start()
        .await
        .unwrap();

    session.record_intake_at(500, local_at(day(), 9)).await;

    assert_eq!(session.total_on(day()).await, 500);
    assert!(matches!(
        session
            .save_reminder(reminder("r1", "09:00", Repeat::Daily))
            .await,
        Err(AppError::NoSession)
    ));
    assert_eq!(
        std::fs::read_dir(temp.path().join("slots")).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_expired_identity_cannot_start() {
    let (local, _temp) = create_local_store();
    let expired = identity().with_expiry(Utc::now() - Duration::minutes(5));

    let result = SessionBuilder::new(AppSettings::default(), local)
        .identity(expired)
        .start()
        .await;

    assert!(matches!(result, Err(AppError::SessionExpired)));
}

// ===== Commands =====

#[tokio::test]
async fn test_commands_over_app_state() {
    use aquatrack::app::{setup, Credentials};
    use aquatrack::commands;
    use aquatrack::services::settings::TrackerSettings;

    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("settings.json"),
        r#"{"reminders": {"desktop_notifications": false}}"#,
    )
    .unwrap();
    let credentials = Credentials {
        identity: Some(identity()),
        access_token: None,
    };
    let state = setup(temp_dir.path().to_path_buf(), credentials)
        .await
        .unwrap();

    assert!(matches!(
        commands::add_water(&state, 0).await,
        Err(AppError::Validation(_))
    ));
    assert!(commands::add_water(&state, 6000).await.is_err());

    let first = commands::add_water_at(&state, 2500, local_at(day(), 9))
        .await
        .unwrap();
    assert!(first.message.is_none());
    let second = commands::add_water_at(&state, 500, local_at(day(), 11))
        .await
        .unwrap();
    let message = second.message.unwrap();
    assert_eq!(message.description, "You've started a 1-day streak!");

    let status = commands::get_status_on(&state, day()).await.unwrap();
    assert_eq!(status.total, 3000);
    assert_eq!(status.percent, 100);
    assert_eq!(status.remaining, 0);
    assert_eq!(status.logs[0].amount, 500);
    assert_eq!(status.presets, vec![250, 500, 750]);

    let history = commands::get_history_on(&state, 3, day()).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[0].goal_met);
    assert_eq!(history[0].drinks, 2);

    let saved = commands::save_reminder(
        &state,
        ReminderRequest {
            time: "08:30".to_string(),
            repeat: Repeat::CustomDays,
            days: vec![1, 3],
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(saved.reminder.schedule, "Mo, We at 08:30");
    assert_eq!(commands::list_reminders(&state).await.unwrap().len(), 1);
    commands::delete_reminder(&state, &saved.reminder.rule.id)
        .await
        .unwrap();
    assert!(commands::list_reminders(&state).await.unwrap().is_empty());

    commands::update_tracker_settings(
        &state,
        TrackerSettings {
            daily_goal_ml: 2000,
            intake_presets: vec![330],
        },
    )
    .await
    .unwrap();
    let settings = commands::get_settings(&state).await.unwrap();
    assert_eq!(settings.tracker.daily_goal_ml, 2000);

    let info = commands::get_app_info(&state).await.unwrap();
    assert_eq!(info.signed_in_as.as_deref(), Some("ana@example.com"));

    state.session.logout().await;
}
