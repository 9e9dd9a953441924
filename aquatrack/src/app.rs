//! Application state and initialization
//!
//! This module prepares the data directory, loads settings and opens the
//! session. Remote adapters are only wired in when an access token is
//! available.

use crate::config::{NOTIFICATION_APP_NAME, SLOTS_DIR_NAME};
use crate::error::Result;
use crate::models::SessionIdentity;
use crate::services::settings::ReminderSettings;
use crate::services::{
    AppSettings, DesktopNotifier, GoogleCalendar, LogNotifier, NotificationSink, Session,
    SessionBuilder, SettingsService,
};
use crate::storage::{DriveStore, LocalStore};
use std::path::PathBuf;
use std::sync::Arc;

/// Who is signed in, as handed over by the OAuth flow
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub identity: Option<SessionIdentity>,
    pub access_token: Option<String>,
}

/// Central application state
#[derive(Clone)]
pub struct AppState {
    pub app_data_dir: PathBuf,
    pub settings_service: SettingsService,
    pub settings: AppSettings,
    pub session: Session,
}

/// Application setup - called once on startup
pub async fn setup(app_data_dir: PathBuf, credentials: Credentials) -> Result<AppState> {
    tracing::info!("Initializing application");
    tracing::info!("App data directory: {:?}", app_data_dir);

    // Create necessary directories
    std::fs::create_dir_all(&app_data_dir)?;

    let local = LocalStore::new(app_data_dir.join(SLOTS_DIR_NAME));
    local.initialize()?;

    let settings_service = SettingsService::new(app_data_dir.clone());
    let settings = settings_service.load().await?;

    let session = open_session(&settings, local, credentials).await?;

    tracing::info!("Application initialized successfully");

    Ok(AppState {
        app_data_dir,
        settings_service,
        settings,
        session,
    })
}

async fn open_session(
    settings: &AppSettings,
    local: LocalStore,
    credentials: Credentials,
) -> Result<Session> {
    let notifier = create_notifier(&settings.reminders).await;
    let mut builder = SessionBuilder::new(settings.clone(), local).notifier(notifier);

    let Some(identity) = credentials.identity else {
        return builder.start().await;
    };
    builder = builder.identity(identity);

    match credentials.access_token {
        Some(token) => {
            builder = builder.remote(Arc::new(DriveStore::new(token.clone(), &settings.sync)?));
            if settings.calendar.enabled {
                builder =
                    builder.calendar(Arc::new(GoogleCalendar::new(token, &settings.calendar)?));
            }
        }
        None => {
            tracing::warn!("No access token, running without remote sync");
        }
    }

    builder.start().await
}

/// Desktop notifications when enabled, the log otherwise
async fn create_notifier(settings: &ReminderSettings) -> Arc<dyn NotificationSink> {
    if !settings.desktop_notifications {
        tracing::info!("Desktop notifications disabled, reminders go to the log");
        return Arc::new(LogNotifier::new());
    }

    match tokio::task::spawn_blocking(|| DesktopNotifier::detect(NOTIFICATION_APP_NAME)).await {
        Ok(desktop) => Arc::new(desktop),
        Err(e) => {
            tracing::error!("Failed to check for desktop notifications: {}", e);
            Arc::new(LogNotifier::new())
        }
    }
}
