//! Settings-related commands
//!
//! Changes take effect the next time a session is opened.

use crate::app::AppState;
use crate::error::Result;
use crate::services::settings::{AppSettings, TrackerSettings};

/// Get current settings
pub async fn get_settings(state: &AppState) -> Result<AppSettings> {
    state.settings_service.load().await
}

/// Update goal and quick-add settings
pub async fn update_tracker_settings(state: &AppState, tracker: TrackerSettings) -> Result<()> {
    state.settings_service.update_tracker(tracker).await?;

    tracing::warn!("Tracker settings updated. Changes apply from the next session.");

    Ok(())
}
