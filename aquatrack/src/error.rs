//! Error types for AquaTrack
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to a presentation layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Remote storage error: {0}")]
    Remote(String),

    #[error("Calendar error: {0}")]
    Calendar(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("{0}")]
    Validation(String),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(String),

    #[error("No active session")]
    NoSession,

    #[error("Session has expired, please sign in again")]
    SessionExpired,

    #[error("{0}")]
    Generic(String),
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Pass a successful response through, otherwise build an error from the
/// status and body with `into_error` (e.g. `AppError::Remote`)
pub(crate) async fn ensure_success(
    response: reqwest::Response,
    operation: &str,
    into_error: fn(String) -> AppError,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(into_error(format!(
        "Failed to {} ({}): {}",
        operation, status, body
    )))
}
