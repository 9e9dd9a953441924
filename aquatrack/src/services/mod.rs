//! Services module
//!
//! Business logic that sits between the command layer and storage.

pub mod calendar;
pub mod ledger;
pub mod reminders;
pub mod session;
pub mod settings;
pub mod streak;
pub mod sync;

pub use calendar::{CalendarClient, GoogleCalendar};
pub use ledger::IntakeLedger;
pub use reminders::{
    DesktopNotifier, LogNotifier, NotificationPermission, NotificationSink, ReminderScheduler,
};
pub use session::{IntakeOutcome, Session, SessionBuilder, SessionEvent, WeakSession};
pub use settings::{AppSettings, PushPolicy, SettingsService};
pub use sync::{SyncEngine, SyncOutcome};
