use crate::models::Repeat;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command-line interface definition for AquaTrack
#[derive(Parser, Debug)]
#[command(
    name = "aquatrack",
    version = env!("CARGO_PKG_VERSION"),
    about = "Track daily water intake, keep a streak and get hydration reminders",
    long_about = None
)]
pub struct Cli {
    /// Signed-in account e-mail; without it nothing is persisted
    #[arg(global = true, long, env = "AQUATRACK_USER")]
    pub user: Option<String>,

    /// OAuth access token for Drive and Calendar
    #[arg(global = true, long, env = "AQUATRACK_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// When the sign-in expires (RFC 3339)
    #[arg(global = true, long, env = "AQUATRACK_SESSION_EXPIRES")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Override the data directory
    #[arg(global = true, long, env = "AQUATRACK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show today's progress and streak
    Status,

    /// Log a drink
    Drink {
        /// Amount in ml
        amount: u32,
    },

    /// Daily totals for recent days
    History {
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Show the consistency calendar instead of a list
        #[arg(long)]
        heatmap: bool,
    },

    /// Manage reminders
    Reminders {
        #[command(subcommand)]
        action: ReminderAction,
    },

    /// Run the reminder loop until Ctrl-C
    Watch,

    /// Print the current settings
    Settings,
}

#[derive(Subcommand, Debug)]
pub enum ReminderAction {
    /// List reminders
    List,

    /// Add or replace a reminder
    Add {
        /// Time of day (HH:MM)
        time: String,

        /// once, daily or custom
        #[arg(long, default_value = "daily")]
        repeat: Repeat,

        /// Weekday numbers for custom reminders (0 = Sunday)
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,

        #[arg(long, default_value = "")]
        label: String,

        /// Replace the reminder with this id
        #[arg(long)]
        id: Option<String>,

        /// Save the reminder switched off
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a reminder
    Remove { id: String },
}
