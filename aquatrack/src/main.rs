// AquaTrack - personal hydration tracker
// Entry point and command dispatch

use anyhow::{Context, Result};
use aquatrack::app::{self, AppState, Credentials};
use aquatrack::cli::{Cli, Commands, ReminderAction};
use aquatrack::commands;
use aquatrack::models::{ReminderRequest, SessionIdentity};
use aquatrack::services::streak::DaySummary;
use aquatrack::services::SessionEvent;
use chrono::Local;
use clap::Parser;
use directories::ProjectDirs;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HEATMAP_GLYPHS: [&str; 5] = ["·", "░", "▒", "▓", "█"];

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aquatrack=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting AquaTrack");

    let data_dir = match cli.data_dir.clone() {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    let credentials = Credentials {
        identity: cli.user.as_deref().map(|email| {
            let identity = SessionIdentity::new(email);
            match cli.expires_at {
                Some(expires_at) => identity.with_expiry(expires_at),
                None => identity,
            }
        }),
        access_token: cli.access_token.clone(),
    };

    let state = app::setup(data_dir, credentials)
        .await
        .context("Failed to start AquaTrack")?;

    let mut events = state.session.subscribe();
    let result = run(&state, cli.command).await;

    // Let queued pushes finish before exiting
    state.session.logout().await;

    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Warning { message } = event {
            eprintln!("warning: {}", message);
        }
    }

    result
}

fn default_data_dir() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("app", "aquatrack", "aquatrack")
        .context("Could not determine a home directory for app data")?;
    Ok(dirs.data_dir().to_path_buf())
}

async fn run(state: &AppState, command: Commands) -> Result<()> {
    match command {
        Commands::Status => {
            let status = commands::get_status(state).await?;
            println!(
                "Today: {} / {} ml ({}%)",
                status.total, status.daily_goal, status.percent
            );
            println!("Streak: {} days", status.streak);
            if status.remaining > 0 {
                println!("{} ml to go", status.remaining);
            }
            for log in &status.logs {
                println!(
                    "  {}  {} ml",
                    log.timestamp.with_timezone(&Local).format("%H:%M"),
                    log.amount
                );
            }
        }

        Commands::Drink { amount } => {
            let view = commands::add_water(state, amount).await?;
            println!(
                "Added {} ml, {} / {} ml today",
                view.outcome.amount, view.outcome.total, view.outcome.daily_goal
            );
            if let Some(message) = view.message {
                println!("{}", message.title);
                println!("{}", message.description);
            }
        }

        Commands::History { days, heatmap } => {
            if heatmap {
                print_heatmap(&commands::get_heatmap(state, days).await?);
            } else {
                for day in commands::get_history(state, days).await? {
                    let mark = if day.goal_met { "✓" } else { "" };
                    println!("{}  {:>5} ml  {}", day.date, day.total, mark);
                }
            }
        }

        Commands::Reminders { action } => match action {
            ReminderAction::List => {
                let reminders = commands::list_reminders(state).await?;
                if reminders.is_empty() {
                    println!("No reminders set");
                }
                for reminder in reminders {
                    let off = if reminder.rule.enabled { "" } else { " (off)" };
                    println!(
                        "{}  {}  {}{}",
                        reminder.rule.id,
                        reminder.schedule,
                        reminder.rule.notification_body(),
                        off
                    );
                }
            }
            ReminderAction::Add {
                time,
                repeat,
                days,
                label,
                id,
                disabled,
            } => {
                let request = ReminderRequest {
                    id,
                    time,
                    repeat,
                    days,
                    label,
                    enabled: !disabled,
                };
                let saved = commands::save_reminder(state, request).await?;
                println!("{} ({})", saved.message, saved.reminder.schedule);
            }
            ReminderAction::Remove { id } => {
                println!("{}", commands::delete_reminder(state, &id).await?);
            }
        },

        Commands::Watch => watch(state).await?,

        Commands::Settings => {
            let info = commands::get_app_info(state).await?;
            println!("AquaTrack {} ({})", info.version, info.app_data_dir);
            if let Some(email) = info.signed_in_as {
                println!("Signed in as {}", email);
            }
            let settings = commands::get_settings(state).await?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

/// Run the reminder loop and print what it does until Ctrl-C
async fn watch(state: &AppState) -> Result<()> {
    let mut events = state.session.subscribe();
    state.session.start_reminders().await;

    println!("Watching reminders, press Ctrl-C to stop");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::ReminderFired { id, label }) => {
                    let label = if label.is_empty() { id } else { label };
                    println!("{}  💧 {}", Local::now().format("%H:%M"), label);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} session events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Stopping reminder watch");
                break;
            }
        }
    }

    Ok(())
}

/// One row per week, Monday first
fn print_heatmap(cells: &[DaySummary]) {
    for week in cells.chunks(7) {
        let Some(first) = week.first() else {
            continue;
        };
        let row: Vec<&str> = week
            .iter()
            .map(|cell| HEATMAP_GLYPHS[usize::from(cell.level.min(4))])
            .collect();
        println!("{}  {}", first.date.format("%b %d"), row.join(" "));
    }
}
