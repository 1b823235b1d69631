//! # Nudge: Reminder Engine Host
//!
//! Runs the due detector and exposes the reminder actions on the command line.
//!
//! Usage:
//!   nudge run                                   # Poll for due reminders until Ctrl-C
//!   nudge add "Pay rent" --due 2024-03-01T09:00 --recur monthly
//!   nudge list                                  # Open reminders with their status
//!   nudge snooze <id> --minutes 5
//!   nudge complete <id>                         # Spawns the next instance if recurring

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use nudge_core::NudgeConfig;
use nudge_scheduler::reminder::wall_clock;
use nudge_scheduler::{Priority, RecurrenceRule, ReminderDraft, ReminderEngine, spawn_detector};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nudge", version, about = "⏰ Nudge — recurring reminders and notifications")]
struct Cli {
    /// Config file (default: ~/.nudge/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the due detector and run until interrupted
    Run {
        /// Poll interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Run a single detector pass and exit
    Tick,
    /// Add a reminder
    Add {
        title: String,
        /// Due time, local wall-clock (e.g. 2024-03-01T09:00)
        #[arg(long, value_parser = parse_due)]
        due: NaiveDateTime,
        #[arg(long, default_value = "none")]
        recur: RecurrenceRule,
        #[arg(long, default_value = "normal")]
        priority: Priority,
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List reminders
    List {
        /// Include completed reminders
        #[arg(long)]
        all: bool,
    },
    /// Snooze a reminder
    Snooze {
        id: String,
        /// Minutes from now (default: config value)
        #[arg(long)]
        minutes: Option<u32>,
    },
    /// Toggle completion of a reminder
    Complete { id: String },
    /// Delete a reminder
    Delete { id: String },
    /// Delete every completed reminder
    ClearCompleted,
}

fn parse_due(raw: &str) -> std::result::Result<NaiveDateTime, String> {
    wall_clock::parse(raw).ok_or_else(|| format!("invalid due time '{raw}' (use YYYY-MM-DDTHH:MM)"))
}

fn load_config(path: Option<&str>) -> Result<NudgeConfig> {
    let config = match path {
        Some(p) => NudgeConfig::load_from(&PathBuf::from(shellexpand::tilde(p).to_string()))?,
        None => NudgeConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "nudge=debug,nudge_scheduler=debug"
    } else {
        "nudge=info,nudge_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let engine = ReminderEngine::from_config(&config)?;

    match cli.command {
        Command::Run { interval } => {
            let every = Duration::from_secs(interval.unwrap_or(config.scheduler.poll_interval_secs).max(1));
            let engine = Arc::new(engine);
            let summary = engine.summary();
            tracing::info!(
                "📋 {} pending, {} notified, {} snoozed, {} overdue",
                summary.pending,
                summary.notified,
                summary.snoozed,
                summary.overdue
            );
            let handle = spawn_detector(engine.clone(), every);
            tokio::signal::ctrl_c().await?;
            tracing::info!("👋 Shutting down");
            handle.stop().await;
            engine.flush().await;
        }
        Command::Tick => {
            let report = engine.tick();
            engine.flush().await;
            println!(
                "{} reminder(s) due, {} delivery failure(s)",
                report.notified.len(),
                report.failed
            );
        }
        Command::Add {
            title,
            due,
            recur,
            priority,
            category,
            description,
        } => {
            let mut draft = ReminderDraft::new(&title, due)
                .recurring(recur)
                .with_priority(priority)
                .with_category(&category);
            if let Some(description) = description {
                draft = draft.with_description(&description);
            }
            let added = engine.add(draft)?;
            println!("✅ Added {} ({})", added.title, added.id);
        }
        Command::List { all } => {
            let now = Local::now().naive_local();
            let reminders = engine.list();
            let mut shown = 0;
            for r in reminders.iter().filter(|r| all || !r.completed) {
                shown += 1;
                println!(
                    "{:<42} {:<10} {:<17} {:<9} {:<7} {}",
                    r.id,
                    r.status(now).to_string(),
                    r.effective_due_at().format("%Y-%m-%d %H:%M").to_string(),
                    r.recurrence_rule.to_string(),
                    r.priority.to_string(),
                    r.title
                );
            }
            if shown == 0 {
                println!("No reminders.");
            }
        }
        Command::Snooze { id, minutes } => {
            let minutes = minutes.unwrap_or(config.scheduler.default_snooze_minutes);
            let snoozed = engine.snooze(&id, minutes)?;
            println!(
                "😴 {} snoozed until {}",
                snoozed.title,
                snoozed.effective_due_at().format("%Y-%m-%d %H:%M")
            );
        }
        Command::Complete { id } => {
            let outcome = engine.toggle_complete(&id)?;
            if outcome.completed {
                println!("✅ Completed {id}");
            } else {
                println!("↩️ Reopened {id}");
            }
            if let Some(next) = outcome.spawned {
                println!(
                    "🔁 Next occurrence {} ({})",
                    next.due_at.format("%Y-%m-%d %H:%M"),
                    next.id
                );
            }
        }
        Command::Delete { id } => {
            engine.delete(&id)?;
            println!("🗑️ Deleted {id}");
        }
        Command::ClearCompleted => {
            let removed = engine.clear_completed()?;
            println!("🧹 Removed {removed} completed reminder(s)");
        }
    }

    Ok(())
}
