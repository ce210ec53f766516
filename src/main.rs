//! # Nudge: personal reminder CLI
//!
//! Usage:
//!   nudge add "Dentist" --at "2026-03-01 09:30"      # one-shot reminder
//!   nudge add "Standup" --at "09:00" --every 1 --unit days
//!   nudge quick 15                                  # reminder in 15 minutes
//!   nudge list [--json]
//!   nudge done 3
//!   nudge run                                       # background monitor, Enter acknowledges

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use nudge_core::clock::{Clock, SystemClock};
use nudge_core::config::NudgeConfig;
use nudge_core::types::{Recurrence, RecurrenceUnit, Reminder, ReminderId};
use nudge_scheduler::{
    CommandNotifier, ConsoleAckSurface, Monitor, ReminderService, ReminderStore, SqliteStore,
    SystemNotifier,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nudge", version, about = "🔔 Nudge: reminders with recurring schedules")]
struct Cli {
    /// Path to config file (default: ~/.nudge/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the reminder database path
    #[arg(long)]
    db: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add a reminder
    Add {
        title: String,
        /// Due time: "YYYY-MM-DD HH:MM", "HH:MM" (today) or RFC 3339
        #[arg(long)]
        at: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Repeat every N units
        #[arg(long)]
        every: Option<u32>,
        /// minutes | hours | days
        #[arg(long, default_value = "minutes")]
        unit: String,
    },
    /// Add a one-shot reminder N minutes from now
    Quick { minutes: u32 },
    /// List all reminders
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one reminder
    Show { id: i64 },
    /// Mark a reminder done
    Done { id: i64 },
    /// Delete a reminder
    Delete { id: i64 },
    /// Number of stored reminders
    Count,
    /// Fire a test notification through the delivery chain
    TestNotify {
        #[arg(default_value = "Test notification")]
        title: String,
        #[arg(default_value = "Nudge is working")]
        body: String,
    },
    /// Run the background monitor until Ctrl+C
    Run,
    /// Print the effective configuration
    Config {
        /// Write it to ~/.nudge/config.toml
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "nudge=debug,nudge_scheduler=debug,nudge_core=debug"
    } else {
        "nudge=info,nudge_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => NudgeConfig::load_from(path)?,
        None => NudgeConfig::load()?,
    };
    if let Some(db) = &cli.db {
        config.store.db_path = db.clone();
    }

    if let Command::Config { init } = cli.command {
        if init {
            config.save()?;
            println!("✅ Config written to {}", NudgeConfig::default_path().display());
        } else {
            print!("{}", config.to_toml()?);
        }
        return Ok(());
    }

    let db_path = config.store.resolved_db_path();
    let store: Arc<dyn ReminderStore> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open {}", db_path.display()))?,
    );
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = ReminderService::new(store.clone(), clock.clone());

    match cli.command {
        Command::Add {
            title,
            at,
            description,
            every,
            unit,
        } => {
            if every == Some(0) {
                anyhow::bail!("--every must be a positive interval");
            }
            let due = parse_due(&at, Local::now())?;
            let recurrence =
                every.and_then(|n| Recurrence::new(n, RecurrenceUnit::parse_lenient(&unit)));
            let id = service.add(&title, description.as_deref(), due, recurrence)?;
            println!("✅ Added {id}: {title} at {}", local(due));
            if let Some(r) = recurrence {
                println!("   🔁 {r}");
            }
        }
        Command::Quick { minutes } => {
            let id = service.quick(minutes)?;
            let r = service.get(id)?;
            println!("✅ Added {id}: {} at {}", r.title, local(r.due_time));
        }
        Command::List { json } => {
            let reminders = service.refresh()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reminders)?);
            } else if reminders.is_empty() {
                println!("📭 No reminders.");
            } else {
                for r in &reminders {
                    print_row(r);
                }
            }
        }
        Command::Show { id } => {
            let r = service.get(ReminderId(id))?;
            println!("{} {}", r.id, r.title);
            if let Some(d) = &r.description {
                println!("   {d}");
            }
            println!("   status:  {}", r.status);
            println!("   due:     {}", local(r.due_time));
            println!("   created: {}", local(r.created_time));
            if let Some(rec) = r.recurrence {
                println!("   repeat:  {rec}");
            }
        }
        Command::Done { id } => {
            let out = service.complete(ReminderId(id))?;
            if out.changed {
                println!("✅ {} marked done", ReminderId(id));
            } else {
                println!("ℹ️  {} was already finished", ReminderId(id));
            }
            if let Some(next) = out.successor {
                let r = service.get(next)?;
                println!("   🔁 Next: {next} at {}", local(r.due_time));
            }
        }
        Command::Delete { id } => {
            service.delete(ReminderId(id))?;
            println!("🗑️  Deleted {}", ReminderId(id));
        }
        Command::Count => println!("{}", service.count()?),
        Command::TestNotify { title, body } => {
            let surface = Arc::new(ConsoleAckSurface::new());
            let monitor = Monitor::from_config(
                store,
                clock,
                system_notifiers(&config),
                surface,
                &config,
            );
            monitor
                .trigger_manual_notification(&title, &body)
                .await
                .context("Notification task failed")?;
            for d in monitor.recent_deliveries() {
                println!("📨 Delivered via {}", d.backend);
            }
        }
        Command::Run => run_monitor(store, clock, &config).await?,
        Command::Config { .. } => unreachable!("handled before the store is opened"),
    }

    Ok(())
}

async fn run_monitor(
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    config: &NudgeConfig,
) -> Result<()> {
    let surface = Arc::new(ConsoleAckSurface::new());
    let monitor = Monitor::from_config(
        store,
        clock,
        system_notifiers(config),
        surface.clone(),
        config,
    );

    println!("🔔 Nudge v{}", env!("CARGO_PKG_VERSION"));
    println!("   Press Enter to acknowledge a reminder, Ctrl+C to quit.\n");
    monitor.start();

    let acks = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(_)) = lines.next_line().await {
            match surface.acknowledge_oldest() {
                Some(n) => println!("✅ Acknowledged: {}", n.title),
                None => println!("   (nothing to acknowledge)"),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl+C, shutting down...");
    acks.abort();
    monitor.shutdown().await;
    let stats = monitor.stats();
    tracing::info!("Monitor stopped after {} ticks ({} failed)", stats.ticks, stats.failed_ticks);
    Ok(())
}

fn system_notifiers(config: &NudgeConfig) -> Vec<Arc<dyn SystemNotifier>> {
    if config.dispatch.system_notifications {
        vec![Arc::new(CommandNotifier::from_config(&config.dispatch))]
    } else {
        vec![]
    }
}

/// Parse a due time in local time. A bare "HH:MM" means today.
fn parse_due(input: &str, now: DateTime<Local>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(input, f).ok())
        .or_else(|| {
            NaiveTime::parse_from_str(input, "%H:%M")
                .ok()
                .map(|t| now.date_naive().and_time(t))
        })
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(9, 0, 0))
        })
        .with_context(|| format!("Unrecognized time '{input}'"))?;
    let local = Local
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("'{input}' does not exist in the local timezone"))?;
    Ok(local.with_timezone(&Utc))
}

fn local(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_row(r: &Reminder) {
    let icon = match r.status {
        nudge_core::types::ReminderStatus::Pending => "⏳",
        nudge_core::types::ReminderStatus::Done => "✅",
        nudge_core::types::ReminderStatus::Overdue => "⚠️",
    };
    let repeat = r.recurrence.map(|rec| format!("  🔁 {rec}")).unwrap_or_default();
    println!("{icon} {:>5}  {}  {}{repeat}", r.id.to_string(), local(r.due_time), r.title);
}
