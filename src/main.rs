//! # HomeClaw — one-shot action timers for smart-home entities
//!
//! Usage:
//!   homeclaw run                                  # Daemon: restore tasks, fire timers
//!   homeclaw schedule light.x off --delay 10      # Turn light.x off in 10 minutes
//!   homeclaw schedule fan.attic on --at 21:30     # Turn on at 21:30 (tomorrow if past)
//!   homeclaw schedule light.x on --run-now        # On now, auto-off later
//!   homeclaw cancel light.x                       # Cancel a pending task
//!   homeclaw list                                 # Show pending tasks
//!   homeclaw prefs light.x                        # Show remembered parameters
//!
//! Scheduled tasks are persisted; `homeclaw run` re-arms them and
//! replays anything that came due while no process was running.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use homeclaw_core::HomeClawConfig;
use homeclaw_timer::{
    Action, ChannelNotifier, PreferenceStore, RestExecutor, RunActionRequest, StateBus, TaskStore,
    TimeMode, TimeUnit, TimerCoordinator,
};

#[derive(Parser)]
#[command(
    name = "homeclaw",
    version,
    about = "🏠 HomeClaw — one-shot action timers for smart-home entities"
)]
struct Cli {
    /// Config file path (default: ~/.homeclaw/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Restore persisted tasks and keep firing timers until Ctrl-C
    Run,
    /// Schedule a one-shot action (fired by the `run` daemon)
    Schedule {
        /// Target entity (e.g. light.kitchen)
        entity_id: String,
        /// Action: on, off, toggle, open_cover, media_stop, ...
        action: String,
        /// Relative delay amount
        #[arg(long, default_value = "15")]
        delay: u32,
        /// Delay unit: seconds, minutes, hours
        #[arg(long, default_value = "minutes")]
        unit: String,
        /// Absolute wall-clock time HH:MM (overrides --delay)
        #[arg(long)]
        at: Option<String>,
        /// Execute the action now and schedule its reverse
        #[arg(long)]
        run_now: bool,
        /// Notify via the in-app feed
        #[arg(long)]
        notify_ha: bool,
        /// Notify via mobile push targets
        #[arg(long)]
        notify_mobile: bool,
    },
    /// Cancel a pending task
    Cancel {
        /// Target entity, or nothing with --all
        entity_id: Option<String>,
        /// Cancel every pending task
        #[arg(long)]
        all: bool,
    },
    /// List pending tasks
    List,
    /// Show remembered scheduling parameters
    Prefs {
        /// One entity, or all when omitted
        entity_id: Option<String>,
    },
    /// Merge preference fields for an entity (JSON object)
    SetPrefs {
        entity_id: String,
        /// e.g. '{"last_delay": 30, "notify_ha": true}'
        json: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "homeclaw=debug" } else { "homeclaw=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => HomeClawConfig::load_from(std::path::Path::new(path))?,
        None => HomeClawConfig::load()?,
    };

    let coordinator = build_coordinator(&config).await?;

    match cli.command {
        Commands::Run => {
            coordinator.restore_tasks().await;
            let pending = coordinator.get_all_tasks().await.len();
            tracing::info!("⏰ HomeClaw running ({pending} pending tasks) — Ctrl-C to stop");
            tokio::signal::ctrl_c().await?;
            tracing::info!("👋 Stopping — pending tasks stay persisted and resume next run");
        }
        Commands::Schedule {
            entity_id,
            action,
            delay,
            unit,
            at,
            run_now,
            notify_ha,
            notify_mobile,
        } => {
            coordinator.restore_tasks().await;
            let request = RunActionRequest {
                entity_id: entity_id.clone(),
                action: parse_action(&action)?,
                delay,
                unit: parse_unit(&unit)?,
                notify: notify_ha || notify_mobile,
                run_now,
                notify_ha,
                notify_mobile,
                notify_devices: Vec::new(),
                time_mode: if at.is_some() { TimeMode::Absolute } else { TimeMode::Relative },
                at_time: at,
            };
            coordinator.run_action(request).await?;
            let task = coordinator
                .get_task(&entity_id)
                .await
                .context("task vanished right after scheduling")?;
            println!("Scheduled {} for {} at {}", task.action, entity_id, task.end_time);
        }
        Commands::Cancel { entity_id, all } => {
            if all {
                let count = coordinator.cancel_all().await;
                println!("Cancelled {count} tasks");
            } else {
                let entity_id = entity_id.context("pass an entity id or --all")?;
                if coordinator.cancel_action(&entity_id).await {
                    println!("Cancelled task for {entity_id}");
                } else {
                    println!("No scheduled task for {entity_id}");
                }
            }
        }
        Commands::List => {
            let tasks = coordinator.get_all_tasks().await;
            if tasks.is_empty() {
                println!("No pending tasks");
            }
            let now = chrono::Local::now();
            let mut tasks: Vec<_> = tasks.into_values().collect();
            tasks.sort_by(|a, b| a.end_time.cmp(&b.end_time));
            for task in tasks {
                let remaining = task
                    .remaining_seconds(now)
                    .map(|s| format!("{s}s remaining"))
                    .unwrap_or_else(|| "unreadable fire time".into());
                println!("{}  {}  at {}  ({remaining})", task.entity_id, task.action, task.end_time);
            }
        }
        Commands::Prefs { entity_id } => {
            let prefs = match entity_id {
                Some(id) => {
                    let mut map = serde_json::Map::new();
                    if let Some(record) = coordinator.get_preferences(&id).await {
                        map.insert(id, serde_json::to_value(record)?);
                    }
                    serde_json::Value::Object(map)
                }
                None => serde_json::to_value(coordinator.get_all_preferences().await)?,
            };
            println!("{}", serde_json::to_string_pretty(&prefs)?);
        }
        Commands::SetPrefs { entity_id, json } => {
            let fields: serde_json::Map<String, serde_json::Value> =
                serde_json::from_str(&json).context("preferences must be a JSON object")?;
            coordinator.set_preferences(&entity_id, fields).await?;
            println!("Preferences updated for {entity_id}");
        }
    }

    Ok(())
}

async fn build_coordinator(config: &HomeClawConfig) -> Result<TimerCoordinator> {
    let dir = config.storage.resolve_dir();
    let mut store = TaskStore::new(&dir);
    store.load().await?;
    let mut prefs = PreferenceStore::new(&dir);
    prefs.load().await?;
    Ok(TimerCoordinator::new(
        store,
        prefs,
        Arc::new(RestExecutor::new(&config.hub)),
        Arc::new(ChannelNotifier::new(&config.notify)),
        Arc::new(StateBus::new()),
    ))
}

fn parse_action(s: &str) -> Result<Action> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .with_context(|| format!("unknown action '{s}'"))
}

fn parse_unit(s: &str) -> Result<TimeUnit> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .with_context(|| format!("unknown unit '{s}' (seconds, minutes, hours)"))
}
