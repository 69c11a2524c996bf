//! TripPlanner - multi-agent trip planner
//!
//! CLI entry point for planning trips and inspecting past plans.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, FromArgMatches};
use colored::Colorize;
use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use tripplanner::cli::{CacheCommand, Cli, Command, OutputFormat, generate_after_help};
use tripplanner::config::Config;
use tripplanner::domain::{ItemKind, TripRequest, TripResult};
use tripplanner::events::{PlanEvent, create_event_bus, default_runs_dir, read_trip_events, spawn_event_logger};
use tripplanner::store::{NarrativeCache, ResultStore, SqliteStore};
use tripplanner::workflow::{Planner, Services};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("tripplanner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Cli::command().after_help(generate_after_help());
    let cli = Cli::from_arg_matches(&cmd.get_matches())?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    info!(provider = %config.llm.provider, model = %config.llm.model(), "TripPlanner loaded config");

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan {
            request,
            format,
            quiet,
        } => cmd_plan(&config, &request, format, quiet).await,
        Command::Show {
            trip_id,
            events,
            format,
        } => {
            if events {
                cmd_show_events(&trip_id, format)
            } else {
                cmd_show(&config, &trip_id, format).await
            }
        }
        Command::Config => cmd_config(&config),
        Command::Cache {
            command: CacheCommand::Stats,
        } => cmd_cache_stats(&config).await,
    }
}

/// Read a trip request from YAML
fn load_request(path: &Path) -> Result<TripRequest> {
    debug!(?path, "load_request: called");
    let content = fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_yaml::from_str(&content).context(format!("Failed to parse trip request {}", path.display()))
}

/// Plan a trip and print the result
async fn cmd_plan(config: &Config, request_path: &Path, format: OutputFormat, quiet: bool) -> Result<()> {
    debug!(?request_path, %format, quiet, "cmd_plan: called");
    let request = load_request(request_path)?;
    config.validate()?;

    let services = Services::from_config(config)?;
    let bus = create_event_bus();
    let logger = spawn_event_logger(bus.clone(), default_runs_dir());
    let printer = (!quiet).then(|| tokio::spawn(print_progress(bus.subscribe())));

    let planner = Planner::new(services, config).with_events(bus.clone());
    let outcome = planner.plan(request).await;

    // Closing the bus lets the logger and printer drain and exit
    drop(planner);
    drop(bus);
    let _ = logger.await;
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match outcome {
        Ok(result) => print_result(&result, format),
        Err(e) => Err(eyre::eyre!("[{}] {}", e.category(), e)),
    }
}

/// Print progress events to stderr as they arrive
async fn print_progress(mut rx: broadcast::Receiver<PlanEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => eprintln!("{}", format_progress(&event)),
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn format_progress(event: &PlanEvent) -> String {
    match event {
        PlanEvent::PlanStarted { destination, days, .. } => {
            format!("{} {} ({} days)", "planning".cyan().bold(), destination, days)
        }
        PlanEvent::PhaseEntered { phase, iteration, .. } => {
            format!("  {} {} (iteration {})", "->".dimmed(), phase, iteration)
        }
        PlanEvent::CategoryFetched {
            category, count, cycle, ..
        } => format!("     {:<13} {} candidates (cycle {})", category.to_string(), count, cycle),
        PlanEvent::SelectionMade { total_cost, fits, .. } => {
            let status = if *fits { "fits".green() } else { "over budget".yellow() };
            format!("     selection {} ({})", total_cost, status)
        }
        PlanEvent::StoriesReady { count, .. } => format!("     {} stories ready", count),
        PlanEvent::Warning { message, .. } => format!("  {} {}", "warning:".yellow(), message),
        PlanEvent::PlanCompleted {
            total_cost,
            within_budget,
            best_effort,
            ..
        } => {
            let status = match (*within_budget, *best_effort) {
                (true, _) => "within budget".green(),
                (false, true) => "best effort".yellow(),
                (false, false) => "over budget".red(),
            };
            format!("{} total {} ({})", "done".green().bold(), total_cost, status)
        }
        PlanEvent::PlanFailed { category, message, .. } => {
            format!("{} [{}] {}", "failed".red().bold(), category, message)
        }
    }
}

fn print_result(result: &TripResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Text => print!("{}", render_result(result)),
    }
    Ok(())
}

fn render_result(result: &TripResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", format!("Trip to {}", result.destination).bold()));
    out.push_str(&format!("  id: {}\n\n", result.trip_id));

    for day in &result.days {
        out.push_str(&format!("{}\n", format!("Day {} ({}): {}", day.day_number, day.date, day.title).cyan()));
        for item in day.items() {
            let marker = match item.kind {
                ItemKind::Activity => "*",
                ItemKind::Meal => "~",
                ItemKind::Transport => ">",
                ItemKind::Lodging => "#",
                ItemKind::FreeTime => "-",
            };
            out.push_str(&format!("  {} {} {}", item.time, marker, item.name));
            if item.estimated_cost.cents() > 0 {
                out.push_str(&format!("  [{} {}]", item.estimated_cost, result.currency));
            }
            out.push('\n');
            if let Some(story) = &item.story {
                out.push_str(&format!("      {}\n", story.dimmed()));
            }
        }
        if !day.travel_tip.is_empty() {
            out.push_str(&format!("  tip: {}\n", day.travel_tip));
        }
        out.push('\n');
    }

    let budget = &result.budget;
    out.push_str(&format!("{}\n", "Budget".bold()));
    for (category, cost) in &budget.cost_breakdown {
        out.push_str(&format!("  {:<13} {} {}\n", category.to_string(), cost, result.currency));
    }
    out.push_str(&format!(
        "  total         {} of {} {}\n",
        budget.total_cost, budget.total_budget, result.currency
    ));
    if budget.within_budget {
        out.push_str(&format!("  {}\n", format!("remaining {}", budget.remaining_budget).green()));
    } else {
        out.push_str(&format!("  {}\n", format!("over by {}", budget.overage).yellow()));
    }
    out.push_str(&format!("  adjustment iterations: {}\n", result.adjustment_iterations));

    if !result.essentials.phrases.is_empty() {
        out.push_str(&format!("\n{} ({})\n", "Phrases".bold(), result.essentials.language));
        for phrase in &result.essentials.phrases {
            out.push_str(&format!("  {} - {}\n", phrase.english, phrase.translation));
        }
    }

    if !result.warnings.is_empty() {
        out.push_str(&format!("\n{}\n", "Warnings".yellow().bold()));
        for warning in &result.warnings {
            out.push_str(&format!("  {}\n", warning));
        }
    }
    out
}

/// Load a saved plan
async fn cmd_show(config: &Config, trip_id: &str, format: OutputFormat) -> Result<()> {
    debug!(%trip_id, "cmd_show: called");
    let id = Uuid::parse_str(trip_id).context(format!("Invalid trip id '{}'", trip_id))?;
    let store = SqliteStore::open(&config.storage.db_path).context("Failed to open result store")?;
    let result = store
        .load(id)
        .await
        .context("Failed to load trip")?
        .ok_or_else(|| eyre::eyre!("No saved trip with id {}", trip_id))?;
    print_result(&result, format)
}

/// Print the recorded progress events of a plan
fn cmd_show_events(trip_id: &str, format: OutputFormat) -> Result<()> {
    debug!(%trip_id, "cmd_show_events: called");
    let entries = read_trip_events(default_runs_dir(), trip_id)?;
    if entries.is_empty() {
        return Err(eyre::eyre!("No events recorded for trip {}", trip_id));
    }
    for entry in &entries {
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string(entry)?),
            OutputFormat::Text => println!(
                "{} {}",
                entry.timestamp.format("%H:%M:%S%.3f").to_string().dimmed(),
                format_progress(&entry.event).trim_start()
            ),
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    print!("{}", serde_yaml::to_string(config).context("Failed to serialize config")?);
    Ok(())
}

async fn cmd_cache_stats(config: &Config) -> Result<()> {
    debug!("cmd_cache_stats: called");
    let store = SqliteStore::open(&config.storage.db_path).context("Failed to open narrative cache")?;
    let count = store.count().await.context("Failed to count cached narratives")?;
    println!("Narrative cache: {}", config.storage.db_path.display());
    println!("  entries: {}", count);
    Ok(())
}
