//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;

/// TripPlanner - multi-agent trip planner
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Plan a trip within budget using cooperating model-driven agents",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan a trip from a YAML request file
    Plan {
        /// Trip request file (YAML)
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Don't print progress lines while planning
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show a previously planned trip
    Show {
        /// Trip id printed by `tp plan`
        trip_id: String,

        /// Print the recorded progress events instead of the plan
        #[arg(short, long)]
        events: bool,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration
    Config,

    /// Inspect the narrative cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Narrative cache subcommands
#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show how many narratives are cached
    Stats,
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tripplanner.log")
}

/// Generate the after_help text with API key checks and the log location
pub fn generate_after_help() -> String {
    debug!("generate_after_help: called");
    let mut help = String::new();

    help.push_str("API Keys:\n");
    for env in ["MISTRAL_API_KEY", "OPENAI_API_KEY"] {
        let icon = if std::env::var(env).is_ok() {
            "\u{2705}"
        } else {
            "\u{274C}"
        };
        help.push_str(&format!("  {} {}\n", icon, env));
    }

    help.push('\n');
    help.push_str(&format!("Logs are written to: {}\n", get_log_path().display()));
    help
}

/// Output format for plan/show commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_plan() {
        let cli = Cli::parse_from(["tp", "plan", "paris.yml"]);
        match cli.command {
            Command::Plan { request, format, quiet } => {
                assert_eq!(request, PathBuf::from("paris.yml"));
                assert_eq!(format, OutputFormat::Text);
                assert!(!quiet);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_plan_json_quiet() {
        let cli = Cli::parse_from(["tp", "plan", "paris.yml", "--format", "json", "-q"]);
        assert!(matches!(
            cli.command,
            Command::Plan {
                format: OutputFormat::Json,
                quiet: true,
                ..
            }
        ));
    }

    #[test]
    fn test_cli_parse_show_events() {
        let cli = Cli::parse_from(["tp", "show", "0190-abc", "--events"]);
        assert!(matches!(cli.command, Command::Show { events: true, .. }));
    }

    #[test]
    fn test_cli_parse_cache_stats() {
        let cli = Cli::parse_from(["tp", "cache", "stats"]);
        assert!(matches!(
            cli.command,
            Command::Cache {
                command: CacheCommand::Stats
            }
        ));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::parse_from(["tp", "config", "--config", "/tmp/tp.yml", "-l", "debug"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tp.yml")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Command::Config));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["tp"]).is_err());
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("plain".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert!("table".parse::<OutputFormat>().is_err());
    }
}
