//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// How the finished run is printed
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Phase outcomes, decisions and the final output
    Full,
    /// Only the final output
    Final,
    /// The complete run ledger as JSON
    Json,
}

/// CLI arguments for concord
#[derive(Parser, Debug)]
#[command(name = "concord")]
#[command(author, version, about = "Multi-agent orchestration with governed, budgeted prompts")]
#[command(long_about = r#"
Concord plans a task into phases, dispatches each phase to role agents,
checks their structured replies against role schemas and stops once the
agents agree with enough confidence (or the phase ceiling is reached).

Configuration files are loaded from (in priority order):
1. CONCORD_* environment variables (e.g. CONCORD_ORCHESTRATOR__MAX_PHASES=4)
2. --config <path>     Explicit config file
3. ./concord.toml      Project-level config
4. ~/.config/concord/config.toml   Global config

Example:
  concord "Add retry support to the HTTP fetcher"
  concord -o json --ledger-out runs.jsonl --context-file src/fetch.rs "Harden the fetcher"
"#)]
pub struct Cli {
    /// The task to orchestrate (not required with --show-config)
    pub task: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "full")]
    pub output: OutputFormat,

    /// File whose contents are shared with every agent (can be repeated)
    #[arg(long, value_name = "PATH")]
    pub context_file: Vec<PathBuf>,

    /// Constraint added to every agent instruction (can be repeated)
    #[arg(long, value_name = "TEXT")]
    pub constraint: Vec<String>,

    /// Default model provider
    #[arg(long, value_name = "NAME")]
    pub provider: Option<String>,

    /// Override the phase ceiling
    #[arg(long, value_name = "N")]
    pub max_phases: Option<usize>,

    /// Run each phase's agents one at a time
    #[arg(long)]
    pub sequential: bool,

    /// Append the run ledger to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub ledger_out: Option<PathBuf>,

    /// Write run events to this JSONL file
    #[arg(long, value_name = "PATH")]
    pub events_out: Option<PathBuf>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "concord",
            "-vv",
            "--sequential",
            "--context-file",
            "a.rs",
            "--context-file",
            "b.rs",
            "-o",
            "json",
            "Do it",
        ]);
        assert_eq!(cli.task.as_deref(), Some("Do it"));
        assert_eq!(cli.verbose, 2);
        assert!(cli.sequential);
        assert_eq!(cli.context_file.len(), 2);
        assert!(matches!(cli.output, OutputFormat::Json));
    }
}
