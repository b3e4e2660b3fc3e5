//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use dynowatch_core::types::ProcessFormation;

/// Default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "dynowatch.toml";

/// dynowatch -- restarts web dynos when the database connection limit is hit.
///
/// Use `dynowatch <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "dynowatch", version, about, long_about = None)]
pub struct Cli {
    /// Path to the dynowatch.toml configuration file.
    ///
    /// When omitted, `dynowatch.toml` is used if present, otherwise defaults.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Target application (overrides `platform.app_name`).
    #[arg(long, global = true)]
    pub app: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config path to load and whether the user gave it explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch recent logs once and remediate if the error signature is present.
    Check(CheckArgs),

    /// Tail the log stream and remediate on every (non-suppressed) match.
    Watch(WatchArgs),

    /// Restart all dynos, once or periodically.
    Restart(RestartArgs),

    /// Run a single scaling command, e.g. `web=1`.
    Scale(ScaleArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- check ----

/// One polling pass over recent logs.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Read the log batch from stdin instead of the source picked by `source.mode`.
    #[arg(long)]
    pub stdin: bool,
}

// ---- watch ----

/// Continuous tail of the log stream.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Read log lines from stdin instead of the source picked by `source.mode`.
    #[arg(long)]
    pub stdin: bool,
}

// ---- restart ----

/// Restart all dynos of the application.
#[derive(Args, Debug)]
pub struct RestartArgs {
    /// Repeat every SECS seconds until interrupted.
    ///
    /// Without a value, `remediation.restart_interval_secs` is used.
    #[arg(long, value_name = "SECS", num_args = 0..=1, value_parser = clap::value_parser!(u64).range(1..))]
    pub every: Option<Option<u64>>,
}

// ---- scale ----

/// Set the instance count of one process type.
#[derive(Args, Debug)]
pub struct ScaleArgs {
    /// Target formation as `<process-type>=<count>`.
    #[arg(value_parser = parse_formation)]
    pub formation: ProcessFormation,
}

fn parse_formation(s: &str) -> Result<ProcessFormation, String> {
    s.parse::<ProcessFormation>().map_err(|e| e.to_string())
}

// ---- config ----

/// Manage dynowatch configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, platform, source, matcher, remediation).
        #[arg(long)]
        section: Option<String>,
    },
}
