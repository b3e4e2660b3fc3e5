//! `dynowatch check` command handler

use std::io::Write;

use serde::Serialize;
use tokio::io::BufReader;
use tracing::info;

use dynowatch_core::config::DynowatchConfig;
use dynowatch_watchdog::{
    ConfiguredSource, ReaderSource, RemediationReport, WatchOutcome, WatchReport, WatchdogConfig,
};

use crate::cli::CheckArgs;
use crate::commands::{
    build_platform, build_watchdog, finish_progress, source_error, spawn_progress_printer,
};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `check` command.
///
/// Reads one batch of recent log lines and remediates at most once if any line
/// carries the error signature. `source.mode` picks the platform API or
/// `<cli_bin> logs`; `--stdin` reads stdin instead.
///
/// # Errors
///
/// * `CliError::Retrieval` (exit 3) when the logs could not be fetched or the CLI failed to start.
/// * `CliError::Core` (exit 1) when a remediation command failed after retries.
pub async fn execute(
    args: CheckArgs,
    config: &DynowatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let wd_config = WatchdogConfig::from_core(config)?;
    let platform = build_platform(&wd_config)?;
    let (events, printer) = spawn_progress_printer(*writer);
    let mut watchdog = build_watchdog(platform, &wd_config, events)?;

    info!(stdin = args.stdin, mode = %wd_config.source_mode, "checking recent logs");

    let result = if args.stdin {
        let mut source = ReaderSource::new(
            BufReader::new(tokio::io::stdin()),
            "stdin",
            wd_config.max_line_length,
        );
        watchdog.check_once(&mut source).await
    } else {
        let mut source = ConfiguredSource::polling(&wd_config).map_err(source_error)?;
        watchdog.check_once(&mut source).await
    };

    drop(watchdog);
    finish_progress(printer).await;

    let report = CheckReport::from(result?);
    writer.render(&report)?;

    match report.outcome {
        WatchOutcome::RetrievalFailed { reason } => Err(CliError::Retrieval(reason)),
        _ => Ok(()),
    }
}

/// Result of a single polling pass.
#[derive(Serialize)]
pub struct CheckReport {
    /// Log source identifier
    pub source: String,
    /// How the pass ended
    pub outcome: WatchOutcome,
    /// Lines inspected
    pub lines_read: u64,
    /// Lines carrying the signature
    pub matches: u64,
    /// Completed remediation, if one ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationReport>,
}

impl From<WatchReport> for CheckReport {
    fn from(report: WatchReport) -> Self {
        Self {
            source: report.source,
            outcome: report.outcome,
            lines_read: report.lines_read,
            matches: report.matches,
            remediation: report.reports.into_iter().next(),
        }
    }
}

impl Render for CheckReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.outcome {
            WatchOutcome::NoErrorDetected => {
                writeln!(w, "No max_user_connections error detected.")?;
            }
            WatchOutcome::Remediated => {
                if let Some(report) = &self.remediation {
                    writeln!(
                        w,
                        "{} {} (incident {})",
                        "Remediated:".green().bold(),
                        report.action,
                        report.incident_id
                    )?;
                } else {
                    writeln!(w, "{}", "Remediated.".green().bold())?;
                }
            }
            WatchOutcome::Suppressed => {
                writeln!(
                    w,
                    "{}",
                    "max_user_connections error detected, remediation suppressed (cooldown)."
                        .yellow()
                )?;
            }
            WatchOutcome::RetrievalFailed { .. } => {
                writeln!(w, "{}", "Log retrieval failed, no remediation attempted.".red())?;
            }
            WatchOutcome::StreamEnded | WatchOutcome::Cancelled => {}
        }

        writeln!(
            w,
            "  Source: {}  Lines: {}  Matches: {}",
            self.source, self.lines_read, self.matches
        )?;
        Ok(())
    }
}
