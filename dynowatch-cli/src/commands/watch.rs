//! `dynowatch watch` command handler

use std::io::Write;

use serde::Serialize;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

use dynowatch_core::config::DynowatchConfig;
use dynowatch_watchdog::{
    ConfiguredSource, ReaderSource, WatchOutcome, WatchReport, WatchdogConfig,
};

use crate::cli::WatchArgs;
use crate::commands::{
    build_platform, build_watchdog, finish_progress, source_error, spawn_interrupt_handler,
    spawn_progress_printer,
};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `watch` command.
///
/// Reads the log stream picked by `source.mode` until it ends or Ctrl-C is
/// received: `<cli_bin> logs --tail` for `cli`, one batch of recent lines for
/// `api`, or stdin with `--stdin`. Ctrl-C takes effect between lines;
/// an in-flight remediation always runs to completion.
///
/// # Errors
///
/// * `CliError::Retrieval` (exit 3) when the tail process failed to start or read.
/// * `CliError::Command` (exit 1) when at least one remediation failed.
pub async fn execute(
    args: WatchArgs,
    config: &DynowatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let wd_config = WatchdogConfig::from_core(config)?;
    let platform = build_platform(&wd_config)?;
    let (events, printer) = spawn_progress_printer(*writer);

    let cancel = CancellationToken::new();
    let mut watchdog =
        build_watchdog(platform, &wd_config, events)?.with_cancel_token(cancel.clone());
    let interrupt = spawn_interrupt_handler(cancel);

    let report = if args.stdin {
        let mut source = ReaderSource::new(
            BufReader::new(tokio::io::stdin()),
            "stdin",
            wd_config.max_line_length,
        );
        watchdog.watch(&mut source).await
    } else {
        let mut source = ConfiguredSource::streaming(&wd_config).map_err(source_error)?;
        watchdog.watch(&mut source).await
    };

    interrupt.abort();
    drop(watchdog);
    finish_progress(printer).await;

    let summary = WatchSummary::from(report);
    writer.render(&summary)?;

    if let WatchOutcome::RetrievalFailed { reason } = &summary.outcome {
        return Err(CliError::Retrieval(reason.clone()));
    }
    if summary.failures > 0 {
        return Err(CliError::Command(format!(
            "{} remediation(s) failed while watching",
            summary.failures
        )));
    }
    Ok(())
}

/// Summary printed when watching stops.
#[derive(Serialize)]
pub struct WatchSummary {
    pub source: String,
    pub outcome: WatchOutcome,
    pub lines_read: u64,
    pub matches: u64,
    pub remediations: u64,
    pub suppressed: u64,
    pub failures: u64,
    /// Incident ids of completed remediations, in order
    pub incidents: Vec<String>,
}

impl From<WatchReport> for WatchSummary {
    fn from(report: WatchReport) -> Self {
        Self {
            source: report.source,
            outcome: report.outcome,
            lines_read: report.lines_read,
            matches: report.matches,
            remediations: report.remediations,
            suppressed: report.suppressed,
            failures: report.failures,
            incidents: report.reports.into_iter().map(|r| r.incident_id).collect(),
        }
    }
}

impl Render for WatchSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let reason = match &self.outcome {
            WatchOutcome::StreamEnded => "log stream ended".yellow(),
            WatchOutcome::Cancelled => "interrupted".normal(),
            WatchOutcome::RetrievalFailed { .. } => "log retrieval failed".red(),
            WatchOutcome::NoErrorDetected
            | WatchOutcome::Remediated
            | WatchOutcome::Suppressed => "stopped".normal(),
        };

        writeln!(w, "Watch stopped: {} ({})", reason, self.source.bold())?;
        writeln!(w, "  Lines read:    {}", self.lines_read)?;
        writeln!(w, "  Matches:       {}", self.matches)?;
        writeln!(w, "  Remediations:  {}", self.remediations)?;
        writeln!(w, "  Suppressed:    {}", self.suppressed)?;
        if self.failures > 0 {
            writeln!(w, "  Failures:      {}", self.failures.to_string().red().bold())?;
        } else {
            writeln!(w, "  Failures:      0")?;
        }
        for id in &self.incidents {
            writeln!(w, "  Incident:      {id}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(outcome: WatchOutcome, failures: u64) -> WatchSummary {
        WatchSummary {
            source: "cli:heroku logs --tail".to_owned(),
            outcome,
            lines_read: 120,
            matches: 3,
            remediations: 1,
            suppressed: 2,
            failures,
            incidents: vec!["incident-1".to_owned()],
        }
    }

    fn render(summary: &WatchSummary) -> String {
        let mut buffer = Vec::new();
        summary
            .render_text(&mut buffer)
            .expect("text rendering should succeed");
        String::from_utf8(buffer).expect("valid UTF-8")
    }

    #[test]
    fn test_stream_ended_summary() {
        let output = render(&summary(WatchOutcome::StreamEnded, 0));
        assert!(output.contains("log stream ended"));
        assert!(output.contains("Lines read:    120"));
        assert!(output.contains("Suppressed:    2"));
        assert!(output.contains("incident-1"));
    }

    #[test]
    fn test_cancelled_summary() {
        let output = render(&summary(WatchOutcome::Cancelled, 0));
        assert!(output.contains("interrupted"));
    }

    #[test]
    fn test_summary_json_fields() {
        let json = serde_json::to_value(summary(WatchOutcome::StreamEnded, 1))
            .expect("JSON serialization should succeed");
        assert_eq!(json["outcome"]["kind"].as_str(), Some("stream_ended"));
        assert_eq!(json["failures"].as_u64(), Some(1));
        assert_eq!(json["incidents"][0].as_str(), Some("incident-1"));
    }
}
