//! `dynowatch restart` command handler

use std::io::Write;
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use dynowatch_core::config::DynowatchConfig;
use dynowatch_watchdog::{PlatformClient, RemediationExecutor, WatchdogConfig};

use crate::cli::RestartArgs;
use crate::commands::{build_platform, spawn_interrupt_handler};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `restart` command.
///
/// Without `--every`, restarts all dynos once. With `--every`, restarts on a
/// fixed interval until Ctrl-C; a failed run is logged and the loop goes on.
pub async fn execute(
    args: RestartArgs,
    config: &DynowatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let wd_config = WatchdogConfig::from_core(config)?;
    let platform = build_platform(&wd_config)?;
    let executor = RemediationExecutor::new(platform, &wd_config);

    let Some(every) = args.every else {
        info!("restarting all dynos");
        let output = executor.restart().await?;
        writer.render(&RestartSummary {
            interval_secs: None,
            runs: 1,
            failures: 0,
            last_command: Some(output.command),
        })?;
        return Ok(());
    };

    let interval = every.map_or_else(|| wd_config.restart_interval(), Duration::from_secs);
    writer.render_line(&PeriodicNotice {
        interval_secs: interval.as_secs(),
    })?;

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_handler(cancel.clone());
    let summary = run_periodic(&executor, interval, &cancel, writer).await;
    interrupt.abort();

    writer.render(&summary)?;
    if summary.failures > 0 {
        return Err(CliError::Command(format!(
            "{} of {} restart(s) failed",
            summary.failures, summary.runs
        )));
    }
    Ok(())
}

/// Restart on every tick until `cancel` fires.
///
/// The first restart runs immediately. Cancellation is only observed between runs.
async fn run_periodic<P: PlatformClient>(
    executor: &RemediationExecutor<P>,
    interval: Duration,
    cancel: &CancellationToken,
    writer: &OutputWriter,
) -> RestartSummary {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut summary = RestartSummary {
        interval_secs: Some(interval.as_secs()),
        runs: 0,
        failures: 0,
        last_command: None,
    };

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        summary.runs += 1;
        let tick = match executor.restart().await {
            Ok(output) => {
                summary.last_command = Some(output.command);
                RestartTick {
                    run: summary.runs,
                    success: true,
                    error: None,
                }
            }
            Err(e) => {
                summary.failures += 1;
                error!(run = summary.runs, error = %e, "periodic restart failed");
                RestartTick {
                    run: summary.runs,
                    success: false,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = writer.render_line(&tick) {
            error!(error = %e, "failed to print restart progress");
        }
    }

    info!(runs = summary.runs, failures = summary.failures, "periodic restart stopped");
    summary
}

/// Printed once before periodic restarts begin.
#[derive(Serialize)]
pub struct PeriodicNotice {
    pub interval_secs: u64,
}

impl Render for PeriodicNotice {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Restarting dynos every {} seconds...", self.interval_secs)
    }
}

/// One periodic restart run.
#[derive(Serialize)]
pub struct RestartTick {
    pub run: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Render for RestartTick {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        match &self.error {
            None => writeln!(w, "[{}] Dynos restarted.", self.run),
            Some(e) => writeln!(w, "[{}] {} {}", self.run, "Restart failed:".red(), e),
        }
    }
}

/// Final restart report.
#[derive(Serialize)]
pub struct RestartSummary {
    /// Interval between runs (None = single run)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    pub runs: u64,
    pub failures: u64,
    /// Last successfully executed command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command: Option<String>,
}

impl Render for RestartSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if self.interval_secs.is_none() {
            writeln!(w, "{}", "All dynos restarted.".green().bold())?;
            if let Some(command) = &self.last_command {
                writeln!(w, "  Command: {command}")?;
            }
            return Ok(());
        }

        writeln!(
            w,
            "Periodic restart stopped after {} run(s), {} failed.",
            self.runs, self.failures
        )?;
        Ok(())
    }
}
