//! `dynowatch scale` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use dynowatch_core::config::DynowatchConfig;
use dynowatch_core::types::ProcessFormation;
use dynowatch_watchdog::{CommandOutput, RemediationExecutor, WatchdogConfig};

use crate::cli::ScaleArgs;
use crate::commands::build_platform;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `scale` command.
///
/// Runs one scaling command through the configured backend, with the
/// configured timeout and retries. Cooldown does not apply.
pub async fn execute(
    args: ScaleArgs,
    config: &DynowatchConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let wd_config = WatchdogConfig::from_core(config)?;
    let platform = build_platform(&wd_config)?;
    let mut executor = RemediationExecutor::new(platform, &wd_config);

    info!(formation = %args.formation, "manual scale");
    let output = executor.scale(&args.formation).await?;

    writer.render(&ScaleReport {
        formation: args.formation,
        output,
    })?;
    Ok(())
}

/// Result of a manual scaling command.
#[derive(Serialize)]
pub struct ScaleReport {
    pub formation: ProcessFormation,
    pub output: CommandOutput,
}

impl Render for ScaleReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} {}",
            "Scaled".green().bold(),
            self.formation.to_string().bold()
        )?;
        writeln!(w, "  Command: {}", self.output.command)?;
        let stdout = self.output.stdout.trim();
        if !stdout.is_empty() {
            writeln!(w, "  Output:  {stdout}")?;
        }
        Ok(())
    }
}
