//! `dynowatch config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use dynowatch_core::config::DynowatchConfig;
use dynowatch_watchdog::WatchdogConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::load_config;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Placeholder printed instead of secrets.
const REDACTED: &str = "***REDACTED***";

/// Where to load configuration from and which CLI overrides apply.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSource<'a> {
    pub path: &'a Path,
    pub explicit: bool,
    pub log_level: Option<&'a str>,
    pub app: Option<&'a str>,
}

impl ConfigSource<'_> {
    async fn load(&self) -> Result<DynowatchConfig, CliError> {
        load_config(self.path, self.explicit, self.log_level, self.app).await
    }

    fn label(&self) -> String {
        if self.explicit || self.path.exists() {
            self.path.display().to_string()
        } else {
            "(defaults)".to_owned()
        }
    }
}

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    source: ConfigSource<'_>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(source, writer).await,
        ConfigAction::Show { section } => execute_show(source, section, writer).await,
    }
}

/// Load and validate the configuration, reporting any errors.
///
/// Runs both the file-level checks and the watchdog-level checks, so a
/// regex pattern that does not compile is reported here too.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails.
async fn execute_validate(source: ConfigSource<'_>, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %source.path.display(), "validating configuration");

    let result = match source.load().await {
        Ok(config) => WatchdogConfig::from_core(&config)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let report = ConfigValidationReport {
        source: source.label(),
        valid: result.is_ok(),
        errors: result.err().into_iter().collect(),
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Show the effective configuration (file + env overrides + CLI flags + defaults).
///
/// The API token is redacted.
///
/// # Errors
///
/// Returns the load error, or `CliError::Command` for an unknown section name.
async fn execute_show(
    source: ConfigSource<'_>,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %source.path.display(), "loading configuration");

    let mut config = source.load().await?;
    redact_credentials(&mut config);

    let config_toml = match section.as_deref() {
        None => to_toml(&config),
        Some("general") => to_toml(&config.general),
        Some("platform") => to_toml(&config.platform),
        Some("source") => to_toml(&config.source),
        Some("matcher") => to_toml(&config.matcher),
        Some("remediation") => to_toml(&config.remediation),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {other} (expected: general, platform, source, matcher, remediation)"
            )));
        }
    };

    writer.render(&ConfigReport {
        source: source.label(),
        section,
        config_toml,
    })?;

    Ok(())
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {e})"))
}

/// Replace the API token with a placeholder, leaving an empty token visible as empty.
fn redact_credentials(config: &mut DynowatchConfig) {
    if !config.platform.api_token.is_empty() {
        config.platform.api_token = REDACTED.to_owned();
    }
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration (with redacted credentials)
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{section}]");
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
