//! dynowatch -- connection-limit watchdog CLI
//!
//! Watches application logs for the database connection-limit error and
//! cycles the web dynos when it appears.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use dynowatch_cli::cli::{Cli, Commands};
use dynowatch_cli::commands;
use dynowatch_cli::commands::config::ConfigSource;
use dynowatch_cli::error::CliError;
use dynowatch_cli::logging::init_tracing;
use dynowatch_cli::output::OutputWriter;
use dynowatch_core::config::{DynowatchConfig, GeneralConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let (config_path, explicit) = cli.config_path();
    let log_level = cli.log_level.as_deref();
    let app = cli.app.as_deref();

    match cli.command {
        Commands::Config(args) => {
            // config 명령은 설정 파일이 깨져 있어도 동작해야 하므로 기본값으로 로깅 초기화
            let mut general = GeneralConfig::default();
            if let Some(level) = log_level {
                general.log_level = level.to_owned();
            }
            init_logging(&general)?;

            let source = ConfigSource {
                path: &config_path,
                explicit,
                log_level,
                app,
            };
            commands::config::execute(args, source, &writer).await
        }
        Commands::Check(args) => {
            let config = prepare(&config_path, explicit, log_level, app).await?;
            commands::check::execute(args, &config, &writer).await
        }
        Commands::Watch(args) => {
            let config = prepare(&config_path, explicit, log_level, app).await?;
            commands::watch::execute(args, &config, &writer).await
        }
        Commands::Restart(args) => {
            let config = prepare(&config_path, explicit, log_level, app).await?;
            commands::restart::execute(args, &config, &writer).await
        }
        Commands::Scale(args) => {
            let config = prepare(&config_path, explicit, log_level, app).await?;
            commands::scale::execute(args, &config, &writer).await
        }
    }
}

/// 유효 설정을 로드하고 그 설정으로 로깅을 초기화합니다.
async fn prepare(
    path: &Path,
    explicit: bool,
    log_level: Option<&str>,
    app: Option<&str>,
) -> Result<DynowatchConfig, CliError> {
    let config = commands::load_config(path, explicit, log_level, app).await?;
    init_logging(&config.general)?;
    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

fn init_logging(general: &GeneralConfig) -> Result<(), CliError> {
    init_tracing(general).map_err(|e| CliError::Config(e.to_string()))
}
