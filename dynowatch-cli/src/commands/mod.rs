//! Command handlers -- one module per subcommand
//!
//! Shared plumbing lives here: effective config loading (file, env, CLI flags)
//! and the progress printer that turns remediation state transitions into
//! operator-facing lines.

pub mod check;
pub mod config;
pub mod restart;
pub mod scale;
pub mod watch;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use dynowatch_core::config::DynowatchConfig;
use dynowatch_core::error::{ConfigError, DynowatchError};
use dynowatch_watchdog::{
    PlatformBackend, RemediationEvent, RemediationExecutor, RemediationState, SignatureMatcher,
    Watchdog, WatchdogConfig, WatchdogError,
};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Progress channel capacity. One remediation emits at most three events.
const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Load the effective configuration.
///
/// Order: file, then `DYNOWATCH_*` env overrides, then CLI flags, then validation.
/// A missing file is only an error when the user passed `--config` explicitly.
///
/// # Errors
///
/// Returns `CliError::Core` wrapping the config error (exit code 2) on
/// parse or validation failure.
pub async fn load_config(
    path: &Path,
    explicit: bool,
    log_level: Option<&str>,
    app: Option<&str>,
) -> Result<DynowatchConfig, CliError> {
    let mut config = match DynowatchConfig::from_file(path).await {
        Ok(config) => config,
        Err(DynowatchError::Config(ConfigError::FileNotFound { .. })) if !explicit => {
            debug!(path = %path.display(), "config file not found, using defaults");
            DynowatchConfig::default()
        }
        Err(e) => return Err(e.into()),
    };

    config.apply_env_overrides();

    if let Some(level) = log_level {
        config.general.log_level = level.to_owned();
    }
    if let Some(app) = app {
        config.platform.app_name = app.to_owned();
    }

    config.validate()?;
    Ok(config)
}

/// Build the platform backend selected by `remediation.backend`.
pub(crate) fn build_platform(config: &WatchdogConfig) -> Result<Arc<PlatformBackend>, CliError> {
    Ok(Arc::new(PlatformBackend::from_config(config)?))
}

/// Build a watchdog whose executor reports state transitions on `events`.
pub(crate) fn build_watchdog(
    platform: Arc<PlatformBackend>,
    config: &WatchdogConfig,
    events: mpsc::Sender<RemediationEvent>,
) -> Result<Watchdog<PlatformBackend>, CliError> {
    config.validate()?;
    let matcher = SignatureMatcher::new(config.match_mode, config.pattern.as_str())?;
    let executor = RemediationExecutor::new(platform, config).with_events(events);
    Ok(Watchdog::new(matcher, executor))
}

/// Map a log source construction error to a CLI error.
///
/// A CLI that fails to start is a retrieval failure (exit 3); a bad app name
/// stays a configuration error (exit 2).
pub(crate) fn source_error(e: WatchdogError) -> CliError {
    match e {
        WatchdogError::Spawn { .. } => CliError::Retrieval(e.to_string()),
        other => other.into(),
    }
}

/// Spawn a task that prints every remediation event as it arrives.
///
/// The task ends once every sender is dropped; await the handle afterwards
/// so the last progress line is flushed before the final report.
pub(crate) fn spawn_progress_printer(
    writer: OutputWriter,
) -> (mpsc::Sender<RemediationEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<RemediationEvent>(PROGRESS_CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Err(e) = writer.render_line(&event) {
                warn!(error = %e, "failed to print remediation progress");
            }
        }
    });
    (tx, handle)
}

/// Wait for the progress printer to drain.
pub(crate) async fn finish_progress(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        warn!(error = %e, "progress printer task failed");
    }
}

/// Cancel `cancel` on the first Ctrl-C.
///
/// Abort the returned handle once the guarded work is done.
pub(crate) fn spawn_interrupt_handler(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, stopping");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for ctrl-c"),
        }
    })
}

impl Render for RemediationEvent {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        let process_type = self
            .target
            .as_ref()
            .map_or("web", |f| f.process_type.as_str());

        match self.state {
            RemediationState::ScalingDown => writeln!(
                w,
                "Exceeded max_user_connections. Scaling down {process_type} dynos..."
            ),
            RemediationState::Waiting => writeln!(
                w,
                "Waiting {}s before scaling up...",
                self.wait_secs.unwrap_or_default()
            ),
            RemediationState::ScalingUp => writeln!(w, "Scaling up {process_type} dynos..."),
            RemediationState::Restarting => {
                writeln!(w, "Exceeded max_user_connections. Restarting all dynos...")
            }
            RemediationState::Idle => Ok(()),
        }
    }
}
