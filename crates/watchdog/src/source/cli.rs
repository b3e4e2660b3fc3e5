//! 플랫폼 CLI tail 로그 소스
//!
//! `<cli_bin> logs --tail [--app <app>]`를 실행하고 stdout을 한 줄씩 읽습니다.
//! [`CliTailSource::spawn_recent`]는 `--tail` 없이 최근 로그만 출력하고 끝나는 1회 조회입니다.
//! 프로세스가 종료되어 stdout이 닫히면 시퀀스가 끝납니다.
//! 소스가 drop되면 자식 프로세스도 종료됩니다.

use std::process::Stdio;

use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

use dynowatch_core::types::LogLine;

use crate::error::WatchdogError;
use crate::source::{LogSource, ReaderSource};

/// CLI tail 로그 소스
pub struct CliTailSource {
    child: Child,
    reader: ReaderSource<BufReader<ChildStdout>>,
    command: String,
    follow: bool,
}

impl CliTailSource {
    /// tail 프로세스를 시작합니다.
    pub fn spawn(
        cli_bin: &str,
        app: Option<&str>,
        max_line_length: usize,
    ) -> Result<Self, WatchdogError> {
        Self::spawn_with(cli_bin, app, max_line_length, true)
    }

    /// 최근 로그를 한 번 출력하고 종료하는 `logs` 프로세스를 시작합니다.
    pub fn spawn_recent(
        cli_bin: &str,
        app: Option<&str>,
        max_line_length: usize,
    ) -> Result<Self, WatchdogError> {
        Self::spawn_with(cli_bin, app, max_line_length, false)
    }

    fn spawn_with(
        cli_bin: &str,
        app: Option<&str>,
        max_line_length: usize,
        follow: bool,
    ) -> Result<Self, WatchdogError> {
        let mut args = vec!["logs"];
        if follow {
            args.push("--tail");
        }
        if let Some(app) = app {
            args.extend(["--app", app]);
        }
        let command = format!("{cli_bin} {}", args.join(" "));

        let mut child = Command::new(cli_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WatchdogError::Spawn {
                command: command.clone(),
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| WatchdogError::Spawn {
            command: command.clone(),
            reason: "stdout was not captured".to_owned(),
        })?;

        info!(command = %command, pid = child.id(), follow, "log process started");

        let name = format!("cli:{command}");
        Ok(Self {
            child,
            reader: ReaderSource::new(BufReader::new(stdout), name, max_line_length),
            command,
            follow,
        })
    }
}

impl LogSource for CliTailSource {
    fn describe(&self) -> &str {
        self.reader.describe()
    }

    async fn next_line(&mut self) -> Result<Option<LogLine>, WatchdogError> {
        let line = self.reader.next_line().await?;
        if line.is_none() {
            let status = self.child.try_wait().ok().flatten();
            if !self.follow {
                debug!(command = %self.command, status = ?status, "log output finished");
                return Ok(None);
            }
            warn!(
                command = %self.command,
                status = ?status,
                "log tail stream ended"
            );
        }
        Ok(line)
    }
}
