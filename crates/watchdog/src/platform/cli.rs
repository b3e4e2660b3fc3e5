//! 플랫폼 CLI 백엔드
//!
//! `heroku ps:scale web=0 --app <app>`처럼 CLI 프로세스를 실행하고
//! exit status를 확인합니다. 타임아웃은 호출자(복구 실행기)가 적용하며,
//! 타임아웃으로 future가 drop되면 자식 프로세스도 종료됩니다.

use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use dynowatch_core::types::ProcessFormation;

use crate::error::WatchdogError;
use crate::platform::{CommandOutput, PlatformClient};

/// 플랫폼 CLI 클라이언트
#[derive(Debug, Clone)]
pub struct HerokuCliClient {
    cli_bin: String,
    app: Option<String>,
}

impl HerokuCliClient {
    /// 새 CLI 클라이언트를 생성합니다.
    ///
    /// `app`이 None이면 `--app` 인자 없이 CLI의 현재 앱 컨텍스트를 사용합니다.
    pub fn new(cli_bin: impl Into<String>, app: Option<&str>) -> Self {
        Self {
            cli_bin: cli_bin.into(),
            app: app.map(str::to_owned),
        }
    }

    fn args_with_app<'a>(&'a self, args: &[&'a str]) -> Vec<&'a str> {
        let mut all = args.to_vec();
        if let Some(app) = self.app.as_deref() {
            all.extend(["--app", app]);
        }
        all
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput, WatchdogError> {
        let args = self.args_with_app(args);
        let command = format!("{} {}", self.cli_bin, args.join(" "));
        debug!(command = %command, "running platform command");

        let output = Command::new(&self.cli_bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| WatchdogError::Command {
                command: command.clone(),
                reason: format!("failed to execute: {e}"),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();

        if !output.status.success() {
            let reason = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {stderr}", output.status)
            };
            return Err(WatchdogError::Command { command, reason });
        }

        Ok(CommandOutput {
            command,
            success: true,
            status: output.status.code(),
            stdout,
            stderr,
        })
    }
}

impl PlatformClient for HerokuCliClient {
    fn name(&self) -> &str {
        "cli"
    }

    async fn scale(&self, formation: &ProcessFormation) -> Result<CommandOutput, WatchdogError> {
        let target = formation.to_string();
        self.run(&["ps:scale", target.as_str()]).await
    }

    async fn restart(&self) -> Result<CommandOutput, WatchdogError> {
        self.run(&["ps:restart"]).await
    }
}
