//! 호스팅 플랫폼 명령 추상화
//!
//! [`PlatformClient`] 트레이트는 스케일/재시작 명령을 추상화하여
//! 프로덕션에서는 [`HerokuCliClient`] 또는 [`HerokuApiClient`]를,
//! 테스트에서는 `MockPlatformClient`를 사용할 수 있게 합니다.
//!
//! ```text
//!  RemediationExecutor
//!          │
//!          ▼
//!   ┌──────────────┐
//!   │PlatformClient│ (trait)
//!   └──────────────┘
//!     │     │     │
//!     ▼     ▼     ▼
//!   Cli    Api   Mock
//! ```
//!
//! 모든 명령은 [`CommandOutput`]을 반환하며, 실패(non-zero exit, 비정상 HTTP status)는
//! `WatchdogError::Command`로 변환됩니다. 실패를 성공으로 간주하지 않습니다.

pub mod api;
pub mod cli;

use std::future::Future;

use serde::{Deserialize, Serialize};

use dynowatch_core::types::ProcessFormation;

use crate::config::{Backend, WatchdogConfig};
use crate::error::WatchdogError;

pub use api::HerokuApiClient;
pub use cli::HerokuCliClient;

/// 플랫폼 명령 실행 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    /// 실행한 명령 (예: "heroku ps:scale web=0")
    pub command: String,
    /// 성공 여부
    pub success: bool,
    /// exit code 또는 HTTP status
    pub status: Option<i32>,
    /// 표준 출력 또는 응답 본문
    pub stdout: String,
    /// 표준 에러
    pub stderr: String,
}

impl CommandOutput {
    /// 성공 결과를 생성합니다.
    pub fn success(command: impl Into<String>, status: Option<i32>, stdout: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            success: true,
            status,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// 플랫폼 명령 트레이트
///
/// # 구현체
/// - [`HerokuCliClient`]: `heroku ps:scale` / `heroku ps:restart` 프로세스 실행
/// - [`HerokuApiClient`]: Platform API `PATCH formation` / `DELETE dynos`
/// - `MockPlatformClient`: 호출 기록용 (테스트 전용)
pub trait PlatformClient: Send + Sync + 'static {
    /// 로그용 백엔드 이름
    fn name(&self) -> &str;

    /// 프로세스 타입의 인스턴스 수를 설정합니다.
    ///
    /// # Errors
    /// 명령이 실패하면 `WatchdogError::Command`를 반환합니다.
    fn scale(
        &self,
        formation: &ProcessFormation,
    ) -> impl Future<Output = Result<CommandOutput, WatchdogError>> + Send;

    /// 앱의 모든 dyno를 재시작합니다.
    ///
    /// # Errors
    /// 명령이 실패하면 `WatchdogError::Command`를 반환합니다.
    fn restart(&self) -> impl Future<Output = Result<CommandOutput, WatchdogError>> + Send;
}

/// 설정으로 선택되는 플랫폼 백엔드
pub enum PlatformBackend {
    /// 플랫폼 CLI
    Cli(HerokuCliClient),
    /// Platform API
    Api(HerokuApiClient),
}

impl PlatformBackend {
    /// 설정의 `backend` 값에 따라 클라이언트를 생성합니다.
    pub fn from_config(config: &WatchdogConfig) -> Result<Self, WatchdogError> {
        match config.backend {
            Backend::Cli => Ok(Self::Cli(HerokuCliClient::new(
                config.cli_bin.as_str(),
                config.app(),
            ))),
            Backend::Api => Ok(Self::Api(HerokuApiClient::from_config(config)?)),
        }
    }
}

impl PlatformClient for PlatformBackend {
    fn name(&self) -> &str {
        match self {
            Self::Cli(client) => client.name(),
            Self::Api(client) => client.name(),
        }
    }

    async fn scale(&self, formation: &ProcessFormation) -> Result<CommandOutput, WatchdogError> {
        match self {
            Self::Cli(client) => client.scale(formation).await,
            Self::Api(client) => client.scale(formation).await,
        }
    }

    async fn restart(&self) -> Result<CommandOutput, WatchdogError> {
        match self {
            Self::Cli(client) => client.restart().await,
            Self::Api(client) => client.restart().await,
        }
    }
}

/// Mock 클라이언트에 기록된 호출
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Scale(ProcessFormation),
    Restart,
}

/// 테스트용 Mock 플랫폼 클라이언트
///
/// 모든 호출을 (tokio) 시각과 함께 기록합니다.
#[cfg(test)]
#[derive(Default)]
pub struct MockPlatformClient {
    calls: std::sync::Mutex<Vec<(PlatformCall, tokio::time::Instant)>>,
    /// 이 수량으로의 스케일 요청을 실패시킴
    fail_scale_to: Option<u32>,
    /// 재시작 요청을 실패시킴
    fail_restart: bool,
}

#[cfg(test)]
impl MockPlatformClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_scale_to(mut self, quantity: u32) -> Self {
        self.fail_scale_to = Some(quantity);
        self
    }

    pub fn failing_restart(mut self) -> Self {
        self.fail_restart = true;
        self
    }

    /// 기록된 호출 목록
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.timed_calls().into_iter().map(|(c, _)| c).collect()
    }

    /// 기록된 호출과 시각
    pub fn timed_calls(&self) -> Vec<(PlatformCall, tokio::time::Instant)> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: PlatformCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((call, tokio::time::Instant::now()));
        }
    }
}

#[cfg(test)]
impl PlatformClient for MockPlatformClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scale(&self, formation: &ProcessFormation) -> Result<CommandOutput, WatchdogError> {
        self.record(PlatformCall::Scale(formation.clone()));
        let command = format!("mock ps:scale {formation}");
        if self.fail_scale_to == Some(formation.quantity) {
            return Err(WatchdogError::Command {
                command,
                reason: "mock failure".to_owned(),
            });
        }
        Ok(CommandOutput::success(command, Some(0), ""))
    }

    async fn restart(&self) -> Result<CommandOutput, WatchdogError> {
        self.record(PlatformCall::Restart);
        let command = "mock ps:restart".to_owned();
        if self.fail_restart {
            return Err(WatchdogError::Command {
                command,
                reason: "mock failure".to_owned(),
            });
        }
        Ok(CommandOutput::success(command, Some(0), ""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_records_calls_in_order() {
        let mock = MockPlatformClient::new();
        mock.scale(&ProcessFormation::new("web", 0)).await.unwrap();
        mock.restart().await.unwrap();
        assert_eq!(
            mock.calls(),
            vec![
                PlatformCall::Scale(ProcessFormation::new("web", 0)),
                PlatformCall::Restart
            ]
        );
    }

    #[tokio::test]
    async fn mock_fails_configured_quantity() {
        let mock = MockPlatformClient::new().failing_scale_to(0);
        assert!(mock.scale(&ProcessFormation::new("web", 0)).await.is_err());
        assert!(mock.scale(&ProcessFormation::new("web", 1)).await.is_ok());
    }

    #[test]
    fn backend_from_config_selects_cli_by_default() {
        let backend = PlatformBackend::from_config(&WatchdogConfig::default()).unwrap();
        assert!(matches!(backend, PlatformBackend::Cli(_)));
        assert_eq!(backend.name(), "cli");
    }

    #[test]
    fn backend_from_config_selects_api() {
        let config = WatchdogConfig {
            backend: Backend::Api,
            app_name: "my-app".to_owned(),
            ..Default::default()
        };
        let backend = PlatformBackend::from_config(&config).unwrap();
        assert_eq!(backend.name(), "api");
    }
}
