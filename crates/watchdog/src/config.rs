//! 워치독 설정
//!
//! [`WatchdogConfig`]는 core의 [`DynowatchConfig`]를 기반으로
//! 문자열 필드를 타입이 있는 열거형으로 변환한 런타임 설정을 제공합니다.
//!
//! # 사용 예시
//! ```ignore
//! use dynowatch_core::config::DynowatchConfig;
//! use dynowatch_watchdog::config::WatchdogConfig;
//!
//! let core_config = DynowatchConfig::default();
//! let config = WatchdogConfig::from_core(&core_config)?;
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use dynowatch_core::config::{DEFAULT_API_URL, DEFAULT_SIGNATURE, DynowatchConfig};
use dynowatch_core::types::ProcessFormation;

use crate::error::WatchdogError;
use crate::matcher::{MatchMode, SignatureMatcher};
use crate::remediation::RemediationStrategy;

/// 로그 소스 모드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Platform API로 최근 로그를 1회 조회
    Api,
    /// 플랫폼 CLI로 실시간 tail
    #[default]
    Cli,
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Api => write!(f, "api"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

impl FromStr for SourceMode {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(Self::Api),
            "cli" => Ok(Self::Cli),
            _ => Err(config_err(
                "source.mode",
                format!("unknown source mode '{s}' (expected: api, cli)"),
            )),
        }
    }
}

/// 플랫폼 명령 실행 백엔드
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// 플랫폼 CLI 프로세스 실행
    #[default]
    Cli,
    /// Platform API HTTP 호출
    Api,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => write!(f, "cli"),
            Self::Api => write!(f, "api"),
        }
    }
}

impl FromStr for Backend {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cli" => Ok(Self::Cli),
            "api" => Ok(Self::Api),
            _ => Err(config_err(
                "remediation.backend",
                format!("unknown backend '{s}' (expected: cli, api)"),
            )),
        }
    }
}

/// 워치독 런타임 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// 대상 앱 이름 (비어 있으면 CLI 현재 앱 컨텍스트)
    pub app_name: String,
    /// Platform API 기본 주소
    pub api_url: String,
    /// API Bearer 토큰
    pub api_token: String,
    /// 플랫폼 CLI 실행 파일
    pub cli_bin: String,

    /// 로그 소스 모드
    pub source_mode: SourceMode,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,

    /// 매칭 방식
    pub match_mode: MatchMode,
    /// 시그니처 패턴
    pub pattern: String,

    /// 복구 전략
    pub strategy: RemediationStrategy,
    /// 명령 실행 백엔드
    pub backend: Backend,
    /// 대상 프로세스 타입
    pub process_type: String,
    /// 스케일 다운 목표
    pub scale_down_to: u32,
    /// 스케일 업 목표
    pub scale_up_to: u32,
    /// 스케일 다운 후 대기 (초)
    pub wait_secs: u64,
    /// 재트리거 금지 시간 (초)
    pub cooldown_secs: u64,
    /// 명령 1회 타임아웃 (초)
    pub action_timeout_secs: u64,
    /// 재시도 최대 횟수
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 주기적 재시작 간격 (초)
    pub restart_interval_secs: u64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            api_url: DEFAULT_API_URL.to_owned(),
            api_token: String::new(),
            cli_bin: "heroku".to_owned(),
            source_mode: SourceMode::Cli,
            max_line_length: 64 * 1024,
            match_mode: MatchMode::Contains,
            pattern: DEFAULT_SIGNATURE.to_owned(),
            strategy: RemediationStrategy::ScaleCycle,
            backend: Backend::Cli,
            process_type: "web".to_owned(),
            scale_down_to: 0,
            scale_up_to: 1,
            wait_secs: 60,
            cooldown_secs: 300,
            action_timeout_secs: 120,
            retry_max_attempts: 2,
            retry_backoff_base_ms: 1000,
            restart_interval_secs: 20,
        }
    }
}

const MAX_WAIT_SECS: u64 = 3600;
const MAX_COOLDOWN_SECS: u64 = 86_400;
const MAX_ACTION_TIMEOUT_SECS: u64 = 600;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 60_000;

impl WatchdogConfig {
    /// core의 `DynowatchConfig`에서 워치독 설정을 생성합니다.
    ///
    /// 열거형 문자열을 파싱하므로 알 수 없는 값이면 에러를 반환합니다.
    pub fn from_core(core: &DynowatchConfig) -> Result<Self, WatchdogError> {
        Ok(Self {
            app_name: core.platform.app_name.clone(),
            api_url: core.platform.api_url.clone(),
            api_token: core.platform.api_token.clone(),
            cli_bin: core.platform.cli_bin.clone(),
            source_mode: core.source.mode.parse()?,
            max_line_length: core.source.max_line_length,
            match_mode: core.matcher.mode.parse()?,
            pattern: core.matcher.pattern.clone(),
            strategy: core.remediation.strategy.parse()?,
            backend: core.remediation.backend.parse()?,
            process_type: core.remediation.process_type.clone(),
            scale_down_to: core.remediation.scale_down_to,
            scale_up_to: core.remediation.scale_up_to,
            wait_secs: core.remediation.wait_secs,
            cooldown_secs: core.remediation.cooldown_secs,
            action_timeout_secs: core.remediation.action_timeout_secs,
            retry_max_attempts: core.remediation.retry_max_attempts,
            retry_backoff_base_ms: core.remediation.retry_backoff_base_ms,
            restart_interval_secs: core.remediation.restart_interval_secs,
        })
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 정규식 모드에서는 패턴 컴파일까지 확인합니다.
    pub fn validate(&self) -> Result<(), WatchdogError> {
        SignatureMatcher::new(self.match_mode, self.pattern.as_str())?;

        if self.max_line_length == 0 {
            return Err(config_err("max_line_length", "must be greater than 0"));
        }

        if self.process_type.is_empty()
            || !self
                .process_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(config_err(
                "process_type",
                "must be a non-empty name of [A-Za-z0-9_-]",
            ));
        }

        if self.scale_up_to <= self.scale_down_to {
            return Err(config_err(
                "scale_up_to",
                "must be greater than scale_down_to",
            ));
        }

        if self.wait_secs > MAX_WAIT_SECS {
            return Err(config_err("wait_secs", format!("must be 0-{MAX_WAIT_SECS}")));
        }

        if self.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(config_err(
                "cooldown_secs",
                format!("must be 0-{MAX_COOLDOWN_SECS}"),
            ));
        }

        if self.action_timeout_secs == 0 || self.action_timeout_secs > MAX_ACTION_TIMEOUT_SECS {
            return Err(config_err(
                "action_timeout_secs",
                format!("must be 1-{MAX_ACTION_TIMEOUT_SECS}"),
            ));
        }

        if self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(config_err(
                "retry_max_attempts",
                format!("must be 0-{MAX_RETRY_ATTEMPTS}"),
            ));
        }

        if self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS {
            return Err(config_err(
                "retry_backoff_base_ms",
                format!("must be 0-{MAX_RETRY_BACKOFF_BASE_MS}"),
            ));
        }

        if self.restart_interval_secs == 0 {
            return Err(config_err("restart_interval_secs", "must be greater than 0"));
        }

        let uses_api = self.source_mode == SourceMode::Api || self.backend == Backend::Api;
        if uses_api && (self.app_name.is_empty() || self.api_url.is_empty()) {
            return Err(config_err(
                "app_name",
                "app_name and api_url must be set when the api source or backend is used",
            ));
        }

        let uses_cli = self.source_mode == SourceMode::Cli || self.backend == Backend::Cli;
        if uses_cli && self.cli_bin.is_empty() {
            return Err(config_err("cli_bin", "cli_bin must not be empty"));
        }

        Ok(())
    }

    /// 스케일 다운 목표를 반환합니다.
    pub fn scale_down_formation(&self) -> ProcessFormation {
        ProcessFormation::new(self.process_type.as_str(), self.scale_down_to)
    }

    /// 스케일 업 목표를 반환합니다.
    pub fn scale_up_formation(&self) -> ProcessFormation {
        ProcessFormation::new(self.process_type.as_str(), self.scale_up_to)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }

    pub fn retry_backoff_base(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_base_ms)
    }

    pub fn restart_interval(&self) -> Duration {
        Duration::from_secs(self.restart_interval_secs)
    }

    /// `--app` 인자로 전달할 앱 이름 (비어 있으면 None)
    pub fn app(&self) -> Option<&str> {
        (!self.app_name.is_empty()).then_some(self.app_name.as_str())
    }
}

/// 워치독 설정 빌더
#[derive(Default)]
pub struct WatchdogConfigBuilder {
    config: WatchdogConfig,
}

impl WatchdogConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 대상 앱 이름을 설정합니다.
    pub fn app_name(mut self, app: impl Into<String>) -> Self {
        self.config.app_name = app.into();
        self
    }

    /// Platform API 주소를 설정합니다.
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// API 토큰을 설정합니다.
    pub fn api_token(mut self, token: impl Into<String>) -> Self {
        self.config.api_token = token.into();
        self
    }

    /// CLI 실행 파일을 설정합니다.
    pub fn cli_bin(mut self, bin: impl Into<String>) -> Self {
        self.config.cli_bin = bin.into();
        self
    }

    /// 로그 소스 모드를 설정합니다.
    pub fn source_mode(mut self, mode: SourceMode) -> Self {
        self.config.source_mode = mode;
        self
    }

    /// 매칭 방식과 패턴을 설정합니다.
    pub fn matcher(mut self, mode: MatchMode, pattern: impl Into<String>) -> Self {
        self.config.match_mode = mode;
        self.config.pattern = pattern.into();
        self
    }

    /// 복구 전략을 설정합니다.
    pub fn strategy(mut self, strategy: RemediationStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// 명령 실행 백엔드를 설정합니다.
    pub fn backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    /// 대상 프로세스 타입과 스케일 목표를 설정합니다.
    pub fn formation(mut self, process_type: impl Into<String>, down: u32, up: u32) -> Self {
        self.config.process_type = process_type.into();
        self.config.scale_down_to = down;
        self.config.scale_up_to = up;
        self
    }

    /// 스케일 다운 후 대기 시간(초)을 설정합니다.
    pub fn wait_secs(mut self, secs: u64) -> Self {
        self.config.wait_secs = secs;
        self
    }

    /// 쿨다운(초)을 설정합니다.
    pub fn cooldown_secs(mut self, secs: u64) -> Self {
        self.config.cooldown_secs = secs;
        self
    }

    /// 명령 타임아웃(초)을 설정합니다.
    pub fn action_timeout_secs(mut self, secs: u64) -> Self {
        self.config.action_timeout_secs = secs;
        self
    }

    /// 재시도 최대 횟수를 설정합니다.
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_max_attempts = attempts;
        self
    }

    /// 재시도 백오프 기본 간격(밀리초)을 설정합니다.
    pub fn retry_backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_base_ms = ms;
        self
    }

    /// 주기적 재시작 간격(초)을 설정합니다.
    pub fn restart_interval_secs(mut self, secs: u64) -> Self {
        self.config.restart_interval_secs = secs;
        self
    }

    /// 설정을 검증하고 `WatchdogConfig`를 생성합니다.
    pub fn build(self) -> Result<WatchdogConfig, WatchdogError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

fn config_err(field: &str, reason: impl Into<String>) -> WatchdogError {
    WatchdogError::Config {
        field: field.to_owned(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        WatchdogConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_default_matches_default() {
        let config = WatchdogConfig::from_core(&DynowatchConfig::default()).unwrap();
        let default = WatchdogConfig::default();
        assert_eq!(config.source_mode, default.source_mode);
        assert_eq!(config.match_mode, default.match_mode);
        assert_eq!(config.strategy, default.strategy);
        assert_eq!(config.backend, default.backend);
        assert_eq!(config.pattern, default.pattern);
        assert_eq!(config.wait_secs, 60);
        assert_eq!(config.cooldown_secs, 300);
    }

    #[test]
    fn from_core_parses_enums() {
        let mut core = DynowatchConfig::default();
        core.source.mode = "api".to_owned();
        core.matcher.mode = "exact".to_owned();
        core.remediation.strategy = "restart".to_owned();
        core.remediation.backend = "api".to_owned();
        let config = WatchdogConfig::from_core(&core).unwrap();
        assert_eq!(config.source_mode, SourceMode::Api);
        assert_eq!(config.match_mode, MatchMode::Exact);
        assert_eq!(config.strategy, RemediationStrategy::Restart);
        assert_eq!(config.backend, Backend::Api);
    }

    #[test]
    fn from_core_rejects_unknown_backend() {
        let mut core = DynowatchConfig::default();
        core.remediation.backend = "ssh".to_owned();
        let err = WatchdogConfig::from_core(&core).unwrap_err();
        assert!(err.to_string().contains("remediation.backend"));
    }

    #[test]
    fn validate_rejects_uncompilable_regex() {
        let config = WatchdogConfig {
            match_mode: MatchMode::Regex,
            pattern: "[unclosed".to_owned(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate().unwrap_err(),
            WatchdogError::Regex(_)
        ));
    }

    #[test]
    fn validate_requires_app_for_api_backend() {
        let config = WatchdogConfig {
            backend: Backend::Api,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WatchdogConfig {
            backend: Backend::Api,
            app_name: "mockup-backend-128".to_owned(),
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn formations_follow_process_type() {
        let config = WatchdogConfigBuilder::new()
            .formation("worker", 1, 3)
            .build()
            .unwrap();
        assert_eq!(config.scale_down_formation().to_string(), "worker=1");
        assert_eq!(config.scale_up_formation().to_string(), "worker=3");
    }

    #[test]
    fn builder_rejects_inverted_formation() {
        let result = WatchdogConfigBuilder::new().formation("web", 1, 0).build();
        assert!(result.is_err());
    }

    #[test]
    fn app_is_none_when_empty() {
        assert!(WatchdogConfig::default().app().is_none());
        let config = WatchdogConfigBuilder::new()
            .app_name("my-app")
            .build()
            .unwrap();
        assert_eq!(config.app(), Some("my-app"));
    }

    #[test]
    fn durations() {
        let config = WatchdogConfig::default();
        assert_eq!(config.wait(), Duration::from_secs(60));
        assert_eq!(config.retry_backoff_base(), Duration::from_millis(1000));
        assert_eq!(config.restart_interval(), Duration::from_secs(20));
    }
}
