//! 설정 관리 -- dynowatch.toml 파싱 및 런타임 설정
//!
//! [`DynowatchConfig`]는 모든 섹션의 설정을 담는 최상위 구조체입니다.
//! 기본값은 앱 로그 tail, `web=0` → 60초 → `web=1` 스케일 사이클입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DYNOWATCH_PLATFORM_APP_NAME=my-app` 형식)
//! 3. 설정 파일 (`dynowatch.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), dynowatch_core::error::DynowatchError> {
//! use dynowatch_core::config::DynowatchConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DynowatchConfig::load("dynowatch.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DynowatchConfig::parse("[remediation]\nwait_secs = 30")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DynowatchError};

/// 감시 대상 에러 시그니처 기본값
pub const DEFAULT_SIGNATURE: &str =
    "Error: ER_USER_LIMIT_REACHED: User 'bb119cab8b99eb' has exceeded the 'max_user_connections'";

/// Heroku Platform API 기본 주소
pub const DEFAULT_API_URL: &str = "https://api.heroku.com";

/// dynowatch 통합 설정
///
/// `dynowatch.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DynowatchConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 호스팅 플랫폼 접속 설정
    #[serde(default)]
    pub platform: PlatformConfig,
    /// 로그 소스 설정
    #[serde(default)]
    pub source: SourceConfig,
    /// 에러 시그니처 매처 설정
    #[serde(default)]
    pub matcher: MatcherConfig,
    /// 복구 액션 설정
    #[serde(default)]
    pub remediation: RemediationConfig,
}

impl DynowatchConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DynowatchError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// 설정 파일이 없으면 기본값에서 시작하여 로드합니다.
    ///
    /// 사용자가 경로를 명시하지 않았을 때 사용합니다.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, DynowatchError> {
        let mut config = match Self::from_file(path).await {
            Ok(config) => config,
            Err(DynowatchError::Config(ConfigError::FileNotFound { path })) => {
                tracing::debug!(path = %path, "config file not found, using defaults");
                Self::default()
            }
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음, 검증 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DynowatchError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DynowatchError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DynowatchError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DynowatchError> {
        toml::from_str(toml_str).map_err(|e| {
            DynowatchError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DYNOWATCH_{SECTION}_{FIELD}`
    /// 예: `DYNOWATCH_REMEDIATION_WAIT_SECS=30`
    ///
    /// 앱 이름과 API 토큰은 비어 있을 때 Heroku 관례 변수
    /// (`HEROKU_APP_ID`, `HEROKU_APP`, `HEROKU_API_TOKEN`, `HEROKU_API_KEY`)에서도 읽습니다.
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DYNOWATCH_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DYNOWATCH_GENERAL_LOG_FORMAT");

        // Platform
        fallback_string(&mut self.platform.app_name, &["HEROKU_APP_ID", "HEROKU_APP"]);
        fallback_string(
            &mut self.platform.api_token,
            &["HEROKU_API_TOKEN", "HEROKU_API_KEY"],
        );
        override_string(&mut self.platform.app_name, "DYNOWATCH_PLATFORM_APP_NAME");
        override_string(&mut self.platform.api_url, "DYNOWATCH_PLATFORM_API_URL");
        override_string(&mut self.platform.api_token, "DYNOWATCH_PLATFORM_API_TOKEN");
        override_string(&mut self.platform.cli_bin, "DYNOWATCH_PLATFORM_CLI_BIN");

        // Source
        override_string(&mut self.source.mode, "DYNOWATCH_SOURCE_MODE");
        override_usize(
            &mut self.source.max_line_length,
            "DYNOWATCH_SOURCE_MAX_LINE_LENGTH",
        );

        // Matcher
        override_string(&mut self.matcher.mode, "DYNOWATCH_MATCHER_MODE");
        override_string(&mut self.matcher.pattern, "DYNOWATCH_MATCHER_PATTERN");

        // Remediation
        override_string(
            &mut self.remediation.strategy,
            "DYNOWATCH_REMEDIATION_STRATEGY",
        );
        override_string(&mut self.remediation.backend, "DYNOWATCH_REMEDIATION_BACKEND");
        override_string(
            &mut self.remediation.process_type,
            "DYNOWATCH_REMEDIATION_PROCESS_TYPE",
        );
        override_u32(
            &mut self.remediation.scale_down_to,
            "DYNOWATCH_REMEDIATION_SCALE_DOWN_TO",
        );
        override_u32(
            &mut self.remediation.scale_up_to,
            "DYNOWATCH_REMEDIATION_SCALE_UP_TO",
        );
        override_u64(
            &mut self.remediation.wait_secs,
            "DYNOWATCH_REMEDIATION_WAIT_SECS",
        );
        override_u64(
            &mut self.remediation.cooldown_secs,
            "DYNOWATCH_REMEDIATION_COOLDOWN_SECS",
        );
        override_u64(
            &mut self.remediation.action_timeout_secs,
            "DYNOWATCH_REMEDIATION_ACTION_TIMEOUT_SECS",
        );
        override_u32(
            &mut self.remediation.retry_max_attempts,
            "DYNOWATCH_REMEDIATION_RETRY_MAX_ATTEMPTS",
        );
        override_u64(
            &mut self.remediation.retry_backoff_base_ms,
            "DYNOWATCH_REMEDIATION_RETRY_BACKOFF_BASE_MS",
        );
        override_u64(
            &mut self.remediation.restart_interval_secs,
            "DYNOWATCH_REMEDIATION_RESTART_INTERVAL_SECS",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DynowatchError> {
        check_one_of(
            "general.log_level",
            &self.general.log_level,
            &["trace", "debug", "info", "warn", "error"],
        )?;
        check_one_of(
            "general.log_format",
            &self.general.log_format,
            &["json", "pretty"],
        )?;
        check_one_of("source.mode", &self.source.mode, &["api", "cli"])?;
        check_one_of(
            "matcher.mode",
            &self.matcher.mode,
            &["exact", "contains", "regex"],
        )?;
        check_one_of(
            "remediation.strategy",
            &self.remediation.strategy,
            &["scale_cycle", "restart"],
        )?;
        check_one_of(
            "remediation.backend",
            &self.remediation.backend,
            &["cli", "api"],
        )?;

        if self.matcher.pattern.is_empty() {
            return Err(invalid("matcher.pattern", "pattern must not be empty"));
        }

        if self.source.max_line_length == 0 {
            return Err(invalid("source.max_line_length", "must be greater than 0"));
        }

        let uses_api = self.source.mode == "api" || self.remediation.backend == "api";
        if uses_api {
            if self.platform.app_name.is_empty() {
                return Err(invalid(
                    "platform.app_name",
                    "app_name must be set when the api source or backend is used",
                ));
            }
            if self.platform.api_url.is_empty() {
                return Err(invalid(
                    "platform.api_url",
                    "api_url must not be empty when the api source or backend is used",
                ));
            }
        }

        let uses_cli = self.source.mode == "cli" || self.remediation.backend == "cli";
        if uses_cli && self.platform.cli_bin.is_empty() {
            return Err(invalid(
                "platform.cli_bin",
                "cli_bin must not be empty when the cli source or backend is used",
            ));
        }

        self.remediation.validate()
    }
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 호스팅 플랫폼 접속 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// 대상 앱 이름. 비어 있으면 CLI의 현재 앱 컨텍스트를 사용
    pub app_name: String,
    /// Platform API 기본 주소
    pub api_url: String,
    /// API Bearer 토큰
    pub api_token: String,
    /// 플랫폼 CLI 실행 파일
    pub cli_bin: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            api_url: DEFAULT_API_URL.to_owned(),
            api_token: String::new(),
            cli_bin: "heroku".to_owned(),
        }
    }
}

/// 로그 소스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 소스 모드 (api: 1회 조회, cli: 실시간 tail)
    pub mode: String,
    /// 최대 라인 길이 (바이트)
    pub max_line_length: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: "cli".to_owned(),
            max_line_length: 64 * 1024, // 64KB
        }
    }
}

/// 에러 시그니처 매처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// 매칭 방식 (exact, contains, regex)
    pub mode: String,
    /// 시그니처 문자열 또는 정규식
    pub pattern: String,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            mode: "contains".to_owned(),
            pattern: DEFAULT_SIGNATURE.to_owned(),
        }
    }
}

/// 복구 액션 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// 복구 전략 (scale_cycle, restart)
    pub strategy: String,
    /// 명령 실행 백엔드 (cli, api)
    pub backend: String,
    /// 대상 프로세스 타입
    pub process_type: String,
    /// 스케일 다운 목표 인스턴스 수
    pub scale_down_to: u32,
    /// 스케일 업 목표 인스턴스 수
    pub scale_up_to: u32,
    /// 스케일 다운 후 대기 시간 (초)
    pub wait_secs: u64,
    /// 복구 완료 후 재트리거 금지 시간 (초)
    pub cooldown_secs: u64,
    /// 명령 1회 타임아웃 (초)
    pub action_timeout_secs: u64,
    /// 명령 실패 시 재시도 최대 횟수
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 주기적 재시작 간격 (초)
    pub restart_interval_secs: u64,
}

impl Default for RemediationConfig {
    fn default() -> Self {
        Self {
            strategy: "scale_cycle".to_owned(),
            backend: "cli".to_owned(),
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

/// 설정 상한값 상수
const MAX_WAIT_SECS: u64 = 3600;
const MAX_COOLDOWN_SECS: u64 = 86_400;
const MAX_ACTION_TIMEOUT_SECS: u64 = 600;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 60_000;

impl RemediationConfig {
    /// 복구 설정의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DynowatchError> {
        if self.process_type.is_empty()
            || !self
                .process_type
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid(
                "remediation.process_type",
                "must be a non-empty name of [A-Za-z0-9_-]",
            ));
        }

        if self.scale_up_to <= self.scale_down_to {
            return Err(invalid(
                "remediation.scale_up_to",
                "must be greater than scale_down_to",
            ));
        }

        if self.wait_secs > MAX_WAIT_SECS {
            return Err(invalid(
                "remediation.wait_secs",
                &format!("must be 0-{MAX_WAIT_SECS}"),
            ));
        }

        if self.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(invalid(
                "remediation.cooldown_secs",
                &format!("must be 0-{MAX_COOLDOWN_SECS}"),
            ));
        }

        if self.action_timeout_secs == 0 || self.action_timeout_secs > MAX_ACTION_TIMEOUT_SECS {
            return Err(invalid(
                "remediation.action_timeout_secs",
                &format!("must be 1-{MAX_ACTION_TIMEOUT_SECS}"),
            ));
        }

        if self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(invalid(
                "remediation.retry_max_attempts",
                &format!("must be 0-{MAX_RETRY_ATTEMPTS}"),
            ));
        }

        if self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS {
            return Err(invalid(
                "remediation.retry_backoff_base_ms",
                &format!("must be 0-{MAX_RETRY_BACKOFF_BASE_MS}"),
            ));
        }

        if self.restart_interval_secs == 0 {
            return Err(invalid(
                "remediation.restart_interval_secs",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

// --- 검증 헬퍼 ---

fn invalid(field: &str, reason: &str) -> DynowatchError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason: reason.to_owned(),
    }
    .into()
}

fn check_one_of(field: &str, value: &str, allowed: &[&str]) -> Result<(), DynowatchError> {
    if allowed.contains(&value) {
        Ok(())
    } else {
        Err(invalid(
            field,
            &format!("must be one of: {}", allowed.join(", ")),
        ))
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn fallback_string(target: &mut String, env_keys: &[&str]) {
    if !target.is_empty() {
        return;
    }
    if let Some(val) = env_keys
        .iter()
        .find_map(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u32(target: &mut u32, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u32 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}
