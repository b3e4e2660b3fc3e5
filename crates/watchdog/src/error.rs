//! 워치독 에러 타입
//!
//! [`WatchdogError`]는 로그 소스, 매처, 플랫폼 명령, 복구 실행에서 발생하는 모든 에러를 표현합니다.
//! `From<WatchdogError> for DynowatchError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.

use dynowatch_core::error::{ConfigError, DynowatchError, RemediationError, SourceError};

/// 워치독 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum WatchdogError {
    /// 로그 조회 실패 (API 비정상 응답, 전송 실패, 응답 형식 오류)
    #[error("failed to retrieve logs: {0}")]
    Retrieval(String),

    /// 로그 스트림 프로세스 실행 실패
    #[error("failed to spawn '{command}': {reason}")]
    Spawn {
        /// 실행하려던 명령
        command: String,
        /// 실패 사유
        reason: String,
    },

    /// 플랫폼 명령 실패
    #[error("command '{command}' failed: {reason}")]
    Command {
        /// 실행한 명령 (예: "heroku ps:scale web=0")
        command: String,
        /// 실패 사유 (exit status, stderr, HTTP status 등)
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchdogError {
    /// 로그 조회 실패인지 확인합니다.
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Self::Retrieval(_))
    }
}

impl From<WatchdogError> for DynowatchError {
    fn from(err: WatchdogError) -> Self {
        match err {
            WatchdogError::Retrieval(reason) => {
                DynowatchError::Source(SourceError::Retrieval(reason))
            }
            WatchdogError::Spawn { command, reason } => {
                DynowatchError::Source(SourceError::Spawn(format!("{command}: {reason}")))
            }
            WatchdogError::Command { command, reason } => {
                DynowatchError::Remediation(RemediationError::CommandFailed { command, reason })
            }
            WatchdogError::Config { field, reason } => {
                DynowatchError::Config(ConfigError::InvalidValue { field, reason })
            }
            WatchdogError::Regex(e) => DynowatchError::Config(ConfigError::InvalidValue {
                field: "matcher.pattern".to_owned(),
                reason: e.to_string(),
            }),
            WatchdogError::Io(e) => DynowatchError::Io(e),
        }
    }
}
