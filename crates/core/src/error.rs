//! 에러 타입 -- 도메인별 에러 정의

/// dynowatch 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DynowatchError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 로그 소스 에러
    #[error("log source error: {0}")]
    Source(#[from] SourceError),

    /// 복구 액션 에러
    #[error("remediation error: {0}")]
    Remediation(#[from] RemediationError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 로그 소스 에러
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// 로그 조회 실패 (API 비정상 응답, 전송 실패)
    #[error("failed to retrieve logs: {0}")]
    Retrieval(String),

    /// 로그 스트림 프로세스 실행 실패
    #[error("failed to start log stream: {0}")]
    Spawn(String),
}

/// 복구 액션 에러
#[derive(Debug, thiserror::Error)]
pub enum RemediationError {
    /// 플랫폼 명령 실패 (non-zero exit, API 에러 응답)
    #[error("command '{command}' failed: {reason}")]
    CommandFailed { command: String, reason: String },

    /// 쿨다운 또는 진행 중인 복구로 인해 억제됨
    #[error("remediation suppressed: {0}")]
    Suppressed(String),
}
