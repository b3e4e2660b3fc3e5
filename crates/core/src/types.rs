//! 도메인 타입 -- 로그 라인과 프로세스 스케일 목표
//!
//! 로그 소스, 매처, 복구 실행기가 공유하는 데이터 구조를 정의합니다.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// 로그 라인
///
/// 로그 소스가 생성하는 한 줄의 텍스트입니다. 도착 순서 외의 순서 보장이 없고,
/// 한 번 검사된 뒤 버려집니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    /// 로그 텍스트
    pub text: String,
    /// 수집 소스 식별자 (예: "api:my-app", "cli:heroku logs --tail")
    pub source: String,
    /// 수신 시각
    pub received_at: SystemTime,
}

impl LogLine {
    /// 새 로그 라인을 생성합니다.
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            received_at: SystemTime::now(),
        }
    }

    /// 최대 길이(바이트)를 넘는 텍스트를 문자 경계에서 잘라냅니다.
    pub fn truncate(&mut self, max_len: usize) {
        if self.text.len() <= max_len {
            return;
        }
        let mut cut = max_len;
        while cut > 0 && !self.text.is_char_boundary(cut) {
            cut -= 1;
        }
        self.text.truncate(cut);
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// 프로세스 스케일 목표
///
/// 플랫폼 스케일 명령의 `<process-type>=<count>` 인자를 나타냅니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessFormation {
    /// 프로세스 타입 (예: "web")
    pub process_type: String,
    /// 실행 인스턴스 수
    pub quantity: u32,
}

impl ProcessFormation {
    /// 새 스케일 목표를 생성합니다.
    pub fn new(process_type: impl Into<String>, quantity: u32) -> Self {
        Self {
            process_type: process_type.into(),
            quantity,
        }
    }
}

impl fmt::Display for ProcessFormation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.process_type, self.quantity)
    }
}

impl FromStr for ProcessFormation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "formation".to_owned(),
            reason: format!("'{s}': {reason}"),
        };

        let (process_type, quantity) = s
            .split_once('=')
            .ok_or_else(|| invalid("expected <process-type>=<count>"))?;
        let process_type = process_type.trim();
        if process_type.is_empty() {
            return Err(invalid("process type must not be empty"));
        }
        if !process_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("process type contains invalid characters"));
        }
        let quantity = quantity
            .trim()
            .parse::<u32>()
            .map_err(|_| invalid("count must be a non-negative integer"))?;

        Ok(Self::new(process_type, quantity))
    }
}
