//! 에러 시그니처 매칭
//!
//! [`SignatureMatcher`]는 로그 라인 하나를 독립적으로 평가합니다.
//! 라인 간 상관관계나 디바운싱은 하지 않으며, 반복 트리거 억제는 복구 실행기의 쿨다운이 담당합니다.
//! 정규식 패턴은 생성 시 한 번만 컴파일합니다.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use dynowatch_core::config::MatcherConfig;
use dynowatch_core::types::LogLine;

use crate::error::WatchdogError;

/// 매칭 방식
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// 라인 전체가 시그니처와 정확히 일치
    Exact,
    /// 라인에 시그니처가 포함됨 (기본값)
    #[default]
    Contains,
    /// 정규식 검색
    Regex,
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Contains => write!(f, "contains"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

impl FromStr for MatchMode {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "contains" => Ok(Self::Contains),
            "regex" => Ok(Self::Regex),
            _ => Err(WatchdogError::Config {
                field: "matcher.mode".to_owned(),
                reason: format!("unknown match mode '{s}' (expected: exact, contains, regex)"),
            }),
        }
    }
}

/// 에러 시그니처 매처
pub struct SignatureMatcher {
    mode: MatchMode,
    pattern: String,
    /// `MatchMode::Regex`일 때만 존재
    regex: Option<Regex>,
}

impl SignatureMatcher {
    /// 새 매처를 생성합니다.
    ///
    /// 빈 패턴과 컴파일되지 않는 정규식은 거부합니다.
    pub fn new(mode: MatchMode, pattern: impl Into<String>) -> Result<Self, WatchdogError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(WatchdogError::Config {
                field: "matcher.pattern".to_owned(),
                reason: "pattern must not be empty".to_owned(),
            });
        }

        let regex = match mode {
            MatchMode::Regex => Some(Regex::new(&pattern)?),
            MatchMode::Exact | MatchMode::Contains => None,
        };

        Ok(Self {
            mode,
            pattern,
            regex,
        })
    }

    /// core 설정에서 매처를 생성합니다.
    pub fn from_config(config: &MatcherConfig) -> Result<Self, WatchdogError> {
        Self::new(config.mode.parse()?, config.pattern.clone())
    }

    /// 매칭 방식을 반환합니다.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// 시그니처 패턴을 반환합니다.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// 텍스트가 시그니처와 매칭되는지 평가합니다.
    pub fn is_match(&self, text: &str) -> bool {
        match self.mode {
            MatchMode::Exact => text == self.pattern,
            MatchMode::Contains => text.contains(&self.pattern),
            MatchMode::Regex => self.regex.as_ref().is_some_and(|re| re.is_match(text)),
        }
    }

    /// 로그 라인이 시그니처와 매칭되는지 평가합니다.
    pub fn matches(&self, line: &LogLine) -> bool {
        self.is_match(&line.text)
    }

    /// 배치 중 하나라도 매칭되면 true를 반환합니다.
    pub fn matches_any<'a>(&self, lines: impl IntoIterator<Item = &'a LogLine>) -> bool {
        lines.into_iter().any(|line| self.matches(line))
    }
}

impl fmt::Debug for SignatureMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureMatcher")
            .field("mode", &self.mode)
            .field("pattern", &self.pattern)
            .finish()
    }
}
