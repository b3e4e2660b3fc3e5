//! 워치독 오케스트레이터
//!
//! [`Watchdog`]은 로그 소스 → 시그니처 매처 → 복구 실행기 파이프라인을 구동합니다.
//!
//! - [`Watchdog::check_once`]: 폴링 모드. 소스를 한 번 끝까지 읽고, 매칭이 하나라도 있으면
//!   최대 1회 복구합니다.
//! - [`Watchdog::watch`]: tail 모드. 스트림이 끝나거나 취소될 때까지 라인마다 평가하며,
//!   복구는 라인 루프 안에서 인라인으로 완료될 때까지 기다립니다.
//!
//! 취소 토큰은 라인 사이에서만 확인합니다. 진행 중인 복구 시퀀스는 중단하지 않습니다.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use dynowatch_core::metrics as m;

use crate::config::WatchdogConfig;
use crate::error::WatchdogError;
use crate::matcher::SignatureMatcher;
use crate::platform::PlatformClient;
use crate::remediation::{RemediationExecutor, RemediationOutcome, RemediationReport};
use crate::source::LogSource;

/// 감시 결과
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WatchOutcome {
    /// 시그니처가 발견되지 않음
    NoErrorDetected,
    /// 복구 수행됨
    Remediated,
    /// 시그니처가 발견되었으나 쿨다운으로 억제됨
    Suppressed,
    /// 로그 조회 실패 (복구 없음)
    RetrievalFailed {
        /// 실패 사유
        reason: String,
    },
    /// tail 스트림 종료
    StreamEnded,
    /// 취소 요청으로 종료
    Cancelled,
}

/// 감시 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchReport {
    /// 종료 결과
    pub outcome: WatchOutcome,
    /// 로그 소스 식별자
    pub source: String,
    /// 읽은 라인 수
    pub lines_read: u64,
    /// 시그니처 매칭 수
    pub matches: u64,
    /// 완료된 복구 수
    pub remediations: u64,
    /// 억제된 트리거 수
    pub suppressed: u64,
    /// 실패한 복구 수
    pub failures: u64,
    /// 완료된 복구 리포트
    pub reports: Vec<RemediationReport>,
}

impl WatchReport {
    fn new(source: &str) -> Self {
        Self {
            outcome: WatchOutcome::NoErrorDetected,
            source: source.to_owned(),
            lines_read: 0,
            matches: 0,
            remediations: 0,
            suppressed: 0,
            failures: 0,
            reports: Vec::new(),
        }
    }

    fn record(&mut self, outcome: RemediationOutcome) {
        match outcome {
            RemediationOutcome::Completed(report) => {
                self.remediations += 1;
                self.reports.push(report);
            }
            RemediationOutcome::Suppressed { .. } => self.suppressed += 1,
        }
    }
}

/// 연결 제한 워치독
pub struct Watchdog<P: PlatformClient> {
    matcher: SignatureMatcher,
    executor: RemediationExecutor<P>,
    cancel: CancellationToken,
}

impl<P: PlatformClient> Watchdog<P> {
    /// 매처와 실행기로 워치독을 생성합니다.
    pub fn new(matcher: SignatureMatcher, executor: RemediationExecutor<P>) -> Self {
        Self {
            matcher,
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// 설정에서 워치독을 생성합니다.
    ///
    /// # Errors
    /// 설정 검증 또는 매처 생성이 실패하면 에러를 반환합니다.
    pub fn from_config(platform: Arc<P>, config: &WatchdogConfig) -> Result<Self, WatchdogError> {
        config.validate()?;
        let matcher = SignatureMatcher::new(config.match_mode, config.pattern.as_str())?;
        let executor = RemediationExecutor::new(platform, config);
        Ok(Self::new(matcher, executor))
    }

    /// 외부 취소 토큰을 사용합니다.
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 취소 토큰
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn executor(&self) -> &RemediationExecutor<P> {
        &self.executor
    }

    pub fn matcher(&self) -> &SignatureMatcher {
        &self.matcher
    }

    /// 폴링 모드: 소스를 한 번 읽고 종료합니다.
    ///
    /// 배치 안에 매칭 라인이 몇 개든 복구는 최대 1회입니다.
    /// 조회 실패는 `WatchOutcome::RetrievalFailed`로 보고하며 복구하지 않습니다.
    ///
    /// # Errors
    /// 복구 명령이 최종 실패하면 `WatchdogError::Command`를 반환합니다.
    pub async fn check_once<S: LogSource>(
        &mut self,
        source: &mut S,
    ) -> Result<WatchReport, WatchdogError> {
        let mut report = WatchReport::new(source.describe());

        loop {
            match source.next_line().await {
                Ok(Some(line)) => {
                    report.lines_read += 1;
                    metrics::counter!(m::LINES_READ_TOTAL).increment(1);
                    if self.matcher.matches(&line) {
                        report.matches += 1;
                        metrics::counter!(m::SIGNATURE_MATCHES_TOTAL).increment(1);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    metrics::counter!(m::RETRIEVAL_FAILURES_TOTAL).increment(1);
                    error!(source = %report.source, error = %e, "failed to retrieve logs");
                    report.outcome = WatchOutcome::RetrievalFailed {
                        reason: e.to_string(),
                    };
                    return Ok(report);
                }
            }
        }

        if report.matches == 0 {
            info!(
                source = %report.source,
                lines_read = report.lines_read,
                "no max_user_connections error detected"
            );
            return Ok(report);
        }

        info!(
            source = %report.source,
            matches = report.matches,
            "max_user_connections error detected"
        );
        let outcome = self.executor.trigger().await?;
        report.outcome = match outcome {
            RemediationOutcome::Completed(_) => WatchOutcome::Remediated,
            RemediationOutcome::Suppressed { .. } => WatchOutcome::Suppressed,
        };
        report.record(outcome);
        Ok(report)
    }

    /// tail 모드: 스트림이 끝나거나 취소될 때까지 감시합니다.
    ///
    /// 복구 실패는 기록하고 감시를 계속합니다.
    pub async fn watch<S: LogSource>(&mut self, source: &mut S) -> WatchReport {
        let mut report = WatchReport::new(source.describe());
        info!(source = %report.source, "watching log stream");

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!(source = %report.source, "watch cancelled");
                    report.outcome = WatchOutcome::Cancelled;
                    return report;
                }
                next = source.next_line() => next,
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => {
                    warn!(
                        source = %report.source,
                        lines_read = report.lines_read,
                        remediations = report.remediations,
                        "log stream ended"
                    );
                    report.outcome = WatchOutcome::StreamEnded;
                    return report;
                }
                Err(e) => {
                    metrics::counter!(m::RETRIEVAL_FAILURES_TOTAL).increment(1);
                    error!(source = %report.source, error = %e, "log stream failed");
                    report.outcome = WatchOutcome::RetrievalFailed {
                        reason: e.to_string(),
                    };
                    return report;
                }
            };

            report.lines_read += 1;
            metrics::counter!(m::LINES_READ_TOTAL).increment(1);
            if !self.matcher.matches(&line) {
                continue;
            }

            report.matches += 1;
            metrics::counter!(m::SIGNATURE_MATCHES_TOTAL).increment(1);
            debug!(line = %line, "signature matched");

            match self.executor.trigger().await {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    report.failures += 1;
                    error!(error = %e, "remediation failed, continuing to watch");
                }
            }
        }
    }
}
