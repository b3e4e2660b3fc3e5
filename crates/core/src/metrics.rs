//! 메트릭 상수 정의
//!
//! 모든 메트릭의 이름을 중앙에서 정의합니다.
//! watchdog 크레이트는 이 상수를 사용하여 `metrics::counter!()` 매크로를 호출합니다.
//! 바이너리는 exporter를 설치하지 않으므로, 임베딩 프로그램이 recorder를 설치하지 않으면 no-op입니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `dynowatch_`
//! - 접미어: `_total` (counter)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(dynowatch_core::metrics::LINES_READ_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

/// 복구 전략 레이블 키 (scale_cycle, restart)
pub const LABEL_STRATEGY: &str = "strategy";

// ─── 레이블 값 상수 ────────────────────────────────────────────────

/// 성공 레이블 값
pub const RESULT_SUCCESS: &str = "success";

/// 실패 레이블 값
pub const RESULT_FAILURE: &str = "failure";

// ─── Watchdog 메트릭 ────────────────────────────────────────────────

/// 읽은 로그 라인 수 (counter)
pub const LINES_READ_TOTAL: &str = "dynowatch_lines_read_total";

/// 에러 시그니처 매칭 수 (counter)
pub const SIGNATURE_MATCHES_TOTAL: &str = "dynowatch_signature_matches_total";

/// 실행된 복구 수 (counter, label: result, strategy)
pub const REMEDIATIONS_TOTAL: &str = "dynowatch_remediations_total";

/// 쿨다운으로 억제된 트리거 수 (counter)
pub const REMEDIATIONS_SUPPRESSED_TOTAL: &str = "dynowatch_remediations_suppressed_total";

/// 로그 조회 실패 수 (counter)
pub const RETRIEVAL_FAILURES_TOTAL: &str = "dynowatch_retrieval_failures_total";

/// 플랫폼 명령 재시도 수 (counter)
pub const COMMAND_RETRIES_TOTAL: &str = "dynowatch_command_retries_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_names_use_prefix_and_suffix() {
        let names = [
            LINES_READ_TOTAL,
            SIGNATURE_MATCHES_TOTAL,
            REMEDIATIONS_TOTAL,
            REMEDIATIONS_SUPPRESSED_TOTAL,
            RETRIEVAL_FAILURES_TOTAL,
            COMMAND_RETRIES_TOTAL,
        ];
        for name in names {
            assert!(name.starts_with("dynowatch_"), "{name}");
            assert!(name.ends_with("_total"), "{name}");
        }
    }
}
