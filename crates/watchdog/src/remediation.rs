//! 복구 실행 -- 스케일 사이클 / 재시작 액션 정의 및 실행
//!
//! [`RemediationAction`]은 에러 감지 시 수행할 복구 액션을 정의합니다.
//! [`RemediationExecutor`]는 [`PlatformClient`]를 통해 액션을 실행하고
//! 상태(`RemediationState`)와 마지막으로 적용된 인스턴스 수를 직접 보관합니다.
//!
//! # 스케일 사이클
//! ```text
//! Idle ──▶ ScalingDown ──▶ Waiting ──▶ ScalingUp ──▶ Idle
//!            web=0         60s          web=1
//! ```
//!
//! 각 단계는 타임아웃과 선형 백오프 재시도를 적용합니다.
//! 스케일 다운이 최종 실패하면 대기와 스케일 업을 생략하고 에러를 반환합니다.
//!
//! # 쿨다운
//! 직전 복구가 끝난 시점(성공/실패 무관)부터 `cooldown_secs` 동안의 트리거는
//! 실행하지 않고 [`RemediationOutcome::Suppressed`]로 반환합니다.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use dynowatch_core::metrics as m;
use dynowatch_core::types::ProcessFormation;

use crate::config::WatchdogConfig;
use crate::error::WatchdogError;
use crate::platform::{CommandOutput, PlatformClient};

/// 복구 전략
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationStrategy {
    /// 스케일 다운 → 대기 → 스케일 업
    #[default]
    ScaleCycle,
    /// 앱 전체 dyno 재시작
    Restart,
}

impl fmt::Display for RemediationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScaleCycle => write!(f, "scale_cycle"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

impl FromStr for RemediationStrategy {
    type Err = WatchdogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scale_cycle" => Ok(Self::ScaleCycle),
            "restart" => Ok(Self::Restart),
            _ => Err(WatchdogError::Config {
                field: "remediation.strategy".to_owned(),
                reason: format!("unknown strategy '{s}' (expected: scale_cycle, restart)"),
            }),
        }
    }
}

/// 복구 액션
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RemediationAction {
    /// 스케일 사이클
    ScaleCycle {
        /// 스케일 다운 목표
        down: ProcessFormation,
        /// 스케일 업 목표
        up: ProcessFormation,
        /// 대기 시간 (초)
        wait_secs: u64,
    },
    /// 전체 재시작
    Restart,
}

impl RemediationAction {
    /// 설정에서 액션을 생성합니다.
    pub fn from_config(config: &WatchdogConfig) -> Self {
        match config.strategy {
            RemediationStrategy::ScaleCycle => Self::ScaleCycle {
                down: config.scale_down_formation(),
                up: config.scale_up_formation(),
                wait_secs: config.wait_secs,
            },
            RemediationStrategy::Restart => Self::Restart,
        }
    }

    /// 메트릭 레이블용 고정된 액션 타입명을 반환합니다.
    pub fn action_type_name(&self) -> &'static str {
        match self {
            Self::ScaleCycle { .. } => "scale_cycle",
            Self::Restart => "restart",
        }
    }
}

impl fmt::Display for RemediationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScaleCycle {
                down,
                up,
                wait_secs,
            } => write!(f, "scale_cycle({down} -> {wait_secs}s -> {up})"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

/// 복구 실행 상태
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationState {
    /// 대기 중 (트리거 수용 가능)
    #[default]
    Idle,
    /// 스케일 다운 명령 실행 중
    ScalingDown,
    /// 스케일 다운 후 대기 중
    Waiting,
    /// 스케일 업 명령 실행 중
    ScalingUp,
    /// 재시작 명령 실행 중
    Restarting,
}

impl fmt::Display for RemediationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::ScalingDown => "scaling_down",
            Self::Waiting => "waiting",
            Self::ScalingUp => "scaling_up",
            Self::Restarting => "restarting",
        };
        f.write_str(s)
    }
}

/// 상태 전이 이벤트
///
/// 운영자 출력용으로 실행기에서 채널로 전송됩니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationEvent {
    /// 인시던트 ID
    pub incident_id: String,
    /// 진입한 상태
    pub state: RemediationState,
    /// 스케일 목표 (스케일 단계에서만 존재)
    pub target: Option<ProcessFormation>,
    /// 대기 시간 (Waiting 단계에서만 존재)
    pub wait_secs: Option<u64>,
}

/// 완료된 복구 리포트
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationReport {
    /// 인시던트 ID (UUID v4)
    pub incident_id: String,
    /// 수행한 액션
    pub action: RemediationAction,
    /// 단계별 명령 결과 (실행 순서)
    pub outputs: Vec<CommandOutput>,
    /// 시작 시각
    pub started_at: SystemTime,
    /// 종료 시각
    pub finished_at: SystemTime,
}

/// 트리거 처리 결과
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RemediationOutcome {
    /// 복구 완료
    Completed(RemediationReport),
    /// 쿨다운 또는 진행 중인 복구로 억제됨
    Suppressed {
        /// 억제 사유
        reason: String,
        /// 남은 쿨다운 (초)
        cooldown_remaining_secs: u64,
    },
}

/// 실행 단계 (재시도 단위)
enum Step<'a> {
    Scale(&'a ProcessFormation),
    Restart,
}

impl fmt::Display for Step<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scale(formation) => write!(f, "scale {formation}"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

/// 복구 실행기 -- 플랫폼 클라이언트를 통해 복구 액션을 수행합니다.
pub struct RemediationExecutor<P: PlatformClient> {
    /// 플랫폼 클라이언트
    platform: Arc<P>,
    /// 트리거 시 수행할 액션
    action: RemediationAction,
    /// 재트리거 금지 시간
    cooldown: Duration,
    /// 명령 1회 타임아웃
    action_timeout: Duration,
    /// 재시도 최대 횟수
    max_retries: u32,
    /// 재시도 백오프 기본 간격
    retry_backoff_base: Duration,
    /// 현재 상태
    state: RemediationState,
    /// 마지막으로 성공 적용된 인스턴스 수
    last_known_quantity: Option<u32>,
    /// 직전 복구 종료 시각
    last_finished: Option<Instant>,
    /// 상태 전이 이벤트 채널
    events: Option<mpsc::Sender<RemediationEvent>>,
}

impl<P: PlatformClient> RemediationExecutor<P> {
    /// 설정에서 실행기를 생성합니다.
    pub fn new(platform: Arc<P>, config: &WatchdogConfig) -> Self {
        Self {
            platform,
            action: RemediationAction::from_config(config),
            cooldown: config.cooldown(),
            action_timeout: config.action_timeout(),
            max_retries: config.retry_max_attempts,
            retry_backoff_base: config.retry_backoff_base(),
            state: RemediationState::Idle,
            last_known_quantity: None,
            last_finished: None,
            events: None,
        }
    }

    /// 상태 전이 이벤트를 받을 채널을 설정합니다.
    pub fn with_events(mut self, tx: mpsc::Sender<RemediationEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn state(&self) -> RemediationState {
        self.state
    }

    pub fn action(&self) -> &RemediationAction {
        &self.action
    }

    /// 마지막으로 성공 적용된 인스턴스 수 (아직 없으면 None)
    pub fn last_known_quantity(&self) -> Option<u32> {
        self.last_known_quantity
    }

    /// 남은 쿨다운. 쿨다운 중이 아니면 None
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let finished = self.last_finished?;
        let remaining = self.cooldown.checked_sub(finished.elapsed())?;
        (!remaining.is_zero()).then_some(remaining)
    }

    /// 에러 감지 트리거를 처리합니다.
    ///
    /// 쿨다운 중이면 실행하지 않습니다.
    /// `&mut self`를 빌리므로 진행 중인 복구와 겹쳐 호출될 수 없습니다.
    ///
    /// # Errors
    /// 명령이 재시도 후에도 실패하면 `WatchdogError::Command`를 반환합니다.
    pub async fn trigger(&mut self) -> Result<RemediationOutcome, WatchdogError> {
        if let Some(remaining) = self.cooldown_remaining() {
            return Ok(self.suppress("cooldown active".to_owned(), remaining));
        }

        let incident_id = Uuid::new_v4().to_string();
        let action = self.action.clone();
        let started_at = SystemTime::now();
        info!(
            incident_id = %incident_id,
            action = %action,
            platform = self.platform.name(),
            "starting remediation"
        );

        let mut outputs = Vec::new();
        let result = match &action {
            RemediationAction::ScaleCycle {
                down,
                up,
                wait_secs,
            } => {
                self.run_scale_cycle(&incident_id, down, up, *wait_secs, &mut outputs)
                    .await
            }
            RemediationAction::Restart => self.run_restart(&incident_id, &mut outputs).await,
        };

        self.state = RemediationState::Idle;
        self.last_finished = Some(Instant::now());

        let result_label = if result.is_ok() {
            m::RESULT_SUCCESS
        } else {
            m::RESULT_FAILURE
        };
        metrics::counter!(
            m::REMEDIATIONS_TOTAL,
            m::LABEL_RESULT => result_label,
            m::LABEL_STRATEGY => action.action_type_name()
        )
        .increment(1);

        match result {
            Ok(()) => {
                info!(
                    incident_id = %incident_id,
                    action = %action,
                    last_known_quantity = ?self.last_known_quantity,
                    "remediation completed"
                );
                Ok(RemediationOutcome::Completed(RemediationReport {
                    incident_id,
                    action,
                    outputs,
                    started_at,
                    finished_at: SystemTime::now(),
                }))
            }
            Err(e) => {
                error!(
                    incident_id = %incident_id,
                    action = %action,
                    last_known_quantity = ?self.last_known_quantity,
                    error = %e,
                    "remediation failed"
                );
                Err(e)
            }
        }
    }

    /// 스케일 명령 1회를 실행합니다 (쿨다운 무관, 재시도 적용).
    pub async fn scale(
        &mut self,
        formation: &ProcessFormation,
    ) -> Result<CommandOutput, WatchdogError> {
        let output = self.execute_with_retry(Step::Scale(formation)).await?;
        self.last_known_quantity = Some(formation.quantity);
        Ok(output)
    }

    /// 재시작 명령 1회를 실행합니다 (쿨다운 무관, 재시도 적용).
    pub async fn restart(&self) -> Result<CommandOutput, WatchdogError> {
        self.execute_with_retry(Step::Restart).await
    }

    async fn run_scale_cycle(
        &mut self,
        incident_id: &str,
        down: &ProcessFormation,
        up: &ProcessFormation,
        wait_secs: u64,
        outputs: &mut Vec<CommandOutput>,
    ) -> Result<(), WatchdogError> {
        self.enter(incident_id, RemediationState::ScalingDown, Some(down), None)
            .await;
        info!(
            incident_id,
            process_type = %down.process_type,
            quantity = down.quantity,
            "scaling down"
        );
        outputs.push(self.execute_with_retry(Step::Scale(down)).await?);
        self.last_known_quantity = Some(down.quantity);

        self.enter(incident_id, RemediationState::Waiting, None, Some(wait_secs))
            .await;
        info!(incident_id, wait_secs, "waiting before scale up");
        tokio::time::sleep(Duration::from_secs(wait_secs)).await;

        self.enter(incident_id, RemediationState::ScalingUp, Some(up), None)
            .await;
        info!(
            incident_id,
            process_type = %up.process_type,
            quantity = up.quantity,
            "scaling up"
        );
        outputs.push(self.execute_with_retry(Step::Scale(up)).await?);
        self.last_known_quantity = Some(up.quantity);

        Ok(())
    }

    async fn run_restart(
        &mut self,
        incident_id: &str,
        outputs: &mut Vec<CommandOutput>,
    ) -> Result<(), WatchdogError> {
        self.enter(incident_id, RemediationState::Restarting, None, None)
            .await;
        info!(incident_id, "restarting all dynos");
        outputs.push(self.execute_with_retry(Step::Restart).await?);
        Ok(())
    }

    async fn enter(
        &mut self,
        incident_id: &str,
        state: RemediationState,
        target: Option<&ProcessFormation>,
        wait_secs: Option<u64>,
    ) {
        self.state = state;
        if let Some(tx) = &self.events {
            let event = RemediationEvent {
                incident_id: incident_id.to_owned(),
                state,
                target: target.cloned(),
                wait_secs,
            };
            if let Err(e) = tx.send(event).await {
                error!(error = %e, "failed to send remediation event");
            }
        }
    }

    fn suppress(&self, reason: String, remaining: Duration) -> RemediationOutcome {
        metrics::counter!(m::REMEDIATIONS_SUPPRESSED_TOTAL).increment(1);
        warn!(
            reason = %reason,
            cooldown_remaining_secs = remaining.as_secs(),
            "remediation suppressed"
        );
        RemediationOutcome::Suppressed {
            reason,
            cooldown_remaining_secs: remaining.as_secs(),
        }
    }

    /// 재시도 로직을 포함한 단계 실행
    async fn execute_with_retry(&self, step: Step<'_>) -> Result<CommandOutput, WatchdogError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_base * attempt;
                metrics::counter!(m::COMMAND_RETRIES_TOTAL).increment(1);
                warn!(
                    step = %step,
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying platform command"
                );
                tokio::time::sleep(backoff).await;
            }

            match tokio::time::timeout(self.action_timeout, self.execute_step(&step)).await {
                Ok(Ok(output)) => return Ok(output),
                Ok(Err(e)) => {
                    warn!(step = %step, attempt, error = %e, "platform command failed");
                    last_error = Some(e);
                }
                Err(_elapsed) => {
                    warn!(step = %step, attempt, "platform command timed out");
                    last_error = Some(WatchdogError::Command {
                        command: step.to_string(),
                        reason: format!(
                            "timed out after {}s",
                            self.action_timeout.as_secs()
                        ),
                    });
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WatchdogError::Command {
            command: step.to_string(),
            reason: "unknown error".to_owned(),
        }))
    }

    /// 단일 단계를 실행합니다 (재시도 없음).
    async fn execute_step(&self, step: &Step<'_>) -> Result<CommandOutput, WatchdogError> {
        match step {
            Step::Scale(formation) => self.platform.scale(formation).await,
            Step::Restart => self.platform.restart().await,
        }
    }
}
