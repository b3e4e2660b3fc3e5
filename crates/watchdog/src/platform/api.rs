//! Platform API 백엔드 (reqwest)
//!
//! 로그 조회, 포메이션 스케일, dyno 재시작을 HTTP로 수행합니다.
//!
//! | 동작 | 요청 |
//! |---|---|
//! | 로그 조회 | `GET /apps/{app}/logs` |
//! | 스케일 | `PATCH /apps/{app}/formation/{type}` `{"quantity": n}` |
//! | 재시작 | `DELETE /apps/{app}/dynos` |
//!
//! 모든 요청에 `Accept: application/vnd.heroku+json; version=3`을 붙이고,
//! 토큰이 설정되어 있으면 `Authorization: Bearer <token>`을 추가합니다.
//! 로그 조회는 `fetch_timeout` 안에 끝나지 않으면 조회 실패로 처리합니다.

use std::time::Duration;

use reqwest::{Client as ReqwestClient, Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use dynowatch_core::types::ProcessFormation;

use crate::config::WatchdogConfig;
use crate::error::WatchdogError;
use crate::platform::{CommandOutput, PlatformClient};

/// 로그 조회 기본 타임아웃
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// Platform API v3 Accept 헤더 값
pub const ACCEPT_HEADER: &str = "application/vnd.heroku+json; version=3";

/// 로그 응답 레코드
///
/// `message` 외의 필드는 무시합니다.
#[derive(Debug, Clone, Deserialize)]
pub struct LogRecord {
    /// 로그 메시지
    pub message: String,
}

#[derive(Serialize)]
struct FormationUpdate {
    quantity: u32,
}

/// 앱 이름을 검증합니다.
///
/// URL 경로에 그대로 들어가므로 `[A-Za-z0-9_-]`만 허용합니다.
fn validate_app_name(app: &str) -> Result<(), WatchdogError> {
    if app.is_empty() || app.len() > 100 {
        return Err(WatchdogError::Config {
            field: "app_name".to_owned(),
            reason: format!("invalid length {} (must be 1-100)", app.len()),
        });
    }
    if !app
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(WatchdogError::Config {
            field: "app_name".to_owned(),
            reason: "contains characters outside [A-Za-z0-9_-]".to_owned(),
        });
    }
    Ok(())
}

/// Platform API 클라이언트
#[derive(Debug, Clone)]
pub struct HerokuApiClient {
    base_url: String,
    app: String,
    token: Option<String>,
    fetch_timeout: Duration,
    client: ReqwestClient,
}

impl HerokuApiClient {
    /// 새 API 클라이언트를 생성합니다.
    ///
    /// # Errors
    /// 앱 이름이 유효하지 않으면 `WatchdogError::Config`를 반환합니다.
    pub fn new(base_url: &str, app: &str, token: Option<&str>) -> Result<Self, WatchdogError> {
        validate_app_name(app)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            app: app.to_owned(),
            token: token.filter(|t| !t.is_empty()).map(str::to_owned),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            client: ReqwestClient::new(),
        })
    }

    /// 워치독 설정에서 클라이언트를 생성합니다.
    ///
    /// 로그 조회 타임아웃은 `action_timeout_secs`를 따릅니다.
    pub fn from_config(config: &WatchdogConfig) -> Result<Self, WatchdogError> {
        Ok(Self::new(
            config.api_url.as_str(),
            config.app_name.as_str(),
            Some(config.api_token.as_str()),
        )?
        .with_fetch_timeout(config.action_timeout()))
    }

    /// 로그 조회 타임아웃을 설정합니다.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// 대상 앱 이름
    pub fn app_name(&self) -> &str {
        &self.app
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .request(method, &url)
            .header(reqwest::header::ACCEPT, ACCEPT_HEADER);

        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        req
    }

    /// 최근 로그를 조회합니다.
    ///
    /// # Errors
    /// 전송 실패, 비정상 status, 응답 형식 오류, 타임아웃은 모두 `WatchdogError::Retrieval`입니다.
    pub async fn fetch_logs(&self) -> Result<Vec<LogRecord>, WatchdogError> {
        debug!(app = %self.app, "requesting recent logs");

        match tokio::time::timeout(self.fetch_timeout, self.fetch_logs_inner()).await {
            Ok(result) => result,
            Err(_) => Err(WatchdogError::Retrieval(format!(
                "log request timed out after {}ms",
                self.fetch_timeout.as_millis()
            ))),
        }
    }

    async fn fetch_logs_inner(&self) -> Result<Vec<LogRecord>, WatchdogError> {
        let path = format!("/apps/{}/logs", self.app);
        let response = self
            .request(Method::GET, &path)
            .send()
            .await
            .map_err(|e| WatchdogError::Retrieval(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WatchdogError::Retrieval(format!("HTTP {status}")));
        }

        response
            .json::<Vec<LogRecord>>()
            .await
            .map_err(|e| WatchdogError::Retrieval(format!("malformed log response: {e}")))
    }

    async fn execute(
        &self,
        command: String,
        req: RequestBuilder,
    ) -> Result<CommandOutput, WatchdogError> {
        debug!(command = %command, "calling platform api");

        let response: Response = req.send().await.map_err(|e| WatchdogError::Command {
            command: command.clone(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(WatchdogError::Command {
                command,
                reason: format!("HTTP {status}: {}", body.trim()),
            });
        }

        Ok(CommandOutput::success(
            command,
            Some(i32::from(status.as_u16())),
            body,
        ))
    }
}

impl PlatformClient for HerokuApiClient {
    fn name(&self) -> &str {
        "api"
    }

    async fn scale(&self, formation: &ProcessFormation) -> Result<CommandOutput, WatchdogError> {
        let path = format!("/apps/{}/formation/{}", self.app, formation.process_type);
        let command = format!("PATCH {path} quantity={}", formation.quantity);
        let req = self
            .request(Method::PATCH, &path)
            .json(&FormationUpdate {
                quantity: formation.quantity,
            });
        self.execute(command, req).await
    }

    async fn restart(&self) -> Result<CommandOutput, WatchdogError> {
        let path = format!("/apps/{}/dynos", self.app);
        let command = format!("DELETE {path}");
        let req = self.request(Method::DELETE, &path);
        self.execute(command, req).await
    }
}
