//! Platform API 폴링 로그 소스
//!
//! 첫 `next_line()` 호출 시 최근 로그를 한 번만 조회하고, 받은 메시지를 순서대로 반환합니다.
//! 조회 실패는 재시도하지 않으며 시퀀스를 종료합니다.

use std::collections::VecDeque;

use tracing::{debug, warn};

use dynowatch_core::types::LogLine;

use crate::error::WatchdogError;
use crate::platform::api::HerokuApiClient;
use crate::source::LogSource;

/// API 폴링 로그 소스
pub struct ApiLogSource {
    client: HerokuApiClient,
    name: String,
    max_line_length: usize,
    pending: VecDeque<String>,
    fetched: bool,
}

impl ApiLogSource {
    /// 새 API 로그 소스를 생성합니다. 요청은 첫 라인을 읽을 때 발생합니다.
    pub fn new(client: HerokuApiClient, max_line_length: usize) -> Self {
        let name = format!("api:{}", client.app_name());
        Self {
            client,
            name,
            max_line_length,
            pending: VecDeque::new(),
            fetched: false,
        }
    }

    async fn fetch(&mut self) -> Result<(), WatchdogError> {
        self.fetched = true;
        let records = self.client.fetch_logs().await.inspect_err(|e| {
            warn!(source = %self.name, error = %e, "log retrieval failed");
        })?;
        debug!(source = %self.name, count = records.len(), "fetched log records");
        self.pending = records.into_iter().map(|r| r.message).collect();
        Ok(())
    }
}

impl LogSource for ApiLogSource {
    fn describe(&self) -> &str {
        &self.name
    }

    async fn next_line(&mut self) -> Result<Option<LogLine>, WatchdogError> {
        if !self.fetched {
            self.fetch().await?;
        }

        Ok(self.pending.pop_front().map(|text| {
            let mut line = LogLine::new(text, self.name.as_str());
            line.truncate(self.max_line_length);
            line
        }))
    }
}
