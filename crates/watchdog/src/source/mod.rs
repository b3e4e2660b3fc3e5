//! 로그 소스 -- 로그 라인 시퀀스 추상화
//!
//! [`LogSource`] 트레이트는 로그 라인을 한 줄씩 지연 생성하는 소스를 추상화합니다.
//!
//! # 구현체
//! - [`ApiLogSource`]: Platform API에서 최근 로그를 1회 조회 (폴링 모드)
//! - [`CliTailSource`]: 플랫폼 CLI의 `logs --tail` 출력을 스트리밍 (tail 모드)
//! - [`ReaderSource`]: 임의의 `AsyncBufRead` (stdin, 테스트 입력)
//!
//! [`ConfiguredSource`]는 `source.mode` 설정에 따라 API 또는 CLI 소스를 선택합니다.
//!
//! ```text
//! ApiLogSource ──┐
//! CliTailSource ─┼──▶ LogSource::next_line() ──▶ SignatureMatcher
//! ReaderSource ──┘
//! ```

pub mod api;
pub mod cli;

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use dynowatch_core::types::LogLine;

use crate::config::{SourceMode, WatchdogConfig};
use crate::error::WatchdogError;
use crate::platform::api::HerokuApiClient;

pub use api::ApiLogSource;
pub use cli::CliTailSource;

/// 로그 라인 소스 트레이트
///
/// - `Ok(Some(line))`: 다음 라인
/// - `Ok(None)`: 시퀀스 종료 (폴링 1회 완료, 또는 스트림 종료)
/// - `Err(_)`: 조회 실패. 이후 호출은 `Ok(None)`을 반환합니다.
///
/// 한 번 반환된 라인은 다시 반환되지 않습니다.
pub trait LogSource: Send {
    /// 로그 및 리포트에 사용할 소스 식별자
    fn describe(&self) -> &str;

    /// 다음 로그 라인을 읽습니다.
    ///
    /// tail 소스는 라인이 도착할 때까지 대기합니다.
    fn next_line(
        &mut self,
    ) -> impl Future<Output = Result<Option<LogLine>, WatchdogError>> + Send;
}

/// `AsyncBufRead` 기반 로그 소스
///
/// 개행 단위로 라인을 분리하고, 끝의 `\r\n`을 제거합니다.
/// UTF-8이 아닌 바이트는 대체 문자로 변환합니다.
pub struct ReaderSource<R> {
    reader: R,
    name: String,
    max_line_length: usize,
    buf: Vec<u8>,
    done: bool,
}

impl<R> ReaderSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// 새 리더 소스를 생성합니다.
    pub fn new(reader: R, name: impl Into<String>, max_line_length: usize) -> Self {
        Self {
            reader,
            name: name.into(),
            max_line_length,
            buf: Vec::with_capacity(1024),
            done: false,
        }
    }
}

impl<R> LogSource for ReaderSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    fn describe(&self) -> &str {
        &self.name
    }

    async fn next_line(&mut self) -> Result<Option<LogLine>, WatchdogError> {
        if self.done {
            return Ok(None);
        }

        self.buf.clear();
        let read = match self.reader.read_until(b'\n', &mut self.buf).await {
            Ok(n) => n,
            Err(e) => {
                self.done = true;
                return Err(WatchdogError::Io(e));
            }
        };
        if read == 0 {
            self.done = true;
            return Ok(None);
        }

        while matches!(self.buf.last(), Some(b'\n' | b'\r')) {
            self.buf.pop();
        }

        let text = String::from_utf8_lossy(&self.buf).into_owned();
        let mut line = LogLine::new(text, self.name.as_str());
        line.truncate(self.max_line_length);
        Ok(Some(line))
    }
}

/// `source.mode` 설정으로 선택된 플랫폼 로그 소스
///
/// [`LogSource`]는 `async fn` 트레이트라 `dyn`으로 쓸 수 없으므로 열거형으로 분기합니다.
pub enum ConfiguredSource {
    /// `source.mode = "api"`
    Api(ApiLogSource),
    /// `source.mode = "cli"`
    Cli(CliTailSource),
}

impl ConfiguredSource {
    /// 폴링 모드 소스: 최근 로그를 한 번 읽고 끝납니다.
    ///
    /// - `api`: `GET /apps/{app}/logs` (첫 라인을 읽을 때 요청)
    /// - `cli`: `<cli_bin> logs [--app <app>]`
    ///
    /// # Errors
    /// 앱 이름이 유효하지 않으면 `WatchdogError::Config`,
    /// 프로세스를 시작하지 못하면 `WatchdogError::Spawn`을 반환합니다.
    pub fn polling(config: &WatchdogConfig) -> Result<Self, WatchdogError> {
        Self::from_config(config, false)
    }

    /// tail 모드 소스: 스트림이 끝날 때까지 라인을 반환합니다.
    ///
    /// - `api`: 최근 로그 1회 조회 후 종료 (API에는 스트리밍이 없음)
    /// - `cli`: `<cli_bin> logs --tail [--app <app>]`
    ///
    /// # Errors
    /// [`ConfiguredSource::polling`]과 같습니다.
    pub fn streaming(config: &WatchdogConfig) -> Result<Self, WatchdogError> {
        Self::from_config(config, true)
    }

    fn from_config(config: &WatchdogConfig, follow: bool) -> Result<Self, WatchdogError> {
        match config.source_mode {
            SourceMode::Api => {
                let client = HerokuApiClient::from_config(config)?;
                Ok(Self::Api(ApiLogSource::new(client, config.max_line_length)))
            }
            SourceMode::Cli if follow => Ok(Self::Cli(CliTailSource::spawn(
                &config.cli_bin,
                config.app(),
                config.max_line_length,
            )?)),
            SourceMode::Cli => Ok(Self::Cli(CliTailSource::spawn_recent(
                &config.cli_bin,
                config.app(),
                config.max_line_length,
            )?)),
        }
    }

    /// 선택된 소스 모드
    pub fn mode(&self) -> SourceMode {
        match self {
            Self::Api(_) => SourceMode::Api,
            Self::Cli(_) => SourceMode::Cli,
        }
    }
}

impl LogSource for ConfiguredSource {
    fn describe(&self) -> &str {
        match self {
            Self::Api(source) => source.describe(),
            Self::Cli(source) => source.describe(),
        }
    }

    async fn next_line(&mut self) -> Result<Option<LogLine>, WatchdogError> {
        match self {
            Self::Api(source) => source.next_line().await,
            Self::Cli(source) => source.next_line().await,
        }
    }
}

/// 소스의 남은 라인을 모두 읽습니다.
///
/// 폴링 모드의 1회 배치 수집에 사용합니다.
pub async fn collect_lines<S: LogSource>(source: &mut S) -> Result<Vec<LogLine>, WatchdogError> {
    let mut lines = Vec::new();
    while let Some(line) = source.next_line().await? {
        lines.push(line);
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reader_source_splits_lines() {
        let input: &[u8] = b"Build succeeded\r\nDeploy complete\nlast line without newline";
        let mut source = ReaderSource::new(input, "test", 1024);

        let lines = collect_lines(&mut source).await.unwrap();
        let texts: Vec<_> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(
            texts,
            ["Build succeeded", "Deploy complete", "last line without newline"]
        );
        assert!(lines.iter().all(|l| l.source == "test"));
    }

    #[tokio::test]
    async fn reader_source_returns_none_after_end() {
        let input: &[u8] = b"only\n";
        let mut source = ReaderSource::new(input, "test", 1024);
        assert!(source.next_line().await.unwrap().is_some());
        assert!(source.next_line().await.unwrap().is_none());
        assert!(source.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reader_source_truncates_long_lines() {
        let input: &[u8] = b"0123456789abcdef\n";
        let mut source = ReaderSource::new(input, "test", 8);
        let line = source.next_line().await.unwrap().unwrap();
        assert_eq!(line.text, "01234567");
    }

    #[tokio::test]
    async fn reader_source_replaces_invalid_utf8() {
        let input: &[u8] = b"bad \xff byte\n";
        let mut source = ReaderSource::new(input, "test", 1024);
        let line = source.next_line().await.unwrap().unwrap();
        assert!(line.text.starts_with("bad "));
        assert!(line.text.ends_with(" byte"));
    }

    #[test]
    fn api_mode_selects_api_source() {
        let config = WatchdogConfig {
            app_name: "mockup-backend-128".to_owned(),
            source_mode: SourceMode::Api,
            ..WatchdogConfig::default()
        };

        let polling = ConfiguredSource::polling(&config).unwrap();
        assert_eq!(polling.mode(), SourceMode::Api);
        assert_eq!(polling.describe(), "api:mockup-backend-128");

        let streaming = ConfiguredSource::streaming(&config).unwrap();
        assert_eq!(streaming.mode(), SourceMode::Api);
    }

    #[test]
    fn api_mode_without_app_is_a_config_error() {
        let config = WatchdogConfig {
            source_mode: SourceMode::Api,
            ..WatchdogConfig::default()
        };

        let err = ConfiguredSource::polling(&config).err().unwrap();
        assert!(matches!(err, WatchdogError::Config { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cli_mode_selects_cli_source() {
        let config = WatchdogConfig {
            app_name: "demo".to_owned(),
            cli_bin: "echo".to_owned(),
            source_mode: SourceMode::Cli,
            ..WatchdogConfig::default()
        };

        let mut streaming = ConfiguredSource::streaming(&config).unwrap();
        assert_eq!(streaming.mode(), SourceMode::Cli);
        assert_eq!(streaming.describe(), "cli:echo logs --tail --app demo");
        let line = streaming.next_line().await.unwrap().unwrap();
        assert_eq!(line.text, "logs --tail --app demo");
        assert!(streaming.next_line().await.unwrap().is_none());

        let mut polling = ConfiguredSource::polling(&config).unwrap();
        assert_eq!(polling.describe(), "cli:echo logs --app demo");
        let lines = collect_lines(&mut polling).await.unwrap();
        assert_eq!(lines.len(), 1);
    }

    #[tokio::test]
    async fn cli_mode_reports_missing_binary() {
        let config = WatchdogConfig {
            cli_bin: "/nonexistent/dynowatch-test-cli".to_owned(),
            source_mode: SourceMode::Cli,
            ..WatchdogConfig::default()
        };

        let err = ConfiguredSource::streaming(&config).err().unwrap();
        assert!(matches!(err, WatchdogError::Spawn { .. }));
    }

    #[tokio::test]
    async fn empty_lines_are_yielded() {
        let input: &[u8] = b"\n\nx\n";
        let mut source = ReaderSource::new(input, "test", 1024);
        let lines = collect_lines(&mut source).await.unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text, "");
    }
}
