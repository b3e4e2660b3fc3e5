//! 통합 테스트 -- 전체 파이프라인 플로우 검증
//!
//! 로그 소스 → 시그니처 매칭 → 복구 실행 시나리오를 테스트합니다.
//! 타이밍 검증은 일시정지된 tokio 시계에서, HTTP 경로는 wiremock 서버로 검증합니다.

use std::sync::Arc;
use std::time::Duration;

use dynowatch_core::config::DEFAULT_SIGNATURE;
use dynowatch_core::types::ProcessFormation;
use dynowatch_watchdog::{
    ApiLogSource, ConfiguredSource, HerokuApiClient, LogSource, MatchMode, PlatformClient,
    ReaderSource, RemediationStrategy, SourceMode, WatchOutcome, Watchdog, WatchdogConfig,
    WatchdogConfigBuilder, WatchdogError,
};
use serde_json::json;
use tokio::time::Instant;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Mock platform client for integration tests
mod mock {
    use super::*;
    use dynowatch_watchdog::CommandOutput;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Scale(String),
        Restart,
    }

    pub struct TestPlatformClient {
        calls: Mutex<Vec<(Call, Instant)>>,
        fail_scale_to: Mutex<Option<u32>>,
    }

    impl TestPlatformClient {
        pub fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_scale_to: Mutex::new(None),
            }
        }

        pub async fn set_fail_scale_to(&self, quantity: Option<u32>) {
            *self.fail_scale_to.lock().await = quantity;
        }

        pub async fn calls(&self) -> Vec<Call> {
            self.calls.lock().await.iter().map(|(c, _)| c.clone()).collect()
        }

        pub async fn timed_calls(&self) -> Vec<(Call, Instant)> {
            self.calls.lock().await.clone()
        }
    }

    impl PlatformClient for TestPlatformClient {
        fn name(&self) -> &str {
            "test"
        }

        async fn scale(
            &self,
            formation: &ProcessFormation,
        ) -> Result<CommandOutput, WatchdogError> {
            self.calls
                .lock()
                .await
                .push((Call::Scale(formation.to_string()), Instant::now()));
            let command = format!("test ps:scale {formation}");
            if *self.fail_scale_to.lock().await == Some(formation.quantity) {
                return Err(WatchdogError::Command {
                    command,
                    reason: "exit status 1".to_owned(),
                });
            }
            Ok(CommandOutput::success(command, Some(0), "Scaling dynos... done"))
        }

        async fn restart(&self) -> Result<CommandOutput, WatchdogError> {
            self.calls.lock().await.push((Call::Restart, Instant::now()));
            Ok(CommandOutput::success("test ps:restart", Some(0), ""))
        }
    }
}

use mock::{Call, TestPlatformClient};

fn lines_source(lines: &[&str]) -> ReaderSource<std::io::Cursor<Vec<u8>>> {
    let mut data = lines.join("\n").into_bytes();
    data.push(b'\n');
    ReaderSource::new(std::io::Cursor::new(data), "test", 64 * 1024)
}

fn scale(formation: &str) -> Call {
    Call::Scale(formation.to_owned())
}

#[tokio::test(start_paused = true)]
async fn signature_between_normal_lines_cycles_web_dynos() {
    let platform = Arc::new(TestPlatformClient::new());
    let mut watchdog =
        Watchdog::from_config(Arc::clone(&platform), &WatchdogConfig::default()).unwrap();
    let mut source = lines_source(&["Build succeeded", DEFAULT_SIGNATURE, "Deploy complete"]);

    let report = watchdog.check_once(&mut source).await.unwrap();

    assert_eq!(report.outcome, WatchOutcome::Remediated);
    assert_eq!(report.lines_read, 3);
    assert_eq!(report.matches, 1);

    let calls = platform.timed_calls().await;
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, scale("web=0"));
    assert_eq!(calls[1].0, scale("web=1"));
    assert_eq!(calls[1].1 - calls[0].1, Duration::from_secs(60));

    let remediation = &report.reports[0];
    assert_eq!(remediation.outputs.len(), 2);
    assert_eq!(remediation.outputs[0].command, "test ps:scale web=0");
    assert_eq!(watchdog.executor().last_known_quantity(), Some(1));
}

#[tokio::test(start_paused = true)]
async fn normal_lines_only_never_scale() {
    let platform = Arc::new(TestPlatformClient::new());
    let mut watchdog =
        Watchdog::from_config(Arc::clone(&platform), &WatchdogConfig::default()).unwrap();
    let mut source = lines_source(&["Build succeeded", "Deploy complete"]);

    let report = watchdog.check_once(&mut source).await.unwrap();

    assert_eq!(report.outcome, WatchOutcome::NoErrorDetected);
    assert_eq!(report.remediations, 0);
    assert!(platform.calls().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn custom_wait_is_observed_exactly() {
    let platform = Arc::new(TestPlatformClient::new());
    let config = WatchdogConfigBuilder::new()
        .formation("worker", 1, 4)
        .wait_secs(15)
        .build()
        .unwrap();
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let mut source = lines_source(&[DEFAULT_SIGNATURE]);

    let start = Instant::now();
    watchdog.check_once(&mut source).await.unwrap();

    let calls = platform.timed_calls().await;
    assert_eq!(calls[0].0, scale("worker=1"));
    assert_eq!(calls[1].0, scale("worker=4"));
    assert_eq!(calls[0].1, start);
    assert_eq!(calls[1].1 - start, Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn tail_continues_past_non_matching_lines_until_stream_ends() {
    let platform = Arc::new(TestPlatformClient::new());
    let config = WatchdogConfigBuilder::new().cooldown_secs(0).build().unwrap();
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let mut source = lines_source(&[
        "Starting process with command `node index.js`",
        DEFAULT_SIGNATURE,
        "State changed from starting to up",
        "GET /rooms 200",
        DEFAULT_SIGNATURE,
        "GET /reviews 200",
    ]);

    let report = watchdog.watch(&mut source).await;

    assert_eq!(report.outcome, WatchOutcome::StreamEnded);
    assert_eq!(report.lines_read, 6);
    assert_eq!(report.matches, 2);
    assert_eq!(report.remediations, 2);
    assert_eq!(
        platform.calls().await,
        vec![scale("web=0"), scale("web=1"), scale("web=0"), scale("web=1")]
    );
}

#[tokio::test(start_paused = true)]
async fn repeated_matches_within_cooldown_remediate_once() {
    let platform = Arc::new(TestPlatformClient::new());
    let mut watchdog =
        Watchdog::from_config(Arc::clone(&platform), &WatchdogConfig::default()).unwrap();
    let mut source = lines_source(&[DEFAULT_SIGNATURE, DEFAULT_SIGNATURE, DEFAULT_SIGNATURE]);

    let report = watchdog.watch(&mut source).await;

    assert_eq!(report.matches, 3);
    assert_eq!(report.remediations, 1);
    assert_eq!(report.suppressed, 2);
    assert_eq!(platform.calls().await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn failing_scale_down_skips_wait_and_scale_up() {
    let platform = Arc::new(TestPlatformClient::new());
    platform.set_fail_scale_to(Some(0)).await;
    let config = WatchdogConfigBuilder::new()
        .retry_max_attempts(1)
        .retry_backoff_base_ms(200)
        .build()
        .unwrap();
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let mut source = lines_source(&[DEFAULT_SIGNATURE]);

    let start = Instant::now();
    let err = watchdog.check_once(&mut source).await.unwrap_err();

    assert!(matches!(err, WatchdogError::Command { .. }));
    assert_eq!(platform.calls().await, vec![scale("web=0"), scale("web=0")]);
    assert_eq!(start.elapsed(), Duration::from_millis(200));
    assert_eq!(watchdog.executor().last_known_quantity(), None);
}

#[tokio::test(start_paused = true)]
async fn restart_strategy_restarts_all_dynos() {
    let platform = Arc::new(TestPlatformClient::new());
    let config = WatchdogConfigBuilder::new()
        .strategy(RemediationStrategy::Restart)
        .matcher(MatchMode::Regex, r"ER_USER_LIMIT_REACHED.*max_user_connections")
        .build()
        .unwrap();
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let mut source = lines_source(&[DEFAULT_SIGNATURE]);

    let report = watchdog.check_once(&mut source).await.unwrap();

    assert_eq!(report.outcome, WatchOutcome::Remediated);
    assert_eq!(platform.calls().await, vec![Call::Restart]);
}

// --- HTTP (wiremock) ---

fn api_config(server: &MockServer) -> WatchdogConfig {
    WatchdogConfigBuilder::new()
        .app_name("mockup-backend-128")
        .api_url(server.uri())
        .api_token("test-token")
        .wait_secs(0)
        .build()
        .unwrap()
}

#[tokio::test]
async fn api_source_fetches_once_with_heroku_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/mockup-backend-128/logs"))
        .and(header("Accept", "application/vnd.heroku+json; version=3"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"message": "Build succeeded"},
            {"message": "Deploy complete"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = HerokuApiClient::from_config(&api_config(&server)).unwrap();
    let mut source = ApiLogSource::new(client, 1024);
    assert_eq!(source.describe(), "api:mockup-backend-128");

    let first = source.next_line().await.unwrap().unwrap();
    let second = source.next_line().await.unwrap().unwrap();
    assert_eq!(first.text, "Build succeeded");
    assert_eq!(second.text, "Deploy complete");
    assert!(source.next_line().await.unwrap().is_none());
    assert!(source.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn api_retrieval_failure_ends_without_scaling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/mockup-backend-128/logs"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "id": "unauthorized",
            "message": "Invalid credentials provided."
        })))
        .mount(&server)
        .await;

    let platform = Arc::new(TestPlatformClient::new());
    let config = api_config(&server);
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let client = HerokuApiClient::from_config(&config).unwrap();
    let mut source = ApiLogSource::new(client, 1024);

    let report = watchdog.check_once(&mut source).await.unwrap();

    match report.outcome {
        WatchOutcome::RetrievalFailed { reason } => assert!(reason.contains("401")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(platform.calls().await.is_empty());
}

#[tokio::test]
async fn malformed_log_response_is_retrieval_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/mockup-backend-128/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = HerokuApiClient::from_config(&api_config(&server)).unwrap();
    let mut source = ApiLogSource::new(client, 1024);

    let err = source.next_line().await.unwrap_err();
    assert!(err.is_retrieval());
    assert!(source.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn api_source_mode_polls_platform_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/mockup-backend-128/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"message": "Build succeeded"},
            {"message": format!("Error: {DEFAULT_SIGNATURE}")}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = WatchdogConfigBuilder::new()
        .app_name("mockup-backend-128")
        .api_url(server.uri())
        .source_mode(SourceMode::Api)
        .wait_secs(0)
        .build()
        .unwrap();
    let platform = Arc::new(TestPlatformClient::new());
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let mut source = ConfiguredSource::polling(&config).unwrap();
    assert_eq!(source.mode(), SourceMode::Api);

    let report = watchdog.check_once(&mut source).await.unwrap();

    assert_eq!(report.source, "api:mockup-backend-128");
    assert_eq!(report.lines_read, 2);
    assert_eq!(report.outcome, WatchOutcome::Remediated);
    assert_eq!(platform.calls().await, vec![scale("web=0"), scale("web=1")]);
}

#[tokio::test]
async fn stalled_log_request_is_retrieval_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/mockup-backend-128/logs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(3600)),
        )
        .mount(&server)
        .await;

    let platform = Arc::new(TestPlatformClient::new());
    let config = api_config(&server);
    let mut watchdog = Watchdog::from_config(Arc::clone(&platform), &config).unwrap();
    let client = HerokuApiClient::from_config(&config)
        .unwrap()
        .with_fetch_timeout(Duration::from_millis(200));
    let mut source = ApiLogSource::new(client, 1024);

    let report = tokio::time::timeout(Duration::from_secs(10), watchdog.check_once(&mut source))
        .await
        .expect("check should end once the fetch timeout elapses")
        .unwrap();

    match report.outcome {
        WatchOutcome::RetrievalFailed { reason } => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(platform.calls().await.is_empty());
    assert!(source.next_line().await.unwrap().is_none());
}

#[tokio::test]
async fn api_backend_scale_cycle_patches_formation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/apps/mockup-backend-128/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"message": "Build succeeded"},
            {"message": DEFAULT_SIGNATURE},
            {"message": "Deploy complete"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/apps/mockup-backend-128/formation/web"))
        .and(body_json(json!({"quantity": 0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"quantity": 0})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/apps/mockup-backend-128/formation/web"))
        .and(body_json(json!({"quantity": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"quantity": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let config = api_config(&server);
    let platform = Arc::new(HerokuApiClient::from_config(&config).unwrap());
    let mut watchdog = Watchdog::from_config(platform, &config).unwrap();
    let mut source = ApiLogSource::new(HerokuApiClient::from_config(&config).unwrap(), 1024);

    let report = watchdog.check_once(&mut source).await.unwrap();
    assert_eq!(report.outcome, WatchOutcome::Remediated);

    let requests = server.received_requests().await.unwrap();
    let patches: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PATCH")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(patches, vec![json!({"quantity": 0}), json!({"quantity": 1})]);

    let outputs = &report.reports[0].outputs;
    assert_eq!(outputs[0].status, Some(200));
    assert!(outputs[0].command.starts_with("PATCH /apps/mockup-backend-128/formation/web"));
}

#[tokio::test]
async fn api_backend_error_status_is_command_failure() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/apps/mockup-backend-128/formation/web"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid quantity"))
        .mount(&server)
        .await;

    let client = HerokuApiClient::from_config(&api_config(&server)).unwrap();
    let err = client
        .scale(&ProcessFormation::new("web", 0))
        .await
        .unwrap_err();
    match err {
        WatchdogError::Command { reason, .. } => {
            assert!(reason.contains("422"));
            assert!(reason.contains("invalid quantity"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn api_backend_restart_deletes_dynos() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/apps/mockup-backend-128/dynos"))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = HerokuApiClient::from_config(&api_config(&server)).unwrap();
    let output = client.restart().await.unwrap();
    assert!(output.success);
    assert_eq!(output.status, Some(202));
}
