use ads_mcp::errors::{AdsError, AdsErrorKind};
use ads_mcp::services::ads_client::{AdsClient, RequestScope};
use ads_mcp::services::logger::Logger;
use ads_mcp::services::reports::{
    CampaignType, PollConfig, ReportRequest, ReportType, ReportWorkflow,
};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::json;
use std::io::Write;
use std::time::Duration;

mod common;
use common::{report_rows, MockUpstream, Reply, Route};

fn workflow(mock: &MockUpstream, max_attempts: usize) -> ReportWorkflow {
    let logger = Logger::new("workflow-test");
    let settings = mock.settings();
    let client = AdsClient::new(logger.clone(), &settings).expect("client");
    ReportWorkflow::new(
        client,
        logger,
        PollConfig {
            max_attempts,
            interval: Duration::from_millis(5),
            rate_limit_attempts: 3,
        },
    )
}

fn scope() -> RequestScope {
    RequestScope::new("Atza|integration-token-0001", "client-1").with_profile("111")
}

fn request() -> ReportRequest {
    ReportRequest::new(
        ReportType::Campaigns,
        CampaignType::SponsoredProducts,
        "20240101",
        "20240107",
    )
}

fn submitted(mock: &MockUpstream) {
    mock.script(
        Route::Submit,
        vec![Reply::json(202, json!({"reportId": "r-1", "status": "IN_PROGRESS"}))],
    );
}

fn in_progress() -> Reply {
    Reply::json(200, json!({"reportId": "r-1", "status": "IN_PROGRESS"}))
}

fn success(mock: &MockUpstream) -> Reply {
    Reply::json(
        200,
        json!({"reportId": "r-1", "status": "SUCCESS", "location": mock.file_url("r-1"), "fileSize": 512}),
    )
}

#[tokio::test]
async fn completes_after_two_in_progress_polls() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(Route::Status, vec![in_progress(), in_progress(), success(&mock)]);
    mock.script(Route::Download, vec![Reply::json(200, report_rows())]);

    let outcome = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .expect("report");

    assert_eq!(outcome.report_id, "r-1");
    assert_eq!(outcome.polls, 3);
    assert_eq!(outcome.file_size, Some(512));
    assert_eq!(mock.calls(Route::Submit), 1);
    assert_eq!(mock.calls(Route::Status), 3);
    assert_eq!(mock.calls(Route::Download), 1);

    let (rows, summary) = outcome.normalize(ReportType::Campaigns);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].entity_id.as_deref(), Some("1"));
    assert_eq!(summary.total_impressions, 300);
    assert_eq!(summary.total_clicks, 30);
    assert_eq!(summary.total_cost, 15.0);
    assert_eq!(summary.total_sales, 150.0);
    assert_eq!(summary.overall_ctr, 0.1);
    assert_eq!(summary.overall_cpc, 0.5);
    assert_eq!(summary.overall_acos, 0.1);
    assert_eq!(summary.overall_roas, 10.0);
}

#[tokio::test]
async fn submission_carries_scope_and_report_body() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(Route::Status, vec![success(&mock)]);
    mock.script(Route::Download, vec![Reply::json(200, json!([]))]);

    let mut req = request();
    req.campaign_ids = vec!["9".into()];
    let outcome = workflow(&mock, 30).run(&scope(), &req).await.expect("report");
    assert!(outcome.rows.is_empty());

    let submit = &mock.requests(Route::Submit)[0];
    assert_eq!(submit.path, "/v2/sp/campaigns/report");
    assert_eq!(submit.headers["amazon-advertising-api-scope"], "111");
    assert_eq!(submit.headers["amazon-advertising-api-clientid"], "client-1");
    let body: serde_json::Value = serde_json::from_slice(&submit.body).unwrap();
    assert_eq!(body["startDate"], "20240101");
    assert_eq!(body["campaignIdFilter"], "9");

    let poll = &mock.requests(Route::Status)[0];
    assert_eq!(poll.path, "/v2/reports/r-1");
    assert_eq!(poll.headers["amazon-advertising-api-scope"], "111");

    let download = &mock.requests(Route::Download)[0];
    assert!(!download.headers.contains_key("authorization"));
}

#[tokio::test]
async fn never_leaving_in_progress_times_out() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(Route::Status, vec![in_progress()]);

    let err = workflow(&mock, 4)
        .run(&scope(), &request())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), AdsErrorKind::Timeout);
    assert!(err.to_string().contains("max attempts reached"));
    assert_eq!(mock.calls(Route::Status), 4);
    assert_eq!(mock.calls(Route::Download), 0);
}

#[tokio::test]
async fn failure_status_stops_polling_with_details() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(
        Route::Status,
        vec![
            in_progress(),
            Reply::json(200, json!({"reportId": "r-1", "status": "FAILURE", "statusDetails": "X"})),
            success(&mock),
        ],
    );

    let err = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .unwrap_err();

    match &err {
        AdsError::ReportFailed { report_id, details } => {
            assert_eq!(report_id, "r-1");
            assert_eq!(details, "X");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(err.kind(), AdsErrorKind::Upstream);
    assert_eq!(mock.calls(Route::Status), 2);
    assert_eq!(mock.calls(Route::Download), 0);
}

#[tokio::test]
async fn missing_profile_fails_before_any_request() {
    let mock = MockUpstream::start().await;
    submitted(&mock);

    let unscoped = RequestScope::new("token", "client-1");
    let err = workflow(&mock, 30)
        .run(&unscoped, &request())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), AdsErrorKind::Validation);
    assert!(err.to_string().contains("profile_id"));
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn invalid_dates_fail_before_any_request() {
    let mock = MockUpstream::start().await;
    let mut req = request();
    req.end_date = "20231231".into();

    let err = workflow(&mock, 30).run(&scope(), &req).await.unwrap_err();
    assert_eq!(err.kind(), AdsErrorKind::Validation);
    assert_eq!(mock.total_calls(), 0);
}

#[tokio::test]
async fn success_without_location_is_a_contract_error() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(
        Route::Status,
        vec![Reply::json(200, json!({"reportId": "r-1", "status": "SUCCESS"}))],
    );

    let err = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .unwrap_err();
    assert!(matches!(err, AdsError::Contract(_)));
    assert_eq!(err.kind(), AdsErrorKind::Upstream);
    assert_eq!(mock.calls(Route::Download), 0);
}

#[tokio::test]
async fn submission_without_report_id_is_a_contract_error() {
    let mock = MockUpstream::start().await;
    mock.script(Route::Submit, vec![Reply::json(202, json!({"status": "IN_PROGRESS"}))]);

    let err = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .unwrap_err();
    assert!(matches!(err, AdsError::Contract(_)));
    assert_eq!(mock.calls(Route::Status), 0);
}

#[tokio::test]
async fn single_object_download_becomes_one_row() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(Route::Status, vec![success(&mock)]);
    mock.script(
        Route::Download,
        vec![Reply::json(200, json!({"campaignId": 5, "impressions": 10, "clicks": 1}))],
    );

    let outcome = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .expect("report");
    assert_eq!(outcome.rows.len(), 1);
    let (rows, summary) = outcome.normalize(ReportType::Campaigns);
    assert_eq!(rows[0].entity_id.as_deref(), Some("5"));
    assert_eq!(summary.overall_ctr, 0.1);
}

#[tokio::test]
async fn gzip_report_file_is_inflated() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(Route::Status, vec![success(&mock)]);
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serde_json::to_string(&report_rows()).unwrap().as_bytes())
        .unwrap();
    mock.script(
        Route::Download,
        vec![Reply::bytes(200, encoder.finish().unwrap())
            .with_header("content-type", "application/octet-stream")],
    );

    let outcome = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .expect("report");
    assert_eq!(outcome.rows.len(), 3);
}

#[tokio::test]
async fn rate_limited_poll_waits_and_resumes() {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(
        Route::Status,
        vec![
            Reply::json(429, json!({"code": "THROTTLED"})).with_header("retry-after", "1"),
            success(&mock),
        ],
    );
    mock.script(Route::Download, vec![Reply::json(200, report_rows())]);

    let started = std::time::Instant::now();
    let outcome = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .expect("report");
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(outcome.polls, 1);
    assert_eq!(mock.calls(Route::Status), 2);
}

#[tokio::test]
async fn failed_submission_is_not_retried() {
    let mock = MockUpstream::start().await;
    mock.script(Route::Submit, vec![Reply::json(500, json!({"message": "boom"}))]);

    let err = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), AdsErrorKind::UpstreamServer);
    assert_eq!(err.http_status(), Some(500));
    assert_eq!(mock.calls(Route::Submit), 1);
}

async fn run_with_download(reply: Reply) -> (MockUpstream, AdsError) {
    let mock = MockUpstream::start().await;
    submitted(&mock);
    mock.script(Route::Status, vec![success(&mock)]);
    mock.script(Route::Download, vec![reply]);
    let err = workflow(&mock, 30)
        .run(&scope(), &request())
        .await
        .unwrap_err();
    (mock, err)
}

#[tokio::test]
async fn rejected_download_is_classified() {
    let (mock, err) = run_with_download(Reply::bytes(
        403,
        b"<Error><Code>AccessDenied</Code></Error>".to_vec(),
    ))
    .await;
    assert_eq!(err.kind(), AdsErrorKind::Forbidden);
    assert_eq!(err.http_status(), Some(403));
    assert_eq!(mock.calls(Route::Download), 1);

    let (_, err) = run_with_download(Reply::json(500, json!({"message": "storage down"}))).await;
    assert_eq!(err.kind(), AdsErrorKind::UpstreamServer);
    assert_eq!(err.http_status(), Some(500));
}

#[tokio::test]
async fn scalar_download_is_a_contract_error() {
    let (_, err) = run_with_download(Reply::json(200, json!(42))).await;
    assert!(matches!(err, AdsError::Contract(_)));
    assert!(err.to_string().contains("number"));
    assert_eq!(err.kind(), AdsErrorKind::Upstream);
}

#[tokio::test]
async fn non_json_download_is_a_contract_error() {
    let (_, err) = run_with_download(Reply::bytes(200, b"campaignId,impressions\n1,10".to_vec())).await;
    assert!(matches!(err, AdsError::Contract(_)));
    assert!(err.to_string().contains("not valid JSON"));
}
