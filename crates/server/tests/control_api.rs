//! In-process tests for the control API.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

use common::TestFixture;
use harvester_core::{testing::MockResponse, RunOutcome};

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new(&["01"]);
    let response = fixture.get("/api/v1/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_returns_summary() {
    let fixture = TestFixture::new(&["01"]);
    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["mode"], "fast");
    assert_eq!(response.body["concurrency"], 15);
    assert_eq!(response.body["failure_threshold"], 1000);
    assert_eq!(response.body["storage_backend"], "csv");
    assert_eq!(response.body["records_path"], "data/results.csv");
}

#[tokio::test]
async fn test_status_before_any_run() {
    let fixture = TestFixture::new(&["01"]);
    let response = fixture.get("/api/v1/status").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["client"], "mock");
    assert_eq!(response.body["keys_dispatched"], 0);
}

#[tokio::test]
async fn test_status_after_completed_run() {
    let fixture = TestFixture::new(&["01"]);
    fixture.client.set_pattern("01", "FNFNNNFN");

    let summary = assert_ok!(fixture.orchestrator.start(true).await);
    assert_eq!(summary.outcome, RunOutcome::Completed);

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["state"]["state"], "all_done");
    assert_eq!(response.body["keys_dispatched"], 6);
    assert_eq!(response.body["records_found"], 2);
    assert_eq!(response.body["records_flushed"], 2);
    assert_eq!(response.body["partitions_exhausted"], 1);
}

#[tokio::test]
async fn test_stop_without_running_harvest_conflicts() {
    let fixture = TestFixture::new(&["01"]);
    let response = fixture.post("/api/v1/stop").await;

    assert_eq!(response.status, StatusCode::CONFLICT);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_stop_running_harvest() {
    let fixture = TestFixture::new(&["01"]);
    // every key is found, so only a stop ends the run
    fixture.client.set_default(MockResponse::Found);
    fixture.client.set_jitter(3, Duration::from_millis(5));

    let orchestrator = fixture.orchestrator.clone();
    let run = tokio::spawn(async move { orchestrator.start(true).await });

    let started = timeout(Duration::from_secs(5), async {
        while !fixture.orchestrator.is_running() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "harvest did not start");
    sleep(Duration::from_millis(50)).await;

    let response = fixture.post("/api/v1/stop").await;
    assert_eq!(response.status, StatusCode::ACCEPTED);

    let summary = timeout(Duration::from_secs(5), run)
        .await
        .expect("harvest did not stop")
        .unwrap()
        .unwrap();
    assert_eq!(summary.outcome, RunOutcome::Stopped);
    assert!(summary.records_found > 0);
    assert_eq!(fixture.records.records().len() as u64, summary.records_found);

    let response = fixture.get("/api/v1/status").await;
    assert_eq!(response.body["running"], false);
    assert_eq!(response.body["state"]["state"], "scanning_partition");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new(&["01"]);
    fixture.get("/api/v1/health").await;

    let response = fixture.get("/metrics").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.text.contains("harvester_http_requests_total"));
    assert!(response.text.contains("/api/v1/health"));
    assert!(response.text.contains("harvester_running"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let fixture = TestFixture::new(&["01"]);
    let response = fixture.get("/api/v1/tickets").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
