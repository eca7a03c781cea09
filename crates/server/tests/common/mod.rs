//! Common test utilities for the control API.
//!
//! Builds an in-process router over an orchestrator wired to the mock fetch
//! client and in-memory stores, so requests can be sent with `oneshot`
//! without binding a port.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use harvester_core::{
    testing::MockFetchClient, Config, HarvestOrchestrator, MemoryProgressStore, MemoryRecordStore,
};
use harvester_server::state::AppState;

/// Re-export fixtures for test convenience
pub use harvester_core::testing::fixtures;

/// In-process control server with a scriptable fetch client.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new(&["01"]);
/// fixture.client.set_pattern("01", "FNFNNN");
///
/// let response = fixture.get("/api/v1/status").await;
/// assert_eq!(response.status, 200);
/// ```
pub struct TestFixture {
    pub router: Router,
    pub client: Arc<MockFetchClient>,
    pub orchestrator: Arc<HarvestOrchestrator>,
    pub records: Arc<MemoryRecordStore>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Fixture harvesting `partitions` with the small test options.
    pub fn new(partitions: &[&str]) -> Self {
        let client = Arc::new(MockFetchClient::new());
        let records = Arc::new(MemoryRecordStore::new());

        let mut options = fixtures::options(partitions);
        options.probe_key = Some("65000001".to_string());
        client.script("65000001", &[harvester_core::testing::MockResponse::Found]);

        let orchestrator = Arc::new(HarvestOrchestrator::new(
            options,
            client.clone(),
            Arc::new(MemoryProgressStore::new()),
            records.clone(),
        ));

        let state = Arc::new(AppState::new(&Config::default(), orchestrator.clone()));
        let router = harvester_server::api::create_router(state);

        Self {
            router,
            client,
            orchestrator,
            records,
        }
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path).await
    }

    pub async fn post(&self, path: &str) -> TestResponse {
        self.request("POST", path).await
    }

    async fn request(&self, method: &str, path: &str) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body, text }
    }
}
