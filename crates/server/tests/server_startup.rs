//! Process-level tests for the `harvester` binary.

use std::collections::HashMap;
use std::net::TcpListener;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use axum::{extract::Query, routing::get, Router};
use reqwest::Client;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use harvester_core::testing::fixtures;

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("harvester.toml");
    std::fs::write(&path, content).unwrap();
    path
}

fn harvester(config_path: &Path) -> tokio::process::Command {
    let mut command = tokio::process::Command::new(env!("CARGO_BIN_EXE_harvester"));
    command
        .env("HARVEST_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    command
}

/// Serve the JSON API locally: `01000001` is found, every other key is
/// unknown, and each answer takes `delay`.
async fn spawn_fake_source(delay: Duration) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let app = Router::new().route(
        "/api",
        get(move |Query(params): Query<HashMap<String, String>>| async move {
            sleep(delay).await;
            match params.get("sbd").map(String::as_str) {
                Some("01000001") => fixtures::api_found_body("01000001"),
                _ => fixtures::api_not_found_body(),
            }
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    port
}

async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = timeout(
        Duration::from_secs(5),
        harvester(Path::new("/nonexistent/harvester.toml")).status(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command");

    assert!(!result.success());
}

#[tokio::test]
async fn test_invalid_config_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        dir.path(),
        r#"
[harvest]
concurrency = 0
"#,
    );

    let result = timeout(Duration::from_secs(5), harvester(&config).status())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert_eq!(result.code(), Some(1));
}

#[tokio::test]
async fn test_unreachable_source_exits_with_error() {
    let dir = TempDir::new().unwrap();
    let closed_port = get_available_port();
    let config = write_config(
        dir.path(),
        &format!(
            r#"
[harvest]
partitions = ["01"]
per_fetch_timeout_ms = 500
retry_base_delay_ms = 1

[source]
api_url = "http://127.0.0.1:{}/api"

[storage]
records_path = "{}"
progress_path = "{}"
"#,
            closed_port,
            dir.path().join("results.csv").display(),
            dir.path().join("progress.json").display(),
        ),
    );

    let result = timeout(Duration::from_secs(10), harvester(&config).status())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert_eq!(result.code(), Some(1));
    assert!(!dir.path().join("progress.json").exists());
}

#[tokio::test]
async fn test_harvest_completes_against_local_source() {
    let dir = TempDir::new().unwrap();
    let source_port = spawn_fake_source(Duration::ZERO).await;
    let records_path = dir.path().join("out/results.csv");
    let progress_path = dir.path().join("out/progress.json");
    let config = write_config(
        dir.path(),
        &format!(
            r#"
[harvest]
partitions = ["01"]
concurrency = 2
batch_size = 4
failure_threshold = 3

[source]
api_url = "http://127.0.0.1:{}/api"

[storage]
records_path = "{}"
progress_path = "{}"
"#,
            source_port,
            records_path.display(),
            progress_path.display(),
        ),
    );

    let result = timeout(Duration::from_secs(10), harvester(&config).status())
        .await
        .expect("Command timed out")
        .expect("Failed to execute command");

    assert!(result.success());
    let csv = std::fs::read_to_string(&records_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("registration_number,council_code,"));
    assert!(lines[1].starts_with("01000001,01,"));

    let progress: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&progress_path).unwrap()).unwrap();
    assert_eq!(progress["partitions"]["01"]["exhausted"], true);
    assert_eq!(progress["partitions"]["01"]["cursor"], 4);
}

#[tokio::test]
async fn test_control_server_stops_harvest() {
    let dir = TempDir::new().unwrap();
    let source_port = spawn_fake_source(Duration::from_millis(100)).await;
    let server_port = get_available_port();
    let records_path = dir.path().join("results.csv");
    let config = write_config(
        dir.path(),
        &format!(
            r#"
[harvest]
partitions = ["01"]
concurrency = 1
batch_size = 5
failure_threshold = 200

[source]
api_url = "http://127.0.0.1:{}/api"

[storage]
records_path = "{}"
progress_path = "{}"

[server]
enabled = true
port = {}
"#,
            source_port,
            records_path.display(),
            dir.path().join("progress.json").display(),
            server_port,
        ),
    );

    let mut child = harvester(&config).spawn().expect("Failed to spawn harvester");
    assert!(
        wait_for_server(server_port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let mut status = serde_json::Value::Null;
    for _ in 0..40 {
        status = client
            .get(format!("http://127.0.0.1:{}/api/v1/status", server_port))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if status["running"] == true {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(status["running"], true);
    assert_eq!(status["client"], "api");

    let response = client
        .post(format!("http://127.0.0.1:{}/api/v1/stop", server_port))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 202);

    let exit = timeout(Duration::from_secs(10), child.wait())
        .await
        .expect("Harvester did not stop")
        .unwrap();
    assert!(exit.success());
    assert!(dir.path().join("progress.json").exists());
}
