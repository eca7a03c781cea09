use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester_core::{
    load_config, validate_config, ApiFetchClient, Config, CsvRecordStore, FetchClient,
    HarvestMode, HarvestOrchestrator, JsonProgressStore, MemoryProgressStore, MemoryRecordStore,
    PageFetchClient, ProgressStore, RecordStore, RunOutcome, SqliteRecordStore, StopHandle,
    StorageBackend,
};
use harvester_server::{api::create_router, state::AppState};

const DEFAULT_CONFIG_PATH: &str = "harvester.toml";

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load config
    let config_path =
        std::env::var("HARVEST_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    info!("Loading configuration from {}", config_path);

    let config = load_config(Path::new(&config_path))
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    let options = config.harvest.options();
    info!(
        mode = config.harvest.mode.as_str(),
        resume = config.harvest.resume,
        "Configuration loaded"
    );

    let client = create_fetch_client(&config, &options.per_fetch_timeout)?;

    // Dry runs never touch the durable stores
    let dry_run = config.harvest.dry_run_keys.is_some();
    let dry_records = Arc::new(MemoryRecordStore::new());
    let (progress_store, record_store): (Arc<dyn ProgressStore>, Arc<dyn RecordStore>) =
        if dry_run {
            info!(
                keys = ?config.harvest.dry_run_keys,
                "Dry run: results are kept in memory only"
            );
            (Arc::new(MemoryProgressStore::new()), dry_records.clone())
        } else {
            (
                Arc::new(JsonProgressStore::new(&config.storage.progress_path)),
                create_record_store(&config)?,
            )
        };

    let orchestrator = Arc::new(HarvestOrchestrator::new(
        options,
        client,
        progress_store,
        record_store,
    ));

    // Ctrl+C / SIGTERM request a graceful stop
    tokio::spawn(stop_on_signal(orchestrator.stop_handle()));

    let server = if config.server.enabled {
        Some(spawn_server(&config, orchestrator.clone()).await?)
    } else {
        None
    };

    let result = orchestrator.start(config.harvest.resume).await;

    if let Some((shutdown_tx, handle)) = server {
        info!("Stopping control server...");
        let _ = shutdown_tx.send(());
        match handle.await {
            Ok(Err(e)) => warn!("Control server error: {:#}", e),
            Err(e) => warn!("Control server task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    let summary = result.context("Harvest failed")?;
    match summary.outcome {
        RunOutcome::Completed => info!("All partitions exhausted"),
        RunOutcome::Stopped => info!("Harvest stopped, progress saved"),
        RunOutcome::BudgetSpent => info!("Dry-run budget spent"),
    }

    if dry_run {
        for record in dry_records.records() {
            info!(
                registration_number = %record.registration_number,
                council = %record.council_code,
                total = %record.total_score,
                "Dry-run record"
            );
        }
    }

    Ok(())
}

fn create_fetch_client(
    config: &Config,
    request_timeout: &std::time::Duration,
) -> Result<Arc<dyn FetchClient>> {
    let client: Arc<dyn FetchClient> = match config.harvest.mode {
        HarvestMode::Fast => {
            info!("Using API fetch client at {}", config.source.api_url);
            Arc::new(
                ApiFetchClient::new(&config.source, *request_timeout)
                    .context("Failed to create API fetch client")?,
            )
        }
        HarvestMode::Fallback => {
            info!("Using result page fetch client at {}", config.source.page_url);
            Arc::new(
                PageFetchClient::new(&config.source, *request_timeout)
                    .context("Failed to create page fetch client")?,
            )
        }
    };
    Ok(client)
}

fn create_record_store(config: &Config) -> Result<Arc<dyn RecordStore>> {
    let path = &config.storage.records_path;
    let store: Arc<dyn RecordStore> = match config.storage.backend {
        StorageBackend::Csv => {
            info!("Writing records to CSV file {}", path.display());
            Arc::new(
                CsvRecordStore::new(path)
                    .with_context(|| format!("Failed to open CSV file {}", path.display()))?,
            )
        }
        StorageBackend::Sqlite => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
            info!("Writing records to SQLite database {}", path.display());
            Arc::new(
                SqliteRecordStore::new(path)
                    .with_context(|| format!("Failed to open database {}", path.display()))?,
            )
        }
    };
    Ok(store)
}

type ServerHandle = (oneshot::Sender<()>, JoinHandle<Result<()>>);

async fn spawn_server(
    config: &Config,
    orchestrator: Arc<HarvestOrchestrator>,
) -> Result<ServerHandle> {
    let state = Arc::new(AppState::new(config, orchestrator));
    let app = create_router(state);

    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting control server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .context("Server error")
    });

    Ok((shutdown_tx, handle))
}

async fn stop_on_signal(stop: StopHandle) {
    loop {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping harvest...");
        stop.stop();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
