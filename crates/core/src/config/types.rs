use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::HarvestOptions;
use crate::partition::PartitionCode;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub harvest: HarvestConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Collection strategy. Each mode selects a fetch client and a set of
/// option defaults tuned for it.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HarvestMode {
    /// JSON API endpoint, high concurrency.
    #[default]
    Fast,
    /// HTML result page, low concurrency.
    Fallback,
}

impl HarvestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestMode::Fast => "fast",
            HarvestMode::Fallback => "fallback",
        }
    }
}

/// Harvest run configuration.
///
/// Every tuning value is optional; unset values fall back to the defaults of
/// the selected [`HarvestMode`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub mode: HarvestMode,
    /// Continue from the saved progress file instead of starting empty.
    #[serde(default = "default_resume")]
    pub resume: bool,
    /// Only dispatch this many keys in total, then stop (validation runs).
    #[serde(default)]
    pub dry_run_keys: Option<u64>,
    /// Restrict the run to these partition codes (still scanned in code order).
    #[serde(default)]
    pub partitions: Option<Vec<String>>,
    /// Key used for the connectivity probe before dispatch starts.
    #[serde(default)]
    pub probe_key: Option<String>,
    #[serde(default)]
    pub concurrency: Option<usize>,
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub failure_threshold: Option<u32>,
    #[serde(default)]
    pub flush_every: Option<usize>,
    #[serde(default)]
    pub per_fetch_timeout_ms: Option<u64>,
    #[serde(default)]
    pub retry_attempts: Option<u32>,
    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,
}

fn default_resume() -> bool {
    true
}

impl HarvestConfig {
    /// Resolve the explicit option set handed to the orchestrator.
    pub fn options(&self) -> HarvestOptions {
        let defaults = HarvestOptions::for_mode(self.mode);
        HarvestOptions {
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            failure_threshold: self.failure_threshold.unwrap_or(defaults.failure_threshold),
            flush_every: self.flush_every.unwrap_or(defaults.flush_every),
            per_fetch_timeout: self
                .per_fetch_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.per_fetch_timeout),
            retry_attempts: self.retry_attempts.unwrap_or(defaults.retry_attempts),
            retry_base_delay: self
                .retry_base_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_base_delay),
            dry_run_keys: self.dry_run_keys,
            probe_key: self.probe_key.clone(),
            partitions: self
                .partitions
                .as_ref()
                .map(|codes| codes.iter().filter_map(|c| PartitionCode::new(c).ok()).collect()),
        }
    }
}

/// Upstream data source configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// JSON API endpoint used in fast mode.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// HTML result page used in fallback mode.
    #[serde(default = "default_page_url")]
    pub page_url: String,
    /// Exam year passed to the API.
    #[serde(default = "default_year")]
    pub year: u16,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            page_url: default_page_url(),
            year: default_year(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_url() -> String {
    "https://s6.tuoitre.vn/api/diem-thi-thpt.htm".to_string()
}

fn default_page_url() -> String {
    "https://tuoitre.vn/diem-thi.htm".to_string()
}

fn default_year() -> u16 {
    2025
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}

/// Durable storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Record output (CSV file or SQLite database).
    #[serde(default = "default_records_path")]
    pub records_path: PathBuf,
    /// Progress/skip state file.
    #[serde(default = "default_progress_path")]
    pub progress_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            records_path: default_records_path(),
            progress_path: default_progress_path(),
        }
    }
}

fn default_records_path() -> PathBuf {
    PathBuf::from("data/results.csv")
}

fn default_progress_path() -> PathBuf {
    PathBuf::from("data/progress.json")
}

/// Available record storage backends
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Csv,
    Sqlite,
}

/// Control server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Config view returned by the control API.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigSummary {
    pub mode: String,
    pub resume: bool,
    pub dry_run_keys: Option<u64>,
    pub concurrency: usize,
    pub batch_size: usize,
    pub failure_threshold: u32,
    pub flush_every: usize,
    pub per_fetch_timeout_ms: u64,
    pub retry_attempts: u32,
    pub storage_backend: StorageBackend,
    pub records_path: PathBuf,
    pub progress_path: PathBuf,
    pub source_url: String,
}

impl From<&Config> for ConfigSummary {
    fn from(config: &Config) -> Self {
        let options = config.harvest.options();
        let source_url = match config.harvest.mode {
            HarvestMode::Fast => config.source.api_url.clone(),
            HarvestMode::Fallback => config.source.page_url.clone(),
        };
        Self {
            mode: config.harvest.mode.as_str().to_string(),
            resume: config.harvest.resume,
            dry_run_keys: options.dry_run_keys,
            concurrency: options.concurrency,
            batch_size: options.batch_size,
            failure_threshold: options.failure_threshold,
            flush_every: options.flush_every,
            per_fetch_timeout_ms: options.per_fetch_timeout.as_millis() as u64,
            retry_attempts: options.retry_attempts,
            storage_backend: config.storage.backend,
            records_path: config.storage.records_path.clone(),
            progress_path: config.storage.progress_path.clone(),
            source_url,
        }
    }
}
