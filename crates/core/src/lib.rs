pub mod config;
pub mod dispatcher;
pub mod fetch;
pub mod metrics;
pub mod orchestrator;
pub mod partition;
pub mod progress;
pub mod record;
pub mod scheduler;
pub mod sink;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, ConfigSummary,
    HarvestMode, StorageBackend,
};
pub use dispatcher::{BatchDispatcher, KeyBudget, PartitionEnd, PartitionResult};
pub use fetch::{ApiFetchClient, FetchClient, FetchError, Outcome, PageFetchClient};
pub use orchestrator::{
    HarvestError, HarvestOptions, HarvestOrchestrator, HarvestStatus, RunOutcome, RunSummary,
    StopHandle,
};
pub use partition::{all_partitions, CandidateKey, KeyRange, PartitionCode};
pub use progress::{JsonProgressStore, MemoryProgressStore, ProgressState, ProgressStore};
pub use record::{Record, Subject};
pub use scheduler::SchedulerState;
pub use sink::{CsvRecordStore, MemoryRecordStore, RecordStore, SqliteRecordStore};
