use std::sync::Arc;

use harvester_core::{Config, ConfigSummary, HarvestOrchestrator};

/// Shared application state
pub struct AppState {
    config: ConfigSummary,
    orchestrator: Arc<HarvestOrchestrator>,
}

impl AppState {
    pub fn new(config: &Config, orchestrator: Arc<HarvestOrchestrator>) -> Self {
        Self {
            config: ConfigSummary::from(config),
            orchestrator,
        }
    }

    pub fn config_summary(&self) -> &ConfigSummary {
        &self.config
    }

    pub fn orchestrator(&self) -> &HarvestOrchestrator {
        self.orchestrator.as_ref()
    }
}
