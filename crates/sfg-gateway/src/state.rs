//! Application state

use crate::config::GatewayConfig;
use sfg_core::{DealCommitter, DecisionEngine, MemoryObjectIndex, ObjectIndex, Stager, ValidationLimits};
use sfg_mk20::{HttpMk20Client, MemoryMk20Client, Mk20Adapter, Mk20Client};
use std::sync::Arc;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// Gateway configuration
    pub config: GatewayConfig,
    /// Writes request bodies to the staging directory
    pub stager: Stager,
    /// Create-vs-overwrite decisions and deal commits
    pub engine: DecisionEngine,
}

impl AppState {
    /// Build the state with the default capabilities for `config`
    ///
    /// Uses the HTTP deal protocol when an MK20 endpoint is configured and
    /// the in-memory one otherwise.
    pub fn new(config: GatewayConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let adapter_config = config.adapter_config();
        adapter_config.validate()?;

        let client: Arc<dyn Mk20Client> = match config.mk20_client_config() {
            Some(client_config) => {
                info!("MK20 endpoint: {}", client_config.base_url);
                Arc::new(HttpMk20Client::new(client_config)?)
            }
            None => {
                warn!("MK20_BASE_URL is not set, using the in-memory deal protocol (deals will NOT persist)");
                Arc::new(MemoryMk20Client::new())
            }
        };

        let committer = Arc::new(Mk20Adapter::new(client, adapter_config));
        let index = Arc::new(MemoryObjectIndex::new());

        Ok(Self::with_capabilities(config, index, committer))
    }

    /// Build the state around caller-supplied capabilities
    pub fn with_capabilities(
        config: GatewayConfig,
        index: Arc<dyn ObjectIndex>,
        committer: Arc<dyn DealCommitter>,
    ) -> Self {
        let stager = Stager::new(config.stager_config());
        let engine =
            DecisionEngine::new(index, committer).with_retry_policy(config.retry_policy());

        Self {
            config,
            stager,
            engine,
        }
    }

    pub fn validation_limits(&self) -> ValidationLimits {
        self.config.validation_limits()
    }
}
