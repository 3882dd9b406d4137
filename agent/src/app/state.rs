//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::channel::http::HttpChannel;
use crate::context::ServerContext;
use crate::engine::process::ProcessEngine;
use crate::errors::AgentError;
use crate::state::env::EnvStateStore;
use crate::state::noop::NoopStateStore;
use crate::state::{StateBackend, StateStore, UpdateState};
use crate::update::UpdateAgent;

/// Main application state
pub struct AppState {
    /// Deployment server context
    pub context: Arc<ServerContext>,

    /// Update agent driving the check-in cycles
    pub agent: Arc<UpdateAgent>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(agent_version: String, options: &AppOptions) -> Result<Self, AgentError> {
        info!("Initializing application state (agent {})...", agent_version);

        // Prepare the on-disk layout
        let layout = &options.storage.layout;
        layout.setup().await?;

        // Create the server context
        let context = Arc::new(ServerContext::new(
            &options.server.base_url,
            &options.server.tenant,
            &options.server.controller_id,
            options.server.polling_interval,
        )?);

        // Create the channel and the engine
        let channel = Arc::new(HttpChannel::new(options.channel.clone())?);
        let engine = Arc::new(ProcessEngine::new(options.engine.clone()));

        // Create the configured state store
        let state_store: Arc<dyn StateStore> = match options.state.backend {
            StateBackend::Env => {
                let env_path = options
                    .state
                    .env_path
                    .as_ref()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| layout.state_env_file());
                Arc::new(EnvStateStore::new(env_path))
            }
            StateBackend::Noop => Arc::new(NoopStateStore),
        };

        // Surface the persisted outcome once at startup; the first check-in
        // cycle does the actual reconciliation with the server.
        match state_store.read(&options.state.key).await {
            Ok(UpdateState::NotAvailable) => {
                info!("No persisted update state found");
            }
            Ok(state) => {
                info!("Persisted update state at startup: {}", state);
            }
            Err(e) => {
                warn!("Unable to read persisted update state: {}", e);
            }
        }

        let agent = Arc::new(UpdateAgent::new(
            context.clone(),
            channel,
            engine,
            state_store,
            options.state.key.clone(),
            layout.download_dir(),
        ));

        Ok(Self { context, agent })
    }
}
