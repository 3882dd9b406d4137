//! Application configuration options

use std::time::Duration;

use crate::channel::http;
use crate::engine::process;
use crate::state::StateBackend;
use crate::storage::layout::StorageLayout;
use crate::workers::poller;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Deployment server configuration
    pub server: ServerOptions,

    /// HTTP channel options
    pub channel: http::Options,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Update-state store configuration
    pub state: StateOptions,

    /// Installation engine options
    pub engine: process::Options,

    /// Poller worker options
    pub poller: poller::Options,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions::default(),
            channel: http::Options::default(),
            storage: StorageOptions::default(),
            state: StateOptions::default(),
            engine: process::Options::default(),
            poller: poller::Options::default(),
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Deployment server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Server base URL
    pub base_url: String,

    /// Tenant the device checks in under
    pub tenant: String,

    /// Controller id the device checks in as
    pub controller_id: String,

    /// Fallback polling interval, used until the server advertises one
    pub polling_interval: Duration,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            tenant: "default".to_string(),
            controller_id: String::new(),
            polling_interval: Duration::from_secs(300),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            layout: StorageLayout::default(),
        }
    }
}

/// Update-state store options
#[derive(Debug, Clone)]
pub struct StateOptions {
    /// Backend selection
    pub backend: StateBackend,

    /// Storage key for the update-state record
    pub key: String,

    /// Override for the environment file path; the storage layout default is
    /// used when absent
    pub env_path: Option<String>,
}

impl Default for StateOptions {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            key: crate::state::DEFAULT_STATE_KEY.to_string(),
            env_path: None,
        }
    }
}
