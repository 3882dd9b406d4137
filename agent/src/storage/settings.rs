//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::state::{StateBackend, DEFAULT_STATE_KEY};

/// Agent settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Deployment server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Fallback polling interval in seconds, used until the server
    /// advertises one
    #[serde(default = "default_polling_interval")]
    pub polling_interval_secs: u64,

    /// Persisted update-state configuration
    #[serde(default)]
    pub state: StateSettings,

    /// Installation engine configuration
    #[serde(default)]
    pub engine: EngineSettings,
}

fn default_polling_interval() -> u64 {
    300
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            server: ServerSettings::default(),
            polling_interval_secs: default_polling_interval(),
            state: StateSettings::default(),
            engine: EngineSettings::default(),
        }
    }
}

/// Deployment server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Server base URL
    #[serde(default = "default_server_url")]
    pub base_url: String,

    /// Tenant the device belongs to
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Controller id the device checks in as
    #[serde(default)]
    pub controller_id: String,

    /// Optional target token for the authorization header
    #[serde(default)]
    pub target_token: Option<String>,
}

fn default_server_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_tenant() -> String {
    "default".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            base_url: default_server_url(),
            tenant: default_tenant(),
            controller_id: String::new(),
            target_token: None,
        }
    }
}

/// Persisted update-state settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSettings {
    /// Backend selection: "env" or "none"
    #[serde(default)]
    pub backend: StateBackend,

    /// Storage key for the update-state record
    #[serde(default = "default_state_key")]
    pub key: String,

    /// Override for the environment file path; the storage layout default
    /// is used when absent
    #[serde(default)]
    pub env_path: Option<String>,
}

fn default_state_key() -> String {
    DEFAULT_STATE_KEY.to_string()
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            backend: StateBackend::default(),
            key: default_state_key(),
            env_path: None,
        }
    }
}

/// Installation engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Installer command handed each staged artifact
    #[serde(default = "default_engine_command")]
    pub command: String,

    /// Fixed arguments placed before the artifact path
    #[serde(default)]
    pub args: Vec<String>,

    /// Optional bound in seconds on the engine completion wait; absent
    /// means waiting forever
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_engine_command() -> String {
    "swupdate-client".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
            timeout_secs: None,
        }
    }
}
