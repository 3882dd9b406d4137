//! Installation engine capability
//!
//! The engine unpacks and applies a staged artifact; the agent only submits
//! work and awaits the terminal status. The production binding runs a
//! configured external installer command.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::AgentError;

pub mod process;

/// Terminal status reported by the installation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStatus {
    Success,
    Failure,
}

/// Context handed to the engine alongside the staged artifact
#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    /// Chunk part the artifact belongs to (e.g. "os", "app")
    pub part: String,

    /// Chunk software version
    pub version: String,

    /// Chunk name
    pub name: String,

    /// Server update policy hint, when advertised
    pub mode: Option<String>,
}

/// Engine that applies staged artifacts.
///
/// `install` blocks until the engine signals a terminal status; a failure to
/// run the engine at all is an error, a clean "the update did not apply" is
/// `InstallStatus::Failure`.
#[async_trait]
pub trait InstallEngine: Send + Sync {
    async fn install(&self, staged: &Path, meta: &ArtifactMeta)
        -> Result<InstallStatus, AgentError>;
}
