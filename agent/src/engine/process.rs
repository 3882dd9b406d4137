//! External-command installation engine

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::engine::{ArtifactMeta, InstallEngine, InstallStatus};
use crate::errors::AgentError;

/// Process engine options
#[derive(Debug, Clone)]
pub struct Options {
    /// Installer command to run
    pub command: String,

    /// Fixed arguments placed before the staged artifact path
    pub args: Vec<String>,

    /// Optional bound on the completion wait; absent means waiting forever
    pub timeout: Option<Duration>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            command: "swupdate-client".to_string(),
            args: Vec::new(),
            timeout: None,
        }
    }
}

/// Engine that hands artifacts to an external installer process and awaits
/// its exit status
pub struct ProcessEngine {
    options: Options,
}

impl ProcessEngine {
    pub fn new(options: Options) -> Self {
        Self { options }
    }
}

#[async_trait]
impl InstallEngine for ProcessEngine {
    async fn install(
        &self,
        staged: &Path,
        meta: &ArtifactMeta,
    ) -> Result<InstallStatus, AgentError> {
        info!(
            "Installing '{}' ({} {}) via {}",
            staged.display(),
            meta.name,
            meta.version,
            self.options.command
        );

        let mut command = Command::new(&self.options.command);
        command.args(&self.options.args).arg(staged);

        let wait = command.status();
        let status = match self.options.timeout {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                warn!("Installer did not complete within {:?}", timeout);
                AgentError::Install(format!(
                    "installer '{}' timed out after {:?}",
                    self.options.command, timeout
                ))
            })?,
            None => wait.await,
        };

        let status = status.map_err(|e| {
            AgentError::Install(format!(
                "cannot run installer '{}': {}",
                self.options.command, e
            ))
        })?;

        debug!("Installer exited with {}", status);
        if status.success() {
            Ok(InstallStatus::Success)
        } else {
            Ok(InstallStatus::Failure)
        }
    }
}
