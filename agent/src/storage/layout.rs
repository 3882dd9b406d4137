//! Storage layout configuration

use std::path::PathBuf;

use tokio::fs;

use crate::filesys::file::File;

/// Storage layout for the agent
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the artifact download directory
    pub fn download_dir(&self) -> PathBuf {
        self.base_dir.join("downloads")
    }

    /// Default path of the update-state environment file
    pub fn state_env_file(&self) -> PathBuf {
        self.base_dir.join("state.env")
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::AgentError> {
        fs::create_dir_all(&self.base_dir).await?;
        fs::create_dir_all(self.download_dir()).await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Use /var/lib/otagent on Linux, or user home directory elsewhere
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/otagent");

        #[cfg(not(target_os = "linux"))]
        let base_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".otagent");

        Self::new(base_dir)
    }
}

#[cfg(not(target_os = "linux"))]
mod dirs {
    use std::path::PathBuf;

    pub fn home_dir() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
    }
}
