//! Environment-file state store backend
//!
//! Persists the update state into a bootloader-style environment file of
//! `key=value` lines. Every operation is a scoped open → operate → close:
//! open parses the file, close rewrites it atomically, and a failure of
//! either step is a storage-access error.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::AgentError;
use crate::filesys::file::File;
use crate::state::{effective_key, StateStore, UpdateState};

/// State store backed by an environment file shared with the bootloader
#[derive(Debug, Clone)]
pub struct EnvStateStore {
    env_file: File,
}

/// Parsed environment held between open and close
struct EnvHandle {
    entries: BTreeMap<String, String>,
}

impl EnvStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            env_file: File::new(path),
        }
    }

    /// Open the environment: read and parse the backing file.
    ///
    /// A missing file is an empty environment, not an error.
    async fn open(&self) -> Result<EnvHandle, AgentError> {
        if !self.env_file.exists().await {
            return Ok(EnvHandle {
                entries: BTreeMap::new(),
            });
        }

        let contents = self.env_file.read_string().await.map_err(|e| {
            AgentError::Storage(format!(
                "cannot open environment {:?}: {}",
                self.env_file.path(),
                e
            ))
        })?;

        let mut entries = BTreeMap::new();
        for line in contents.lines() {
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(AgentError::Storage(format!(
                    "corrupt environment line in {:?}: '{}'",
                    self.env_file.path(),
                    line
                )));
            };
            entries.insert(key.to_string(), value.to_string());
        }

        Ok(EnvHandle { entries })
    }

    /// Close the environment: rewrite the backing file atomically
    async fn close(&self, handle: EnvHandle) -> Result<(), AgentError> {
        let mut contents = String::new();
        for (key, value) in &handle.entries {
            contents.push_str(key);
            contents.push('=');
            contents.push_str(value);
            contents.push('\n');
        }

        self.env_file
            .write_atomic(contents.as_bytes())
            .await
            .map_err(|e| {
                AgentError::Storage(format!(
                    "cannot write environment {:?}: {}",
                    self.env_file.path(),
                    e
                ))
            })
    }
}

#[async_trait]
impl StateStore for EnvStateStore {
    async fn save(&self, key: &str, state: UpdateState) -> Result<(), AgentError> {
        let key = effective_key(key);
        let mut handle = self.open().await?;

        debug!("Persisting update state '{}' under key '{}'", state, key);
        handle
            .entries
            .insert(key.to_string(), (state.to_byte() as char).to_string());

        self.close(handle).await
    }

    async fn read(&self, key: &str) -> Result<UpdateState, AgentError> {
        let key = effective_key(key);
        let handle = self.open().await?;

        // Open only reads; there is nothing to release on this path.
        match handle.entries.get(key).map(String::as_str) {
            None | Some("") => Ok(UpdateState::NotAvailable),
            Some(value) => {
                if value.len() != 1 {
                    return Err(AgentError::Storage(format!(
                        "update state value '{}' under key '{}' is not a single byte",
                        value, key
                    )));
                }
                UpdateState::from_byte(value.as_bytes()[0])
            }
        }
    }

    async fn reset(&self, key: &str) -> Result<(), AgentError> {
        let key = effective_key(key);
        let mut handle = self.open().await?;

        debug!("Resetting update state under key '{}'", key);
        handle.entries.insert(key.to_string(), String::new());

        self.close(handle).await
    }
}
