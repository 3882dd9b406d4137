//! Persisted update state
//!
//! A single crash-survivable record of the last update outcome, shared with
//! the bootloader's environment so rollback/confirmation decisions survive a
//! reboot mid-update. The agent is the sole writer.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AgentError;

pub mod env;
pub mod noop;

/// Which state store backend to construct at startup.
///
/// A deployment-time configuration choice; the update logic never branches
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    /// Persist into the bootloader-style environment file
    #[default]
    Env,

    /// Track nothing
    #[serde(rename = "none")]
    Noop,
}

/// Storage key used when the configured key is empty.
///
/// An empty key would corrupt the underlying environment storage, so it is
/// replaced rather than rejected.
pub const DEFAULT_STATE_KEY: &str = "ustate";

/// Last known update outcome, encoded on storage as one discriminant byte.
///
/// The vocabulary is fixed; `InProgress` is reserved for installs that stage
/// across multiple boots and is currently only read, never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    /// Update applied and confirmed
    Ok,

    /// Update applied, confirmation pending until after reboot
    Installed,

    /// Boot into the new software is being tested by the bootloader
    Testing,

    /// Last update attempt failed
    Failed,

    /// No prior record
    NotAvailable,

    /// An install attempt was underway when the record was written
    InProgress,
}

impl UpdateState {
    /// Encode as the single storage discriminant byte
    pub fn to_byte(self) -> u8 {
        match self {
            UpdateState::Ok => b'0',
            UpdateState::Installed => b'1',
            UpdateState::Testing => b'2',
            UpdateState::Failed => b'3',
            UpdateState::NotAvailable => b'4',
            UpdateState::InProgress => b'7',
        }
    }

    /// Decode a storage discriminant byte.
    ///
    /// Unrecognized bytes are a storage error, never silently aliased to a
    /// valid state.
    pub fn from_byte(byte: u8) -> Result<Self, AgentError> {
        match byte {
            b'0' => Ok(UpdateState::Ok),
            b'1' => Ok(UpdateState::Installed),
            b'2' => Ok(UpdateState::Testing),
            b'3' => Ok(UpdateState::Failed),
            b'4' => Ok(UpdateState::NotAvailable),
            b'7' => Ok(UpdateState::InProgress),
            other => Err(AgentError::Storage(format!(
                "unrecognized update state byte {:#04x}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for UpdateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            UpdateState::Ok => "ok",
            UpdateState::Installed => "installed",
            UpdateState::Testing => "testing",
            UpdateState::Failed => "failed",
            UpdateState::NotAvailable => "not-available",
            UpdateState::InProgress => "in-progress",
        };
        f.write_str(name)
    }
}

/// Durable key/value record of the last update outcome.
///
/// Backends are selected once at process construction; the update logic only
/// sees this trait.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Persist `state` under `key`
    async fn save(&self, key: &str, state: UpdateState) -> Result<(), AgentError>;

    /// Read the state under `key`; an absent record is `NotAvailable`, not an
    /// error
    async fn read(&self, key: &str) -> Result<UpdateState, AgentError>;

    /// Clear the record by writing an empty value for `key`
    async fn reset(&self, key: &str) -> Result<(), AgentError>;
}

/// Replace an empty key with [`DEFAULT_STATE_KEY`], with a warning
pub(crate) fn effective_key(key: &str) -> &str {
    if key.is_empty() {
        warn!(
            "Update state storage key is empty, using '{}'",
            DEFAULT_STATE_KEY
        );
        DEFAULT_STATE_KEY
    } else {
        key
    }
}
