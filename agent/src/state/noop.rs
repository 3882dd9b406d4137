//! No-op state store backend
//!
//! Used when persistent update-state tracking is disabled in the settings.
//! Never fails; reads always report that no prior record exists.

use async_trait::async_trait;

use crate::errors::AgentError;
use crate::state::{StateStore, UpdateState};

/// State store that records nothing
#[derive(Debug, Clone, Default)]
pub struct NoopStateStore;

#[async_trait]
impl StateStore for NoopStateStore {
    async fn save(&self, _key: &str, _state: UpdateState) -> Result<(), AgentError> {
        Ok(())
    }

    async fn read(&self, _key: &str) -> Result<UpdateState, AgentError> {
        Ok(UpdateState::NotAvailable)
    }

    async fn reset(&self, _key: &str) -> Result<(), AgentError> {
        Ok(())
    }
}
