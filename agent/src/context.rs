//! Server connection context
//!
//! One explicit context value is constructed at startup and shared by every
//! component that talks to the deployment server. The polling interval is the
//! only mutable part; the server rewrites it through check-in replies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;
use url::Url;

use crate::ddi::PollReply;
use crate::errors::AgentError;

/// Immutable identity of the device against the deployment server, plus the
/// server-controlled polling configuration.
#[derive(Debug)]
pub struct ServerContext {
    base_url: String,
    tenant: String,
    controller_id: String,

    /// Check-in interval, rewritten by poll replies
    pub polling: PollingConfig,
}

impl ServerContext {
    /// Create a new context. The base URL must be a valid absolute URL.
    pub fn new(
        base_url: &str,
        tenant: &str,
        controller_id: &str,
        fallback_interval: Duration,
    ) -> Result<Self, AgentError> {
        Url::parse(base_url)
            .map_err(|e| AgentError::Config(format!("invalid server URL '{}': {}", base_url, e)))?;
        if tenant.is_empty() || controller_id.is_empty() {
            return Err(AgentError::Config(
                "tenant and controller id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tenant: tenant.to_string(),
            controller_id: controller_id.to_string(),
            polling: PollingConfig::new(fallback_interval),
        })
    }

    pub fn controller_id(&self) -> &str {
        &self.controller_id
    }

    /// The controller base resource polled on every check-in
    pub fn poll_url(&self) -> String {
        format!(
            "{}/{}/controller/v1/{}",
            self.base_url, self.tenant, self.controller_id
        )
    }

    /// Feedback endpoint for a deployment action
    pub fn deployment_feedback_url(&self, action_id: &str) -> String {
        format!("{}/deploymentBase/{}/feedback", self.poll_url(), action_id)
    }

    /// Feedback endpoint for a cancel action
    pub fn cancel_feedback_url(&self, action_id: &str) -> String {
        format!("{}/cancelAction/{}/feedback", self.poll_url(), action_id)
    }
}

/// Server-advertised check-in interval.
///
/// Mutated only through [`PollingConfig::apply`]; everything else reads.
#[derive(Debug)]
pub struct PollingConfig {
    interval_secs: AtomicU64,
}

impl PollingConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_secs: AtomicU64::new(interval.as_secs()),
        }
    }

    /// Current check-in interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.load(Ordering::SeqCst))
    }

    /// Apply the polling hint from a check-in reply, if one is present.
    ///
    /// A reply without a `config.polling.sleep` node leaves the interval
    /// untouched. A malformed sleep value is a malformed-reply error and also
    /// leaves the previous interval untouched.
    pub fn apply(&self, reply: &PollReply) -> Result<(), AgentError> {
        let sleep = reply
            .config
            .as_ref()
            .and_then(|c| c.polling.as_ref())
            .and_then(|p| p.sleep.as_deref());

        let Some(sleep) = sleep else {
            return Ok(());
        };

        let secs = parse_polling_sleep(sleep)?;
        self.interval_secs.store(secs, Ordering::SeqCst);
        info!("Server set polling interval to {}s", secs);
        Ok(())
    }
}

/// Parse a fixed `HH:MM:SS` sleep duration into total seconds.
pub fn parse_polling_sleep(sleep: &str) -> Result<u64, AgentError> {
    let malformed = || AgentError::MalformedReply(format!("invalid polling sleep '{}'", sleep));

    let mut fields = [0u64; 3];
    let parts: Vec<&str> = sleep.split(':').collect();
    if parts.len() != 3 {
        return Err(malformed());
    }

    for (slot, part) in fields.iter_mut().zip(&parts) {
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        *slot = part.parse().map_err(|_| malformed())?;
    }

    let [hours, minutes, seconds] = fields;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(malformed());
    }

    Ok(hours * 3600 + minutes * 60 + seconds)
}
