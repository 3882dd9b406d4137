//! Wire types for the deployment server's DDI-style JSON resources
//!
//! The server drives the device through three documents: the poll reply on
//! the controller base resource, the deployment detail behind its
//! `deploymentBase` link and the cancel detail behind its `cancelAction`
//! link. The device answers with feedback messages.

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// An `href` wrapper as used throughout `_links` objects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Href {
    pub href: String,
}

// ------------------------------ poll reply ------------------------------- //

/// Check-in reply on the controller base resource
#[derive(Debug, Clone, Deserialize)]
pub struct PollReply {
    #[serde(default)]
    pub config: Option<PollConfig>,

    #[serde(rename = "_links", default)]
    pub links: Option<PollLinks>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    #[serde(default)]
    pub polling: Option<PollingSleep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingSleep {
    /// `HH:MM:SS` textual duration
    #[serde(default)]
    pub sleep: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollLinks {
    #[serde(rename = "deploymentBase", default)]
    pub deployment_base: Option<Href>,

    #[serde(rename = "cancelAction", default)]
    pub cancel_action: Option<Href>,
}

// --------------------------- deployment detail --------------------------- //

/// Deployment detail fetched from the `deploymentBase` link
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentBase {
    /// Action id the deployment belongs to
    pub id: String,

    pub deployment: DeploymentDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentDetail {
    /// Server download policy hint (e.g. "forced")
    #[serde(default)]
    pub download: Option<String>,

    /// Server update policy hint (e.g. "forced")
    #[serde(default)]
    pub update: Option<String>,

    /// Ordered software chunks; order is significant for installation
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunk {
    pub part: String,
    pub version: String,
    pub name: String,

    /// Ordered artifacts within the chunk
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    pub filename: String,

    #[serde(default)]
    pub hashes: Hashes,

    #[serde(default)]
    pub size: u64,

    #[serde(rename = "_links")]
    pub links: ArtifactLinks,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hashes {
    /// Expected SHA-1 of the artifact; mandatory for installation
    #[serde(default)]
    pub sha1: String,

    #[serde(default)]
    pub md5: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactLinks {
    pub download: Href,

    #[serde(rename = "md5sum", default)]
    pub md5sum: Option<Href>,
}

impl DeploymentBase {
    /// Decode a deployment detail document.
    ///
    /// Structural violations map to [`AgentError::MalformedReply`]; the
    /// caller still knows the action id from the raw document and can report
    /// the rejection.
    pub fn decode(value: serde_json::Value) -> Result<Self, AgentError> {
        let base: DeploymentBase = serde_json::from_value(value)
            .map_err(|e| AgentError::MalformedReply(format!("deployment detail: {}", e)))?;
        base.validate()?;
        Ok(base)
    }

    /// Structural completeness check: at least one chunk, every chunk at
    /// least one artifact, every artifact an expected SHA-1.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.deployment.chunks.is_empty() {
            return Err(AgentError::MalformedReply(
                format!("deployment {} has no chunks", self.id),
            ));
        }

        for chunk in &self.deployment.chunks {
            if chunk.artifacts.is_empty() {
                return Err(AgentError::MalformedReply(format!(
                    "chunk '{}' of deployment {} has no artifacts",
                    chunk.name, self.id
                )));
            }
            for artifact in &chunk.artifacts {
                if artifact.hashes.sha1.is_empty() {
                    return Err(AgentError::MalformedReply(format!(
                        "artifact '{}' of deployment {} has no sha1 hash",
                        artifact.filename, self.id
                    )));
                }
            }
        }

        Ok(())
    }
}

// ----------------------------- cancel detail ----------------------------- //

/// Cancel detail fetched from the `cancelAction` link
#[derive(Debug, Clone, Deserialize)]
pub struct CancelAction {
    pub id: String,

    #[serde(rename = "cancelAction")]
    pub cancel_action: CancelActionDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelActionDetail {
    /// Id of the action the server wants stopped
    #[serde(rename = "stopId")]
    pub stop_id: String,
}

// ------------------------------- feedback -------------------------------- //

/// Execution state reported in feedback messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    Closed,
    Proceeding,
    Canceled,
    Rejected,
    Scheduled,
}

/// Final result reported in feedback messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Finished {
    Success,
    Failure,
    None,
}

/// Job progress counters: `cnt` of `of` jobs done
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Progress {
    pub cnt: u32,
    pub of: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub finished: Finished,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackStatus {
    pub execution: Execution,

    pub result: FeedbackResult,

    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub details: Vec<String>,
}

/// Outcome message sent to a deployment or cancel feedback endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentFeedback {
    pub id: String,
    pub status: FeedbackStatus,
}

impl DeploymentFeedback {
    pub fn new(action_id: &str, execution: Execution, finished: Finished) -> Self {
        Self {
            id: action_id.to_string(),
            status: FeedbackStatus {
                execution,
                result: FeedbackResult {
                    finished,
                    progress: None,
                },
                details: Vec::new(),
            },
        }
    }

    pub fn with_progress(mut self, cnt: u32, of: u32) -> Self {
        self.status.result.progress = Some(Progress { cnt, of });
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.status.details.push(detail.into());
        self
    }

    /// Minimal acknowledgement for a cancel action
    pub fn cancel_ack(action_id: &str) -> Self {
        Self::new(action_id, Execution::Closed, Finished::Success)
    }
}
