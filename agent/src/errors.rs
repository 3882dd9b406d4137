//! Error types for the otagent agent

use thiserror::Error;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed server reply: {0}")]
    MalformedReply(String),

    #[error("artifact integrity error: {0}")]
    Integrity(String),

    #[error("install failure: {0}")]
    Install(String),

    #[error("state storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("shutdown error: {0}")]
    Shutdown(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        AgentError::Transport(err.to_string())
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}
