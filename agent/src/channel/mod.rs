//! Server channel capability
//!
//! The update logic never talks HTTP directly; it consumes this trait. The
//! production binding is [`http::HttpChannel`], tests inject fakes with
//! queued replies.

use std::path::Path;

use async_trait::async_trait;

use crate::errors::AgentError;

pub mod http;

/// Transport operations against the deployment server.
///
/// Every operation returns a definite success or failure, never a partial
/// result. Retrying is the caller's concern.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Fetch and parse a JSON document
    async fn get(&self, url: &str) -> Result<serde_json::Value, AgentError>;

    /// Stream a file to `dest`, returning the hex SHA-1 computed during the
    /// transfer
    async fn get_file(&self, url: &str, dest: &Path) -> Result<String, AgentError>;

    /// Send a JSON message
    async fn put(&self, url: &str, body: &serde_json::Value) -> Result<(), AgentError>;
}
