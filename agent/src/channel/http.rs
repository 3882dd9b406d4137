//! HTTP channel implementation

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use sha1::{Digest, Sha1};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use crate::channel::Channel;
use crate::errors::AgentError;
use crate::utils::hex;

/// HTTP channel options
#[derive(Debug, Clone)]
pub struct Options {
    /// Request timeout for JSON exchanges
    pub request_timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Target token sent as authorization header, if configured on the server
    pub target_token: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            target_token: None,
        }
    }
}

/// Channel backed by an HTTP client
pub struct HttpChannel {
    client: Client,
    request_timeout: Duration,
    target_token: Option<String>,
}

impl HttpChannel {
    /// Create a new HTTP channel
    pub fn new(options: Options) -> Result<Self, AgentError> {
        // No total timeout on the client itself: artifact downloads may run
        // long. JSON exchanges set their own timeout per request.
        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            request_timeout: options.request_timeout,
            target_token: options.target_token,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.target_token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("TargetToken {}", token),
            ),
            None => request,
        }
    }

    async fn check_status(response: Response, verb: &str, url: &str) -> Result<Response, AgentError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} {} failed: {} - {}", verb, url, status, body);
            return Err(AgentError::Transport(format!("{} {}: {}", verb, url, status)));
        }
        Ok(response)
    }
}

#[async_trait]
impl Channel for HttpChannel {
    async fn get(&self, url: &str) -> Result<serde_json::Value, AgentError> {
        debug!("GET {}", url);

        let request = self
            .authorize(self.client.get(url))
            .header(header::ACCEPT, "application/json")
            .timeout(self.request_timeout);
        let response = Self::check_status(request.send().await?, "GET", url).await?;

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| AgentError::MalformedReply(format!("{}: {}", url, e)))
    }

    async fn get_file(&self, url: &str, dest: &Path) -> Result<String, AgentError> {
        debug!("GET {} -> {:?}", url, dest);

        let request = self.authorize(self.client.get(url));
        let mut response = Self::check_status(request.send().await?, "GET", url).await?;

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(dest).await?;
        let mut hasher = Sha1::new();

        while let Some(chunk) = response.chunk().await? {
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }
        file.sync_all().await?;

        Ok(hex::encode(hasher.finalize()))
    }

    async fn put(&self, url: &str, body: &serde_json::Value) -> Result<(), AgentError> {
        debug!("POST {}", url);

        let request = self
            .authorize(self.client.post(url))
            .json(body)
            .timeout(self.request_timeout);
        Self::check_status(request.send().await?, "POST", url).await?;
        Ok(())
    }
}
