//! Shared test fakes with queued replies

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use otagent::channel::Channel;
use otagent::context::ServerContext;
use otagent::engine::{ArtifactMeta, InstallEngine, InstallStatus};
use otagent::errors::AgentError;
use otagent::state::{StateStore, UpdateState};
use otagent::update::UpdateAgent;

pub const TENANT: &str = "default";
pub const CONTROLLER_ID: &str = "device7";
pub const BASE_URL: &str = "http://server";

/// Channel fake answering from queued replies and recording every call
#[derive(Default)]
pub struct MockChannel {
    get_replies: Mutex<VecDeque<Result<serde_json::Value, AgentError>>>,
    file_replies: Mutex<VecDeque<Result<String, AgentError>>>,
    put_replies: Mutex<VecDeque<Result<(), AgentError>>>,

    pub get_urls: Mutex<Vec<String>>,
    pub file_urls: Mutex<Vec<String>>,
    pub puts: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_get(&self, reply: Result<serde_json::Value, AgentError>) {
        self.get_replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_file(&self, reply: Result<String, AgentError>) {
        self.file_replies.lock().unwrap().push_back(reply);
    }

    pub fn queue_put(&self, reply: Result<(), AgentError>) {
        self.put_replies.lock().unwrap().push_back(reply);
    }

    pub fn put_bodies(&self) -> Vec<serde_json::Value> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn put_urls(&self) -> Vec<String> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn get(&self, url: &str) -> Result<serde_json::Value, AgentError> {
        self.get_urls.lock().unwrap().push(url.to_string());
        self.get_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Transport(format!("no queued reply for {}", url))))
    }

    async fn get_file(&self, url: &str, dest: &Path) -> Result<String, AgentError> {
        self.file_urls.lock().unwrap().push(url.to_string());
        let reply = self
            .file_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(AgentError::Transport(format!(
                    "no queued file reply for {}",
                    url
                )))
            });

        // The production channel creates the destination before streaming,
        // so even a failed transfer leaves a (partial) file behind.
        match &reply {
            Ok(_) => tokio::fs::write(dest, b"artifact-bytes").await?,
            Err(_) => tokio::fs::write(dest, b"artifact-").await?,
        }
        reply
    }

    async fn put(&self, url: &str, body: &serde_json::Value) -> Result<(), AgentError> {
        self.puts
            .lock()
            .unwrap()
            .push((url.to_string(), body.clone()));
        self.put_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

/// Engine fake answering from queued statuses
#[derive(Default)]
pub struct MockEngine {
    replies: Mutex<VecDeque<Result<InstallStatus, AgentError>>>,
    pub installs: Mutex<Vec<(PathBuf, String)>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&self, reply: Result<InstallStatus, AgentError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn install_count(&self) -> usize {
        self.installs.lock().unwrap().len()
    }
}

#[async_trait]
impl InstallEngine for MockEngine {
    async fn install(
        &self,
        staged: &Path,
        meta: &ArtifactMeta,
    ) -> Result<InstallStatus, AgentError> {
        self.installs
            .lock()
            .unwrap()
            .push((staged.to_path_buf(), meta.name.clone()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Install("no queued engine status".to_string())))
    }
}

/// In-memory state store with optional fault injection
#[derive(Default)]
pub struct MemoryStateStore {
    state: Mutex<Option<UpdateState>>,
    pub saved: Mutex<Vec<UpdateState>>,
    pub fail_save: Mutex<bool>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: UpdateState) -> Self {
        let store = Self::default();
        *store.state.lock().unwrap() = Some(state);
        store
    }

    pub fn current(&self) -> Option<UpdateState> {
        *self.state.lock().unwrap()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn save(&self, _key: &str, state: UpdateState) -> Result<(), AgentError> {
        if *self.fail_save.lock().unwrap() {
            return Err(AgentError::Storage("injected save failure".to_string()));
        }
        self.saved.lock().unwrap().push(state);
        *self.state.lock().unwrap() = Some(state);
        Ok(())
    }

    async fn read(&self, _key: &str) -> Result<UpdateState, AgentError> {
        Ok(self.state.lock().unwrap().unwrap_or(UpdateState::NotAvailable))
    }

    async fn reset(&self, _key: &str) -> Result<(), AgentError> {
        *self.state.lock().unwrap() = None;
        Ok(())
    }
}

/// Wire an agent against the fakes with a throwaway download directory
pub fn build_agent(
    channel: Arc<MockChannel>,
    engine: Arc<MockEngine>,
    store: Arc<MemoryStateStore>,
) -> UpdateAgent {
    build_agent_in(channel, engine, store, temp_download_dir())
}

/// Like [`build_agent`], but with a caller-owned download directory
pub fn build_agent_in(
    channel: Arc<MockChannel>,
    engine: Arc<MockEngine>,
    store: Arc<MemoryStateStore>,
    download_dir: PathBuf,
) -> UpdateAgent {
    let ctx = Arc::new(
        ServerContext::new(BASE_URL, TENANT, CONTROLLER_ID, Duration::from_secs(60)).unwrap(),
    );

    UpdateAgent::new(
        ctx,
        channel,
        engine,
        store,
        "ustate".to_string(),
        download_dir,
    )
}

pub fn temp_download_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("otagent-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn poll_url() -> String {
    format!("{}/{}/controller/v1/{}", BASE_URL, TENANT, CONTROLLER_ID)
}
