//! Check-in cycle orchestration

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::channel::Channel;
use crate::context::ServerContext;
use crate::ddi::{
    CancelAction, DeploymentBase, DeploymentFeedback, Execution, Finished, PollReply,
};
use crate::engine::{ArtifactMeta, InstallEngine};
use crate::errors::AgentError;
use crate::state::{StateStore, UpdateState};
use crate::update::{install, CycleOutcome, PendingAction};

/// Orchestrates one check-in cycle at a time.
///
/// All collaborators are injected behind traits; production wiring binds the
/// HTTP channel, the process engine and the configured state store.
pub struct UpdateAgent {
    ctx: Arc<ServerContext>,
    channel: Arc<dyn Channel>,
    engine: Arc<dyn InstallEngine>,
    state_store: Arc<dyn StateStore>,
    state_key: String,
    download_dir: PathBuf,
}

impl UpdateAgent {
    pub fn new(
        ctx: Arc<ServerContext>,
        channel: Arc<dyn Channel>,
        engine: Arc<dyn InstallEngine>,
        state_store: Arc<dyn StateStore>,
        state_key: String,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            ctx,
            channel,
            engine,
            state_store,
            state_key,
            download_dir,
        }
    }

    pub fn context(&self) -> &ServerContext {
        &self.ctx
    }

    /// Run one full check-in cycle: poll, classify, act, report.
    ///
    /// Cycles never overlap; the caller awaits completion before scheduling
    /// the next tick. Nothing here is fatal to the process: a failed cycle
    /// is retried by the next scheduled check-in.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, AgentError> {
        match self.pending_action().await? {
            PendingAction::None => {
                debug!("No pending action");
                Ok(CycleOutcome::NoAction)
            }
            PendingAction::Cancel { action_id } => {
                // Acknowledged unconditionally; there is at most one
                // outstanding deployment and cycles are serialized, so
                // nothing is actually in flight to stop.
                self.send_cancel_feedback(&action_id).await?;
                info!("Acknowledged cancellation of action {}", action_id);
                Ok(CycleOutcome::Canceled)
            }
            PendingAction::Update { href } => self.install_update(&href).await,
        }
    }

    /// Poll the controller base resource and classify the pending action.
    ///
    /// Polling-interval hints are applied whether or not an action is
    /// pending. Transport errors surface immediately; the next scheduled
    /// check-in is the retry mechanism.
    pub async fn pending_action(&self) -> Result<PendingAction, AgentError> {
        let value = self.channel.get(&self.ctx.poll_url()).await?;
        let reply: PollReply = serde_json::from_value(value)
            .map_err(|e| AgentError::MalformedReply(format!("check-in reply: {}", e)))?;

        self.ctx.polling.apply(&reply)?;

        let Some(links) = reply.links else {
            return Ok(PendingAction::None);
        };

        if let Some(base) = links.deployment_base {
            debug!("Server advertises deployment at {}", base.href);
            return Ok(PendingAction::Update { href: base.href });
        }

        if let Some(cancel) = links.cancel_action {
            debug!("Server advertises cancellation at {}", cancel.href);
            return self.classify_cancel(&cancel.href).await;
        }

        Ok(PendingAction::None)
    }

    /// Fetch the cancel detail to learn which action to stop.
    ///
    /// A detail that cannot be parsed must not leave the cancellation
    /// dangling, so the best available id is used for the acknowledgement.
    async fn classify_cancel(&self, href: &str) -> Result<PendingAction, AgentError> {
        let value = self.channel.get(href).await?;

        match serde_json::from_value::<CancelAction>(value.clone()) {
            Ok(cancel) => Ok(PendingAction::Cancel {
                action_id: cancel.cancel_action.stop_id,
            }),
            Err(e) => {
                warn!("Cannot parse cancel detail: {}", e);
                let fallback = value
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
                    .or_else(|| {
                        href.rsplit('/')
                            .next()
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                    });

                match fallback {
                    Some(action_id) => Ok(PendingAction::Cancel { action_id }),
                    None => {
                        warn!("No action id derivable from cancel detail, skipping");
                        Ok(PendingAction::None)
                    }
                }
            }
        }
    }

    /// Fetch, validate, install and report one advertised deployment.
    pub async fn install_update(&self, href: &str) -> Result<CycleOutcome, AgentError> {
        let value = self.channel.get(href).await?;
        let action_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AgentError::MalformedReply("deployment detail has no action id".to_string())
            })?
            .to_string();
        info!("Processing deployment action {}", action_id);

        // A surviving pre-reboot record means this action already ran to a
        // conclusion; re-report it instead of reinstalling.
        match self.prior_state().await {
            UpdateState::Installed => {
                info!("Prior update concluded before restart, confirming success");
                let feedback =
                    DeploymentFeedback::new(&action_id, Execution::Closed, Finished::Success)
                        .with_detail("software update already applied, confirming after restart");
                self.send_deployment_feedback(&feedback).await?;
                self.reset_state().await;
                return Ok(CycleOutcome::Confirmed);
            }
            UpdateState::Failed => {
                info!("Prior update failed before restart, reporting failure");
                let feedback =
                    DeploymentFeedback::new(&action_id, Execution::Closed, Finished::Failure)
                        .with_detail("software update failed before restart");
                self.send_deployment_feedback(&feedback).await?;
                self.reset_state().await;
                return Ok(CycleOutcome::Confirmed);
            }
            UpdateState::Testing | UpdateState::InProgress => {
                info!("Prior update never concluded, reinstalling");
            }
            UpdateState::NotAvailable | UpdateState::Ok => {}
        }

        // Tell the server the action is being worked on before any download.
        let proceeding =
            DeploymentFeedback::new(&action_id, Execution::Proceeding, Finished::None);
        self.send_deployment_feedback(&proceeding).await?;

        let base = match DeploymentBase::decode(value) {
            Ok(base) => base,
            Err(e) => {
                // Malformed input: reject the action without contacting the
                // installer.
                error!("Rejecting deployment {}: {}", action_id, e);
                let feedback =
                    DeploymentFeedback::new(&action_id, Execution::Closed, Finished::Failure)
                        .with_detail(e.to_string());
                if let Err(send_err) = self.send_deployment_feedback(&feedback).await {
                    error!("Cannot send rejection report: {}", send_err);
                }
                return Err(e);
            }
        };

        let total: u32 = base
            .deployment
            .chunks
            .iter()
            .map(|c| c.artifacts.len() as u32)
            .sum();
        let mut completed = 0u32;

        for chunk in &base.deployment.chunks {
            let meta = ArtifactMeta {
                part: chunk.part.clone(),
                version: chunk.version.clone(),
                name: chunk.name.clone(),
                mode: base.deployment.update.clone(),
            };

            for artifact in &chunk.artifacts {
                let result = install::process_artifact(
                    self.channel.as_ref(),
                    self.engine.as_ref(),
                    &self.download_dir,
                    artifact,
                    &meta,
                )
                .await;

                match result {
                    Ok(()) => completed += 1,
                    Err(e) => {
                        // First failure aborts the remaining artifacts; no
                        // best-effort partial install.
                        error!(
                            "Deployment {} failed at artifact {}/{}: {}",
                            action_id,
                            completed + 1,
                            total,
                            e
                        );
                        return Err(self.conclude_failure(&action_id, completed, total, e).await);
                    }
                }
            }
        }

        self.conclude_success(&action_id, total).await
    }

    /// Record and report a fully successful install.
    ///
    /// Persisting `Installed` happens before the report; a storage error is
    /// surfaced as the cycle result but never blocks the report attempt.
    async fn conclude_success(
        &self,
        action_id: &str,
        total: u32,
    ) -> Result<CycleOutcome, AgentError> {
        let storage_err = self
            .state_store
            .save(&self.state_key, UpdateState::Installed)
            .await
            .err();
        if let Some(e) = &storage_err {
            error!("Cannot persist update state: {}", e);
        }

        let feedback = DeploymentFeedback::new(action_id, Execution::Closed, Finished::Success)
            .with_progress(total, total)
            .with_detail("all artifacts installed");
        self.send_deployment_feedback(&feedback).await?;
        info!("Deployment {} installed and reported", action_id);

        match storage_err {
            // The outcome has been consumed by the server; clear the record.
            None => {
                self.reset_state().await;
                Ok(CycleOutcome::Updated)
            }
            Some(e) => Err(e),
        }
    }

    /// Record and report a failed install attempt, then hand back the
    /// original error.
    async fn conclude_failure(
        &self,
        action_id: &str,
        completed: u32,
        total: u32,
        error: AgentError,
    ) -> AgentError {
        if let Err(e) = self
            .state_store
            .save(&self.state_key, UpdateState::Failed)
            .await
        {
            error!("Cannot persist update state: {}", e);
        }

        let feedback = DeploymentFeedback::new(action_id, Execution::Closed, Finished::Failure)
            .with_progress(completed, total)
            .with_detail(error.to_string());
        match self.send_deployment_feedback(&feedback).await {
            Ok(()) => self.reset_state().await,
            Err(send_err) => error!("Cannot send failure report: {}", send_err),
        }

        error
    }

    /// Send a deployment outcome message.
    ///
    /// No retry here: a caller-level retry must resend this exact message.
    pub async fn send_deployment_feedback(
        &self,
        feedback: &DeploymentFeedback,
    ) -> Result<(), AgentError> {
        let url = self.ctx.deployment_feedback_url(&feedback.id);
        let body = serde_json::to_value(feedback)?;
        self.channel.put(&url, &body).await
    }

    /// Send the minimal acknowledgement for a cancel action
    pub async fn send_cancel_feedback(&self, action_id: &str) -> Result<(), AgentError> {
        let url = self.ctx.cancel_feedback_url(action_id);
        let body = serde_json::to_value(DeploymentFeedback::cancel_ack(action_id))?;
        self.channel.put(&url, &body).await
    }

    async fn prior_state(&self) -> UpdateState {
        match self.state_store.read(&self.state_key).await {
            Ok(state) => state,
            Err(e) => {
                error!("Cannot read persisted update state: {}", e);
                UpdateState::NotAvailable
            }
        }
    }

    async fn reset_state(&self) {
        if let Err(e) = self.state_store.reset(&self.state_key).await {
            error!("Cannot reset persisted update state: {}", e);
        }
    }
}
