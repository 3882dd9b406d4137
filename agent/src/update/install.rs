//! Artifact download, verification and installation

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::channel::Channel;
use crate::ddi::Artifact;
use crate::engine::{ArtifactMeta, InstallEngine, InstallStatus};
use crate::errors::AgentError;

/// Download one artifact, verify its SHA-1 and hand it to the engine.
///
/// Each step is a distinct failure point; the staged file is removed once the
/// engine has finished with it, whatever the outcome.
pub async fn process_artifact(
    channel: &dyn Channel,
    engine: &dyn InstallEngine,
    download_dir: &Path,
    artifact: &Artifact,
    meta: &ArtifactMeta,
) -> Result<(), AgentError> {
    // Structural validation happens before any download, but an artifact
    // without an expected hash must never reach the engine either way.
    if artifact.hashes.sha1.is_empty() {
        return Err(AgentError::MalformedReply(format!(
            "artifact '{}' has no sha1 hash",
            artifact.filename
        )));
    }

    let staged = staging_path(download_dir, &artifact.filename)?;
    info!(
        "Downloading artifact '{}' ({} bytes) for chunk '{}'",
        artifact.filename, artifact.size, meta.name
    );

    // A transport failure can leave a partially written file behind; the
    // staging name is cycle-unique, so it must not be left for later cleanup.
    let computed = match channel.get_file(&artifact.links.download.href, &staged).await {
        Ok(computed) => computed,
        Err(e) => {
            discard(&staged).await;
            return Err(e);
        }
    };

    if !computed.eq_ignore_ascii_case(&artifact.hashes.sha1) {
        discard(&staged).await;
        return Err(AgentError::Integrity(format!(
            "artifact '{}': expected sha1 {}, transfer computed {}",
            artifact.filename, artifact.hashes.sha1, computed
        )));
    }
    debug!("Artifact '{}' checksum verified", artifact.filename);

    let result = engine.install(&staged, meta).await;
    discard(&staged).await;

    match result? {
        InstallStatus::Success => {
            info!("Artifact '{}' installed", artifact.filename);
            Ok(())
        }
        InstallStatus::Failure => Err(AgentError::Install(format!(
            "engine reported failure for artifact '{}'",
            artifact.filename
        ))),
    }
}

/// Build a cycle-unique staging path, rejecting filenames that try to escape
/// the download directory.
fn staging_path(download_dir: &Path, filename: &str) -> Result<PathBuf, AgentError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| *n != "." && *n != "..")
        .ok_or_else(|| {
            AgentError::MalformedReply(format!("unusable artifact filename '{}'", filename))
        })?;

    Ok(download_dir.join(format!("{}-{}", uuid::Uuid::new_v4(), name)))
}

async fn discard(staged: &Path) {
    if let Err(e) = fs::remove_file(staged).await {
        warn!("Cannot remove staged artifact {:?}: {}", staged, e);
    }
}
