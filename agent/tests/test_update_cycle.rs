//! Check-in cycle tests against fake collaborators

mod common;

use std::sync::Arc;

use serde_json::json;

use common::{
    build_agent, build_agent_in, poll_url, temp_download_dir, MemoryStateStore, MockChannel,
    MockEngine,
};
use otagent::engine::InstallStatus;
use otagent::errors::AgentError;
use otagent::state::UpdateState;
use otagent::update::{CycleOutcome, PendingAction};

fn deployment_detail(action_id: &str, sha1: &str) -> serde_json::Value {
    json!({
        "id": action_id,
        "deployment": {
            "download": "forced",
            "update": "forced",
            "chunks": [
                {
                    "part": "os",
                    "version": "1.1.0",
                    "name": "rootfs",
                    "artifacts": [
                        {
                            "filename": "rootfs.swu",
                            "hashes": { "sha1": sha1 },
                            "size": 4,
                            "_links": {
                                "download": { "href": "http://server/download/rootfs.swu" }
                            }
                        }
                    ]
                }
            ]
        }
    })
}

#[tokio::test]
async fn test_cycle_without_pending_action() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "config": { "polling": { "sleep": "00:02:00" } }
    })));

    let agent = build_agent(channel.clone(), engine.clone(), store);
    let outcome = agent.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::NoAction);
    assert_eq!(channel.get_urls.lock().unwrap().as_slice(), [poll_url()]);
    assert!(channel.puts.lock().unwrap().is_empty());
    assert_eq!(engine.install_count(), 0);

    // The advertised interval sticks
    assert_eq!(agent.context().polling.interval().as_secs(), 120);
}

#[tokio::test]
async fn test_poll_transport_error_surfaces() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Err(AgentError::Transport("connection refused".to_string())));

    let agent = build_agent(channel, engine, store);
    let err = agent.run_cycle().await.unwrap_err();
    assert!(matches!(err, AgentError::Transport(_)));
}

#[tokio::test]
async fn test_update_link_takes_priority_over_cancel() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": {
            "deploymentBase": { "href": "http://server/deploymentBase/3" },
            "cancelAction": { "href": "http://server/cancelAction/4" }
        }
    })));

    let agent = build_agent(channel, engine, store);
    let action = agent.pending_action().await.unwrap();

    assert_eq!(
        action,
        PendingAction::Update {
            href: "http://server/deploymentBase/3".to_string()
        }
    );
}

#[tokio::test]
async fn test_cancel_is_acknowledged_with_stop_id() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "cancelAction": { "href": "http://server/cancelAction/4" } }
    })));
    channel.queue_get(Ok(json!({
        "id": "4",
        "cancelAction": { "stopId": "5" }
    })));

    let agent = build_agent(channel.clone(), engine, store);
    let outcome = agent.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Canceled);
    assert_eq!(
        channel.put_urls(),
        [format!("{}/cancelAction/5/feedback", poll_url())]
    );

    let body = &channel.put_bodies()[0];
    assert_eq!(body["id"], "5");
    assert_eq!(body["status"]["execution"], "closed");
    assert_eq!(body["status"]["result"]["finished"], "success");
}

#[tokio::test]
async fn test_unparsable_cancel_detail_still_acknowledged() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "cancelAction": { "href": "http://server/cancelAction/4" } }
    })));
    // Detail carries an id but no stopId
    channel.queue_get(Ok(json!({ "id": "4" })));

    let agent = build_agent(channel.clone(), engine, store);
    let outcome = agent.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Canceled);
    assert_eq!(
        channel.put_urls(),
        [format!("{}/cancelAction/4/feedback", poll_url())]
    );
}

#[tokio::test]
async fn test_successful_update_end_to_end() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));
    channel.queue_file(Ok("caffee".to_string()));
    engine.queue(Ok(InstallStatus::Success));

    let agent = build_agent(channel.clone(), engine.clone(), store.clone());
    let outcome = agent.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Updated);
    assert_eq!(engine.install_count(), 1);

    // Proceeding first, then the closing success report
    let urls = channel.put_urls();
    let bodies = channel.put_bodies();
    assert_eq!(urls.len(), 2);
    assert!(urls
        .iter()
        .all(|u| u == &format!("{}/deploymentBase/12/feedback", poll_url())));

    assert_eq!(bodies[0]["status"]["execution"], "proceeding");
    assert_eq!(bodies[0]["status"]["result"]["finished"], "none");

    assert_eq!(bodies[1]["status"]["execution"], "closed");
    assert_eq!(bodies[1]["status"]["result"]["finished"], "success");
    assert_eq!(bodies[1]["status"]["result"]["progress"]["cnt"], 1);
    assert_eq!(bodies[1]["status"]["result"]["progress"]["of"], 1);

    // Installed was recorded, then cleared once the server consumed it
    assert_eq!(store.saved.lock().unwrap().as_slice(), [UpdateState::Installed]);
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn test_checksum_mismatch_never_reaches_engine() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));
    channel.queue_file(Ok("deadbeef".to_string()));

    let agent = build_agent(channel.clone(), engine.clone(), store.clone());
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::Integrity(_)));
    assert_eq!(engine.install_count(), 0);

    let bodies = channel.put_bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["status"]["execution"], "closed");
    assert_eq!(bodies[1]["status"]["result"]["finished"], "failure");
    assert_eq!(bodies[1]["status"]["result"]["progress"]["cnt"], 0);

    // Failure was recorded and cleared after the report went through
    assert_eq!(store.saved.lock().unwrap().as_slice(), [UpdateState::Failed]);
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn test_failed_download_leaves_no_staged_file() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));
    // The transfer breaks off mid-stream after the file was created
    channel.queue_file(Err(AgentError::Transport("connection reset".to_string())));

    let download_dir = temp_download_dir();
    let agent = build_agent_in(channel, engine.clone(), store, download_dir.clone());
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::Transport(_)));
    assert_eq!(engine.install_count(), 0);

    // The partial download was cleaned up
    let leftovers: Vec<_> = std::fs::read_dir(&download_dir).unwrap().collect();
    assert!(leftovers.is_empty());
}

#[tokio::test]
async fn test_engine_failure_is_reported() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));
    channel.queue_file(Ok("caffee".to_string()));
    engine.queue(Ok(InstallStatus::Failure));

    let agent = build_agent(channel.clone(), engine.clone(), store.clone());
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::Install(_)));
    assert_eq!(engine.install_count(), 1);
    assert_eq!(store.saved.lock().unwrap().as_slice(), [UpdateState::Failed]);
}

#[tokio::test]
async fn test_malformed_detail_rejected_after_proceeding() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    // Artifacts given as bare strings instead of objects
    channel.queue_get(Ok(json!({
        "id": "12",
        "deployment": {
            "chunks": [
                {
                    "part": "os",
                    "version": "1.1.0",
                    "name": "rootfs",
                    "artifacts": ["CAFFEE", "DEADBEEF"]
                }
            ]
        }
    })));

    let agent = build_agent(channel.clone(), engine.clone(), store);
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::MalformedReply(_)));
    assert_eq!(engine.install_count(), 0);
    assert!(channel.file_urls.lock().unwrap().is_empty());

    let bodies = channel.put_bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["status"]["execution"], "proceeding");
    assert_eq!(bodies[1]["status"]["execution"], "closed");
    assert_eq!(bodies[1]["status"]["result"]["finished"], "failure");
}

#[tokio::test]
async fn test_empty_chunk_list_rejected_without_download() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(json!({
        "id": "12",
        "deployment": { "chunks": [] }
    })));

    let agent = build_agent(channel.clone(), engine, store);
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::MalformedReply(_)));
    assert!(channel.file_urls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_prior_installed_state_confirms_without_reinstall() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::with_state(UpdateState::Installed));

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));

    let agent = build_agent(channel.clone(), engine.clone(), store.clone());
    let outcome = agent.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Confirmed);
    assert_eq!(engine.install_count(), 0);
    assert!(channel.file_urls.lock().unwrap().is_empty());

    let bodies = channel.put_bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["status"]["execution"], "closed");
    assert_eq!(bodies[0]["status"]["result"]["finished"], "success");

    // The consumed record is cleared
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn test_prior_failed_state_reports_failure_without_reinstall() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::with_state(UpdateState::Failed));

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));

    let agent = build_agent(channel.clone(), engine.clone(), store.clone());
    let outcome = agent.run_cycle().await.unwrap();

    assert_eq!(outcome, CycleOutcome::Confirmed);
    assert_eq!(engine.install_count(), 0);

    let bodies = channel.put_bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["status"]["result"]["finished"], "failure");
    assert_eq!(store.current(), None);
}

#[tokio::test]
async fn test_failed_success_report_keeps_state_for_next_cycle() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));
    channel.queue_file(Ok("caffee".to_string()));
    engine.queue(Ok(InstallStatus::Success));

    // Proceeding goes through, the closing report does not
    channel.queue_put(Ok(()));
    channel.queue_put(Err(AgentError::Transport("connection reset".to_string())));

    let agent = build_agent(channel.clone(), engine, store.clone());
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::Transport(_)));

    // The record survives so the next check-in can re-report the outcome
    assert_eq!(store.current(), Some(UpdateState::Installed));
}

#[tokio::test]
async fn test_storage_failure_never_blocks_the_report() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());
    *store.fail_save.lock().unwrap() = true;

    channel.queue_get(Ok(json!({
        "_links": { "deploymentBase": { "href": "http://server/deploymentBase/12" } }
    })));
    channel.queue_get(Ok(deployment_detail("12", "CAFFEE")));
    channel.queue_file(Ok("caffee".to_string()));
    engine.queue(Ok(InstallStatus::Success));

    let agent = build_agent(channel.clone(), engine, store.clone());
    let err = agent.run_cycle().await.unwrap_err();

    // The cycle surfaces the storage problem, but the server still got the
    // full success report
    assert!(matches!(err, AgentError::Storage(_)));
    let bodies = channel.put_bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[1]["status"]["result"]["finished"], "success");
    assert!(store.saved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_poll_reply_is_an_error() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({ "_links": "not-an-object" })));

    let agent = build_agent(channel, engine, store);
    let err = agent.run_cycle().await.unwrap_err();
    assert!(matches!(err, AgentError::MalformedReply(_)));
}

#[tokio::test]
async fn test_malformed_polling_sleep_fails_the_cycle() {
    let channel = Arc::new(MockChannel::new());
    let engine = Arc::new(MockEngine::new());
    let store = Arc::new(MemoryStateStore::new());

    channel.queue_get(Ok(json!({
        "config": { "polling": { "sleep": "XX:00:00" } }
    })));

    let agent = build_agent(channel, engine, store);
    let err = agent.run_cycle().await.unwrap_err();

    assert!(matches!(err, AgentError::MalformedReply(_)));
    // The previous interval stays in force
    assert_eq!(agent.context().polling.interval().as_secs(), 60);
}
