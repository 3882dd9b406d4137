//! Polling worker driving the check-in cycles

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::update::{CycleOutcome, UpdateAgent};

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Initial delay before the first check-in
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
        }
    }
}

/// Run the poller worker.
///
/// Each cycle runs to completion before the next tick is scheduled; the
/// sleep duration is re-read every iteration because the server rewrites the
/// polling interval through check-in replies.
pub async fn run<S, F>(
    options: &Options,
    agent: &UpdateAgent,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Poller worker starting...");

    // Initial delay
    sleep_fn(options.initial_delay).await;

    loop {
        debug!("Checking in with deployment server...");

        match agent.run_cycle().await {
            Ok(CycleOutcome::NoAction) => {
                debug!("Check-in complete, no pending action");
            }
            Ok(outcome) => {
                info!("Check-in complete: {:?}", outcome);
            }
            Err(e) => {
                // Failed cycles are retried by the next scheduled check-in.
                error!("Check-in cycle failed: {}", e);
            }
        }

        // Check for shutdown
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            _ = sleep_fn(agent.context().polling.interval()) => {
                // Continue with the next check-in
            }
        }
    }
}
