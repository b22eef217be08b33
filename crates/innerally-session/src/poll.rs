use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use innerally_core::assistant::{AssistantService, RunStatus};
use innerally_core::config::{AppConfig, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT};
use innerally_core::ids::{RunId, ThreadId};

use crate::error::TurnError;

/// How often and for how long a run is polled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

impl PollPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            interval: config.poll_interval,
            timeout: config.poll_timeout,
        }
    }
}

/// Poll a run until it completes. Returns the number of status checks made.
///
/// The first check is immediate; later ones are `interval` apart. Ends with
/// `RunFailed` on a failed run, `PollingTimedOut` once `timeout` has elapsed,
/// and `Cancelled` as soon as `cancel` fires.
#[instrument(skip(service, policy, cancel), fields(thread_id = %thread, run_id = %run))]
pub async fn wait_for_completion(
    service: &dyn AssistantService,
    thread: &ThreadId,
    run: &RunId,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<u32, TurnError> {
    let poll = async {
        let mut checks = 0u32;
        loop {
            checks += 1;
            match service.run_status(thread, run).await {
                Ok(RunStatus::Completed) => return Ok(checks),
                Ok(RunStatus::Failed { reason }) => return Err(TurnError::RunFailed { reason }),
                Ok(RunStatus::Pending) => debug!(checks, "run pending"),
                Err(e) => return Err(TurnError::PollFailed(e)),
            }
            tokio::time::sleep(policy.interval).await;
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TurnError::Cancelled),
        outcome = tokio::time::timeout(policy.timeout, poll) => {
            outcome.unwrap_or(Err(TurnError::PollingTimedOut(policy.timeout)))
        }
    }
}
