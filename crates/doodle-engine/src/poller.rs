use std::time::Duration;

use doodle_contracts::{ErrorKind, GenerationError, ImageReference};
use tokio_util::sync::CancellationToken;

use crate::config::ProviderConfig;
use crate::providers::{PendingTask, ProviderAdapter, TaskStatus};

/// How one poll attempt ended, reported to the caller's observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollReport {
    StillPending,
    Complete,
    Failed,
    TransientError,
    Error,
}

impl PollReport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StillPending => "pending",
            Self::Complete => "complete",
            Self::Failed => "failed",
            Self::TransientError => "transient_error",
            Self::Error => "error",
        }
    }
}

/// Drives a [`PendingTask`] to a terminal state with a fixed inter-poll delay.
///
/// The delay is a tokio sleep, so a waiting request suspends instead of
/// holding a worker thread. At most `max_attempts` status checks are issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    max_attempts: u32,
}

impl Poller {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.poll_interval, config.max_poll_attempts)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn wait(
        &self,
        adapter: &dyn ProviderAdapter,
        task: &PendingTask,
        cancel: &CancellationToken,
        mut on_attempt: impl FnMut(u32, PollReport) + Send,
    ) -> Result<ImageReference, GenerationError> {
        tracing::info!(
            provider = %task.provider,
            task_id = %task.task_id,
            interval_ms = self.interval.as_millis() as u64,
            max_attempts = self.max_attempts,
            "polling task"
        );

        for attempt in 1..=self.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(task, attempt - 1)),
                _ = tokio::time::sleep(self.interval) => {}
            }
            let status = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(task, attempt - 1)),
                status = adapter.check_status(task) => status,
            };

            match status {
                Ok(TaskStatus::Complete(image)) => {
                    on_attempt(attempt, PollReport::Complete);
                    tracing::info!(task_id = %task.task_id, attempt, "task completed");
                    return Ok(image);
                }
                Ok(TaskStatus::Failed(detail)) => {
                    on_attempt(attempt, PollReport::Failed);
                    return Err(GenerationError::new(ErrorKind::GenerationFailed, detail));
                }
                Ok(TaskStatus::StillPending) => {
                    on_attempt(attempt, PollReport::StillPending);
                    tracing::debug!(task_id = %task.task_id, attempt, "task still pending");
                }
                Err(err) if err.kind.is_transient_poll_error() => {
                    on_attempt(attempt, PollReport::TransientError);
                    tracing::warn!(
                        task_id = %task.task_id,
                        attempt,
                        error = %err,
                        "status check failed; retrying on next poll"
                    );
                }
                Err(err) => {
                    on_attempt(attempt, PollReport::Error);
                    return Err(err);
                }
            }
        }

        Err(GenerationError::new(
            ErrorKind::Timeout,
            format!(
                "{} task {} still pending after {} polls ({}ms apart)",
                task.provider,
                task.task_id,
                self.max_attempts,
                self.interval.as_millis()
            ),
        ))
    }
}

fn cancelled(task: &PendingTask, polls: u32) -> GenerationError {
    GenerationError::new(
        ErrorKind::Cancelled,
        format!("{} task {} abandoned after {polls} polls", task.provider, task.task_id),
    )
}
