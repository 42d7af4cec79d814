//! Waiting for a remotely executed job to reach a terminal state.
//!
//! Every attempt re-reads the job's status from a [`StatusProvider`]; nothing
//! about the job is cached between attempts. `PENDING` and `RUNNING` wait one
//! poll interval and try again, `SUCCEEDED` returns the snapshot, `FAILED` and
//! `STOPPED` end the wait immediately.
//!
//! `max_attempts` counts status observations, inclusively: a budget of 3 means
//! at most 3 observations and at most 2 waits between them. No wait follows
//! the last observation.

use super::JobError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Status of a job as reported by the job-execution system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Failed,
    Stopped,
    Succeeded,
}

impl JobStatus {
    /// No further transition is expected from a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Stopped | Self::Succeeded)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Stopped => "STOPPED",
            Self::Succeeded => "SUCCEEDED",
        };
        f.write_str(s)
    }
}

/// One observation of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    /// Full status document; only meaningful once the job has succeeded.
    pub payload: serde_json::Value,
}

impl JobSnapshot {
    /// Human-readable message attached to the status, if any.
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(|m| m.as_str())
    }
}

/// Source of job status observations.
#[async_trait]
pub trait StatusProvider: Send + Sync {
    async fn get_status(&self, job_id: &str) -> Result<JobSnapshot, JobError>;
}

/// Retry budget for [`wait_for_terminal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Maximum number of status observations, at least 1.
    pub max_attempts: u32,
    /// Delay between two observations.
    pub poll_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval: Duration::from_secs(30),
        }
    }
}

/// Poll `job_id` until it succeeds, fails, stops, the attempt budget runs out,
/// or `cancel` fires.
///
/// Cancellation is checked before every observation and while waiting, so a
/// cancelled poll returns without finishing its current interval.
pub async fn wait_for_terminal<P>(
    provider: &P,
    job_id: &str,
    settings: &PollSettings,
    cancel: &CancellationToken,
) -> Result<JobSnapshot, JobError>
where
    P: StatusProvider + ?Sized,
{
    if settings.max_attempts == 0 {
        return Err(JobError::Internal(anyhow::anyhow!(
            "max_attempts must be at least 1"
        )));
    }

    let cancelled = || JobError::Cancelled {
        job_id: job_id.to_string(),
    };

    for attempt in 1..=settings.max_attempts {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let snapshot = provider.get_status(job_id).await?;
        debug!(job_id, attempt, status = %snapshot.status, "Observed job status");

        match snapshot.status {
            JobStatus::Pending | JobStatus::Running => {
                if attempt == settings.max_attempts {
                    break;
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(settings.poll_interval) => {}
                }
            }
            JobStatus::Failed => {
                warn!(job_id, attempt, "Job failed");
                return Err(JobError::JobFailed {
                    job_id: job_id.to_string(),
                    message: snapshot.message().unwrap_or("no message").to_string(),
                });
            }
            JobStatus::Stopped => {
                warn!(job_id, attempt, "Job stopped");
                return Err(JobError::JobStopped {
                    job_id: job_id.to_string(),
                });
            }
            JobStatus::Succeeded => return Ok(snapshot),
        }
    }

    Err(JobError::PollTimeout {
        job_id: job_id.to_string(),
        max_attempts: settings.max_attempts,
        poll_interval: settings.poll_interval,
    })
}
