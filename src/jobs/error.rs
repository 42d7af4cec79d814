use std::time::Duration;

/// Errors returned by the jobs SDK and the job poller.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {job_id} failed: {message}")]
    JobFailed { job_id: String, message: String },

    #[error("Job {job_id} stopped")]
    JobStopped { job_id: String },

    #[error(
        "Job {job_id} did not complete in the polling time \
         (max_attempts: {max_attempts}, poll_interval: {poll_interval:?})"
    )]
    PollTimeout {
        job_id: String,
        max_attempts: u32,
        poll_interval: Duration,
    },

    #[error("Polling for job {job_id} was cancelled")]
    Cancelled { job_id: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl JobError {
    /// True for the outcomes that describe the job itself rather than the
    /// request made about it.
    pub fn is_terminal_job_state(&self) -> bool {
        matches!(self, Self::JobFailed { .. } | Self::JobStopped { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Api { status: 404, .. })
    }
}
