use super::models::{JobCreate, JobResponse, JobResultDownloadResponse, JobResultResponse, JobType};
use super::poller::{wait_for_terminal, JobSnapshot, JobStatus, PollSettings, StatusProvider};
use super::JobError;
use crate::http::models::ListingResponse;
use anyhow::anyhow;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const JOBS_ROUTE: &str = "jobs";

/// Client for the jobs API and for the job-execution dashboard that reports
/// live job status.
#[derive(Debug, Clone)]
pub struct JobsClient {
    http: reqwest::Client,
    api_url: String,
    ray_url: String,
}

impl JobsClient {
    pub fn new(api_url: &str, ray_dashboard_url: &str) -> Result<Self, JobError> {
        Self::with_http_client(reqwest::Client::new(), api_url, ray_dashboard_url)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        api_url: &str,
        ray_dashboard_url: &str,
    ) -> Result<Self, JobError> {
        for (name, value) in [("api_url", api_url), ("ray_dashboard_url", ray_dashboard_url)] {
            url::Url::parse(value).map_err(|e| anyhow!("Invalid {} '{}': {}", name, value, e))?;
        }
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            ray_url: ray_dashboard_url.trim_end_matches('/').to_string(),
        })
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.api_url, path)
    }

    #[tracing::instrument(name = "jobs_list", skip(self))]
    pub async fn get_jobs(&self) -> Result<ListingResponse<JobResponse>, JobError> {
        let response = self.http.get(self.api(JOBS_ROUTE)).send().await?;
        decode(response).await
    }

    #[tracing::instrument(name = "jobs_get", skip(self), fields(evalhub.job_id = %id))]
    pub async fn get_job(&self, id: &str) -> Result<JobResponse, JobError> {
        let response = self
            .http
            .get(self.api(&format!("{}/{}", JOBS_ROUTE, id)))
            .send()
            .await?;
        decode(response).await
    }

    #[tracing::instrument(
        name = "jobs_create",
        skip(self, request),
        fields(evalhub.job_type = %job_type.as_str(), evalhub.job_id = tracing::field::Empty)
    )]
    pub async fn create_job(
        &self,
        job_type: JobType,
        request: &JobCreate,
    ) -> Result<JobResponse, JobError> {
        let response = self
            .http
            .post(self.api(&format!("{}/{}", JOBS_ROUTE, job_type.as_str())))
            .json(request)
            .send()
            .await?;
        let job: JobResponse = decode(response).await?;
        tracing::Span::current().record("evalhub.job_id", job.id.as_str());
        Ok(job)
    }

    #[tracing::instrument(name = "jobs_get_result", skip(self), fields(evalhub.job_id = %id))]
    pub async fn get_job_result(&self, id: &str) -> Result<JobResultResponse, JobError> {
        let response = self
            .http
            .get(self.api(&format!("{}/{}/result", JOBS_ROUTE, id)))
            .send()
            .await?;
        decode(response).await
    }

    #[tracing::instrument(name = "jobs_get_download", skip(self), fields(evalhub.job_id = %id))]
    pub async fn get_job_download(&self, id: &str) -> Result<JobResultDownloadResponse, JobError> {
        let response = self
            .http
            .get(self.api(&format!("{}/{}/result/download", JOBS_ROUTE, id)))
            .send()
            .await?;
        decode(response).await
    }

    /// Block until the job reaches a terminal state. See [`wait_for_terminal`].
    #[tracing::instrument(
        name = "jobs_wait",
        skip(self, settings, cancel),
        fields(
            evalhub.job_id = %id,
            evalhub.max_attempts = settings.max_attempts,
        )
    )]
    pub async fn wait_for_job(
        &self,
        id: &str,
        settings: &PollSettings,
        cancel: &CancellationToken,
    ) -> Result<JobSnapshot, JobError> {
        wait_for_terminal(self, id, settings, cancel).await
    }
}

#[async_trait]
impl StatusProvider for JobsClient {
    async fn get_status(&self, job_id: &str) -> Result<JobSnapshot, JobError> {
        let url = format!("{}/api/jobs/{}", self.ray_url, job_id);
        let response = self.http.get(&url).send().await?;
        let payload: serde_json::Value = decode(response).await?;

        let status = payload
            .get("status")
            .cloned()
            .ok_or_else(|| anyhow!("Status response for job {} has no 'status' field", job_id))?;
        let status: JobStatus = serde_json::from_value(status)
            .map_err(|e| anyhow!("Unrecognized status for job {}: {}", job_id, e))?;

        Ok(JobSnapshot {
            job_id: job_id.to_string(),
            status,
            payload,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, JobError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        warn!(status = %status, body = %truncate_for_log(&message), "Jobs API returned error status");
        return Err(JobError::Api {
            status: status.as_u16(),
            message,
        });
    }
    debug!(status = %status, "Jobs API response");
    Ok(response.json::<T>().await?)
}

fn truncate_for_log(message: &str) -> &str {
    const MAX: usize = 200;
    match message.char_indices().nth(MAX) {
        Some((idx, _)) => &message[..idx],
        None => message,
    }
}
