//! Client SDK for the jobs API and the bounded job poller.

mod client;
mod error;
pub mod models;
pub mod poller;

pub use client::JobsClient;
pub use error::JobError;
pub use models::{JobCreate, JobResponse, JobResultDownloadResponse, JobResultResponse, JobType};
pub use poller::{wait_for_terminal, JobSnapshot, JobStatus, PollSettings, StatusProvider};
