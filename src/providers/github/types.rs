use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::trends::model::{elapsed_seconds, elapsed_seconds_between, Conclusion, Job, Run};

/// Workflow run as returned by `GET /repos/{owner}/{repo}/actions/runs`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubWorkflowRun {
    pub id: u64,
    pub head_sha: String,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WorkflowRunsPage {
    #[serde(default)]
    pub total_count: usize,
    pub workflow_runs: Vec<GitHubWorkflowRun>,
}

/// Job as returned by `GET /repos/{owner}/{repo}/actions/runs/{id}/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubJob {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<Conclusion>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(super) struct JobsPage {
    #[serde(default)]
    pub total_count: usize,
    pub jobs: Vec<GitHubJob>,
}

impl From<GitHubWorkflowRun> for Run {
    fn from(run: GitHubWorkflowRun) -> Self {
        Self {
            id: run.id,
            head_sha: run.head_sha,
            url: run.html_url,
            status: run.status.unwrap_or_default(),
            conclusion: run.conclusion,
            duration: elapsed_seconds(run.created_at, run.updated_at),
            created_at: run.created_at,
            updated_at: run.updated_at,
            jobs: Vec::new(),
        }
    }
}

impl From<GitHubJob> for Job {
    fn from(job: GitHubJob) -> Self {
        Self {
            id: job.id,
            name: job.name,
            url: job.html_url.unwrap_or_default(),
            status: job.status.unwrap_or_default(),
            conclusion: job.conclusion,
            duration: elapsed_seconds_between(job.started_at, job.completed_at),
            queue_time: elapsed_seconds_between(job.created_at, job.started_at),
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
        }
    }
}
