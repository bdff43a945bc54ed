use chrono::Utc;
use log::{info, warn};
use std::future::Future;
use std::time::Duration;

use crate::auth::Token;
use crate::config::parse_repo;
use crate::error::{CITrendError, Result};
use crate::insights::TrendReport;
use crate::output::PhaseProgress;
use crate::trends::model::{Job, Run};
use crate::trends::sampling::{plan_sample, select_sample_indices};
use crate::trends::{self, ChronologicalRuns, Thresholds, TimeRange};

use super::cache::JobCache;
use super::client::GitHubClient;
use super::links;

/// What to analyze and how.
#[derive(Debug, Clone)]
pub struct TrendRequest {
    pub days: u32,
    pub branch: Option<String>,
    pub workflow: Option<String>,
    pub confidence: f64,
    pub margin_of_error: f64,
    /// Fetch job details for every run
    pub no_sample: bool,
    pub thresholds: Thresholds,
    /// Abort the whole collection after this many seconds
    pub timeout_secs: Option<u64>,
}

/// GitHub Actions trend provider.
///
/// Fetches the runs in a window, fetches job details for a deterministic
/// sample of them, and hands the result to the trend engine.
pub struct GitHubProvider {
    client: GitHubClient,
    cache: JobCache,
    repository: String,
    web_base: String,
}

impl GitHubProvider {
    /// Creates a provider for `repository` (`owner/repo`).
    ///
    /// # Errors
    ///
    /// Returns an error if the repository path is malformed or the client cannot be built.
    pub fn new(
        base_url: &str,
        repository: &str,
        token: Option<Token>,
        max_concurrent_requests: usize,
        cache: JobCache,
    ) -> Result<Self> {
        let (owner, repo) = parse_repo(repository)?;
        let client = GitHubClient::new(base_url, &owner, &repo, token, max_concurrent_requests)?;

        Ok(Self {
            client,
            cache,
            repository: repository.to_string(),
            web_base: links::web_base_url(base_url),
        })
    }

    /// Collects and analyzes the runs of the requested window.
    ///
    /// Progress is displayed in three phases:
    /// 1. Fetching runs in the window
    /// 2. Fetching job details for the sampled runs
    /// 3. Analyzing trends
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The run list cannot be fetched
    /// - The window holds no runs
    /// - The optional timeout elapses
    ///
    /// Failing to fetch one run's jobs is not an error; that run is analyzed without jobs.
    pub async fn collect_trends(&self, request: &TrendRequest) -> Result<TrendReport> {
        info!(
            "Starting trend collection for repository: {}",
            self.repository
        );
        within_timeout(request.timeout_secs, self.collect(request)).await
    }

    async fn collect(&self, request: &TrendRequest) -> Result<TrendReport> {
        let collected_at = Utc::now();
        let time_range = TimeRange::ending_at(collected_at, request.days);

        // Phase 1: Fetching runs
        let progress = PhaseProgress::start_fetching_runs(request.days);

        let fetched = self
            .client
            .fetch_runs_in_window(
                time_range.start,
                time_range.end,
                request.branch.as_deref(),
                request.workflow.as_deref(),
                |fetched, total| progress.runs_fetched(fetched, total),
            )
            .await;

        let mut runs: Vec<Run> = match fetched {
            Ok(raw) if raw.is_empty() => {
                progress.fail();
                return Err(CITrendError::NoRuns {
                    repo: self.repository.clone(),
                    days: request.days,
                });
            }
            Ok(raw) => raw.into_iter().map(|r| self.to_run(r.into())).collect(),
            Err(e) => {
                progress.fail();
                return Err(CITrendError::RunFetch {
                    repo: self.repository.clone(),
                    source: Box::new(e),
                });
            }
        };

        info!("Fetched {} runs", runs.len());

        let sampling = plan_sample(
            runs.len(),
            request.confidence,
            request.margin_of_error,
            request.no_sample,
            request.thresholds.sample_savings_cutoff,
        );
        info!("{}", sampling.reason);

        let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
        let selected = select_sample_indices(&ids, sampling.sample_size);

        // Phase 2: Fetching job details
        let progress = progress.finish_runs_start_jobs(runs.len(), selected.len());

        let futures: Vec<_> = selected
            .iter()
            .map(|&idx| self.job_details(runs[idx].id, &progress))
            .collect();

        // join_all yields results in input order, one slot per selected run
        let details = futures::future::join_all(futures).await;
        for (&idx, jobs) in selected.iter().zip(details) {
            runs[idx].jobs = jobs;
        }

        if let Err(e) = self.cache.save_runs(&runs) {
            warn!("Failed to save job cache: {e}");
        }

        // Phase 3: Analyzing
        let progress = progress.finish_jobs_start_analysis();

        let runs = ChronologicalRuns::from_unordered(runs);
        let mut analysis = trends::analyze(&runs, sampling, time_range, &request.thresholds);
        links::attach_compare_urls(&mut analysis, &self.web_base, &self.repository);

        progress.finish_analysis();

        Ok(TrendReport {
            provider: "GitHub Actions".to_string(),
            repository: self.repository.clone(),
            branch: request.branch.clone(),
            workflow: request.workflow.clone(),
            collected_at,
            analysis,
        })
    }

    fn to_run(&self, mut run: Run) -> Run {
        if run.url.is_empty() {
            run.url = links::run_url(&self.web_base, &self.repository, run.id);
        }
        run
    }

    async fn job_details(&self, run_id: u64, progress: &PhaseProgress) -> Vec<Job> {
        let jobs = if let Some(jobs) = self.cache.get(run_id) {
            jobs
        } else {
            match self.client.fetch_job_details(run_id).await {
                Ok(jobs) => jobs.into_iter().map(Job::from).collect(),
                Err(e) => {
                    warn!("Failed to fetch jobs for run {run_id}, analyzing it without jobs: {e}");
                    Vec::new()
                }
            }
        };
        progress.job_details_fetched();
        jobs
    }
}

async fn within_timeout<T>(
    timeout_secs: Option<u64>,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    match timeout_secs {
        Some(seconds) => tokio::time::timeout(Duration::from_secs(seconds), work)
            .await
            .map_err(|_| CITrendError::Timeout { seconds })?,
        None => work.await,
    }
}
