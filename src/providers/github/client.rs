use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use url::Url;

use crate::auth::Token;
use crate::error::{CITrendError, Result};

use super::types::{GitHubJob, GitHubWorkflowRun, JobsPage, WorkflowRunsPage};

const MAX_RETRIES: u32 = 5;
const RETRY_DELAY_SECONDS: u64 = 10;
const REQUEST_TIMEOUT_SECONDS: u64 = 60;
pub(super) const PAGE_SIZE: usize = 100;
/// Results GitHub returns for a filtered run listing, however many match
pub(super) const MAX_LISTED_RUNS: usize = 1000;
/// Ranges are not split into parts shorter than this
const MIN_SPLIT_SECONDS: i64 = 60;

/// GitHub REST API client scoped to one repository.
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    owner: String,
    repo: String,
    token: Option<Token>,
    semaphore: Arc<Semaphore>,
    retry_delay: Duration,
}

impl GitHubClient {
    /// Creates a client for `owner/repo`.
    ///
    /// At most `max_concurrent_requests` requests are in flight at once,
    /// regardless of how many tasks share the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or `base_url` is not a valid URL.
    pub fn new(
        base_url: &str,
        owner: &str,
        repo: &str,
        token: Option<Token>,
        max_concurrent_requests: usize,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("x-github-api-version", HeaderValue::from_static("2022-11-28"));

        let client = Client::builder()
            .user_agent(concat!("citrend/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| CITrendError::Config(format!("Failed to create HTTP client: {e}")))?;

        // Url::join drops the last path segment unless it ends with a slash
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let api_url = Url::parse(&normalized)
            .map_err(|e| CITrendError::Config(format!("Invalid base URL: {e}")))?;

        Ok(Self {
            client,
            api_url,
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
            semaphore: Arc::new(Semaphore::new(max_concurrent_requests.max(1))),
            retry_delay: Duration::from_secs(RETRY_DELAY_SECONDS),
        })
    }

    #[cfg(test)]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.token {
            request.bearer_auth(token.as_str())
        } else {
            request
        }
    }

    fn repo_url(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(&format!("repos/{}/{}/{path}", self.owner, self.repo))
            .map_err(|e| CITrendError::Config(format!("Invalid repository URL: {e}")))
    }

    /// Fetches every completed run created between `since` and `until`.
    ///
    /// Pages through the repository runs endpoint, or the workflow's runs
    /// endpoint when `workflow` is given. GitHub lists at most
    /// [`MAX_LISTED_RUNS`] results for a filtered query, so a range holding
    /// more runs is split in half until every part fits. `on_progress`
    /// receives `(fetched, total)` after each page.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fails after retries or cannot be parsed.
    pub async fn fetch_runs_in_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        branch: Option<&str>,
        workflow: Option<&str>,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Vec<GitHubWorkflowRun>> {
        let path = match workflow {
            Some(workflow) => format!("actions/workflows/{workflow}/runs"),
            None => "actions/runs".to_string(),
        };

        let mut runs = Vec::new();
        let mut expected = 0;
        // Oldest range on top
        let mut ranges = vec![(since, until)];

        while let Some((start, end)) = ranges.pop() {
            let created = created_filter(start, end);
            let mut response = self.fetch_runs_page(&path, &created, branch, 1).await?;

            let over_limit = response.total_count > MAX_LISTED_RUNS;
            if over_limit && (end - start).num_seconds() >= 2 * MIN_SPLIT_SECONDS {
                let mid = start + (end - start) / 2;
                debug!(
                    "{} runs created {created}, splitting at {mid}",
                    response.total_count
                );
                ranges.push((mid, end));
                ranges.push((start, mid - chrono::Duration::seconds(1)));
                continue;
            }

            let listable = response.total_count.min(MAX_LISTED_RUNS);
            expected += listable;
            let mut fetched_in_range = 0;
            let mut page = 1;

            loop {
                let page_len = response.workflow_runs.len();
                fetched_in_range += page_len;
                runs.extend(response.workflow_runs);

                on_progress(runs.len(), expected.max(runs.len()));
                debug!(
                    "Fetched runs page {page} for {created} ({page_len} runs, {fetched_in_range}/{} total)",
                    response.total_count
                );

                if page_len < PAGE_SIZE || fetched_in_range >= listable {
                    break;
                }
                page += 1;
                response = self.fetch_runs_page(&path, &created, branch, page).await?;
            }

            if fetched_in_range < response.total_count {
                warn!(
                    "GitHub listed {fetched_in_range} of {} runs created {created}; the rest are not analyzed",
                    response.total_count
                );
            }
        }

        Ok(runs)
    }

    async fn fetch_runs_page(
        &self,
        path: &str,
        created: &str,
        branch: Option<&str>,
        page: usize,
    ) -> Result<WorkflowRunsPage> {
        let mut url = self.repo_url(path)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("status", "completed")
                .append_pair("created", created)
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            if let Some(branch) = branch {
                query.append_pair("branch", branch);
            }
        }
        self.get_json(url).await
    }

    /// Fetches the latest attempt of every job in a run.
    ///
    /// # Errors
    ///
    /// Returns an error if any page fails after retries or cannot be parsed.
    pub async fn fetch_job_details(&self, run_id: u64) -> Result<Vec<GitHubJob>> {
        let path = format!("actions/runs/{run_id}/jobs");
        let mut jobs = Vec::new();
        let mut page = 1;

        loop {
            let mut url = self.repo_url(&path)?;
            url.query_pairs_mut()
                .append_pair("filter", "latest")
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let response: JobsPage = self.get_json(url).await?;
            let page_len = response.jobs.len();
            jobs.extend(response.jobs);

            if page_len < PAGE_SIZE || jobs.len() >= response.total_count {
                break;
            }
            page += 1;
        }

        Ok(jobs)
    }

    /// GET with retry on rate limits, server errors and transient network errors.
    async fn get_json<T>(&self, url: Url) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        // One permit per logical request, held across retries
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| CITrendError::Config(format!("Request limiter closed: {e}")))?;

        let mut retry_count = 0;
        loop {
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= MAX_RETRIES {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({e}), retrying in {}s ({}/{MAX_RETRIES})...",
                        self.retry_delay.as_secs(),
                        retry_count + 1
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == 429 || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(CITrendError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: MAX_RETRIES,
                    });
                }

                warn!(
                    "GitHub API error (status {status}). Waiting {} seconds before retry {}/{MAX_RETRIES}...",
                    self.retry_delay.as_secs(),
                    retry_count + 1
                );

                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if !status.is_success() {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(CITrendError::Api {
                    status: status.as_u16(),
                    message: error_text,
                });
            }

            let body = response.bytes().await?;
            return Ok(serde_json::from_slice(&body)?);
        }
    }
}

/// Inclusive `created` range in GitHub search syntax, to the second.
fn created_filter(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
    format!("{}..{}", start.format(FORMAT), end.format(FORMAT))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(server: &mockito::Server) -> GitHubClient {
        GitHubClient::new(&server.url(), "acme", "widgets", Some(Token::from("ghp-test")), 4)
            .unwrap()
            .with_retry_delay(Duration::ZERO)
    }

    fn run_json(id: u64) -> serde_json::Value {
        json!({
            "id": id,
            "head_sha": format!("sha{id}"),
            "html_url": format!("https://github.com/acme/widgets/actions/runs/{id}"),
            "status": "completed",
            "conclusion": "success",
            "created_at": "2024-03-01T12:00:00Z",
            "updated_at": "2024-03-01T12:10:00Z"
        })
    }

    fn since() -> DateTime<Utc> {
        "2024-02-01T00:00:00Z".parse().unwrap()
    }

    fn until() -> DateTime<Utc> {
        "2024-03-01T00:00:00Z".parse().unwrap()
    }

    fn runs_page(total_count: usize, ids: impl Iterator<Item = u64>) -> String {
        let runs: Vec<_> = ids.map(run_json).collect();
        json!({"total_count": total_count, "workflow_runs": runs}).to_string()
    }

    mod fetch_runs_in_window {
        use super::*;

        #[tokio::test]
        async fn pages_until_total_count_is_reached() {
            let mut server = mockito::Server::new_async().await;

            let first_page: Vec<_> = (1..=100).map(run_json).collect();
            let second_page: Vec<_> = (101..=130).map(run_json).collect();

            let page_1 = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("page".into(), "1".into()),
                    Matcher::UrlEncoded("per_page".into(), "100".into()),
                    Matcher::UrlEncoded("status".into(), "completed".into()),
                    Matcher::UrlEncoded(
                        "created".into(),
                        "2024-02-01T00:00:00Z..2024-03-01T00:00:00Z".into(),
                    ),
                ]))
                .match_header("authorization", "Bearer ghp-test")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!({"total_count": 130, "workflow_runs": first_page}).to_string())
                .create_async()
                .await;
            let page_2 = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!({"total_count": 130, "workflow_runs": second_page}).to_string())
                .create_async()
                .await;

            let client = client_for(&server);
            let mut progress = Vec::new();
            let runs = client
                .fetch_runs_in_window(since(), until(), None, None, |fetched, total| {
                    progress.push((fetched, total));
                })
                .await
                .unwrap();

            page_1.assert_async().await;
            page_2.assert_async().await;
            assert_eq!(runs.len(), 130);
            assert_eq!(runs[0].id, 1);
            assert_eq!(runs[129].id, 130);
            assert_eq!(progress, vec![(100, 130), (130, 130)]);
        }

        #[tokio::test]
        async fn uses_workflow_endpoint_and_branch_filter() {
            let mut server = mockito::Server::new_async().await;

            let mock = server
                .mock("GET", "/repos/acme/widgets/actions/workflows/ci.yml/runs")
                .match_query(Matcher::UrlEncoded("branch".into(), "main".into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(json!({"total_count": 1, "workflow_runs": [run_json(9)]}).to_string())
                .create_async()
                .await;

            let client = client_for(&server);
            let runs = client
                .fetch_runs_in_window(since(), until(), Some("main"), Some("ci.yml"), |_, _| {})
                .await
                .unwrap();

            mock.assert_async().await;
            assert_eq!(runs.len(), 1);
            assert_eq!(runs[0].id, 9);
        }

        #[tokio::test]
        async fn splits_ranges_beyond_listing_limit() {
            let mut server = mockito::Server::new_async().await;
            let created = |range: &str| {
                Matcher::AllOf(vec![
                    Matcher::UrlEncoded("created".into(), range.into()),
                    Matcher::UrlEncoded("page".into(), "1".into()),
                ])
            };

            let whole = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(created("2024-02-01T00:00:00Z..2024-03-01T00:00:00Z"))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(runs_page(1500, 1..=100))
                .create_async()
                .await;
            let older = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(created("2024-02-01T00:00:00Z..2024-02-15T11:59:59Z"))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(runs_page(2, 1..=2))
                .create_async()
                .await;
            let newer = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(created("2024-02-15T12:00:00Z..2024-03-01T00:00:00Z"))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(runs_page(1, 3..=3))
                .create_async()
                .await;

            let client = client_for(&server);
            let mut progress = Vec::new();
            let runs = client
                .fetch_runs_in_window(since(), until(), None, None, |fetched, total| {
                    progress.push((fetched, total));
                })
                .await
                .unwrap();

            whole.assert_async().await;
            older.assert_async().await;
            newer.assert_async().await;
            let ids: Vec<u64> = runs.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![1, 2, 3], "Runs from the oversized listing are discarded");
            assert_eq!(progress.last(), Some(&(3, 3)));
        }

        #[tokio::test]
        async fn short_range_over_limit_keeps_listed_runs() {
            let mut server = mockito::Server::new_async().await;
            let until = since() + chrono::Duration::seconds(90);

            let page_1 = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(Matcher::UrlEncoded("page".into(), "1".into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(runs_page(1200, 1..=100))
                .expect(1)
                .create_async()
                .await;
            let page_2 = server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(Matcher::UrlEncoded("page".into(), "2".into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(runs_page(1200, std::iter::empty()))
                .create_async()
                .await;

            let client = client_for(&server);
            let runs = client
                .fetch_runs_in_window(since(), until, None, None, |_, _| {})
                .await
                .unwrap();

            page_1.assert_async().await;
            page_2.assert_async().await;
            assert_eq!(runs.len(), 100);
        }

        #[tokio::test]
        async fn not_found_is_an_api_error() {
            let mut server = mockito::Server::new_async().await;

            server
                .mock("GET", "/repos/acme/widgets/actions/runs")
                .match_query(Matcher::Any)
                .with_status(404)
                .with_body(r#"{"message": "Not Found"}"#)
                .create_async()
                .await;

            let client = client_for(&server);
            let result = client
                .fetch_runs_in_window(since(), until(), None, None, |_, _| {})
                .await;

            match result {
                Err(CITrendError::Api { status, message }) => {
                    assert_eq!(status, 404);
                    assert!(message.contains("Not Found"));
                }
                other => panic!("Expected API error, got {other:?}"),
            }
        }
    }

    mod fetch_job_details {
        use super::*;

        #[tokio::test]
        async fn requests_latest_attempt() {
            let mut server = mockito::Server::new_async().await;

            let mock = server
                .mock("GET", "/repos/acme/widgets/actions/runs/42/jobs")
                .match_query(Matcher::UrlEncoded("filter".into(), "latest".into()))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(
                    json!({
                        "total_count": 2,
                        "jobs": [
                            {"id": 1, "name": "build", "status": "completed", "conclusion": "success"},
                            {"id": 2, "name": "test", "status": "completed", "conclusion": "failure"}
                        ]
                    })
                    .to_string(),
                )
                .create_async()
                .await;

            let client = client_for(&server);
            let jobs = client.fetch_job_details(42).await.unwrap();

            mock.assert_async().await;
            assert_eq!(jobs.len(), 2);
            assert_eq!(jobs[1].name, "test");
        }

        #[tokio::test]
        async fn retries_server_errors_then_gives_up() {
            let mut server = mockito::Server::new_async().await;

            let mock = server
                .mock("GET", "/repos/acme/widgets/actions/runs/42/jobs")
                .match_query(Matcher::Any)
                .with_status(502)
                .expect(MAX_RETRIES as usize + 1)
                .create_async()
                .await;

            let client = client_for(&server);
            let result = client.fetch_job_details(42).await;

            mock.assert_async().await;
            assert!(matches!(
                result,
                Err(CITrendError::ApiErrorAfterRetries { status: 502, .. })
            ));
        }
    }

    #[test]
    fn test_base_url_with_path_keeps_prefix() {
        let client =
            GitHubClient::new("https://github.example.com/api/v3", "acme", "widgets", None, 1)
                .unwrap();
        let url = client.repo_url("actions/runs").unwrap();
        assert_eq!(
            url.as_str(),
            "https://github.example.com/api/v3/repos/acme/widgets/actions/runs"
        );
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = GitHubClient::new("not a url", "acme", "widgets", None, 1);
        assert!(matches!(result, Err(CITrendError::Config(_))));
    }
}
