use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::Client;

use super::models::{WorkflowRunSummary, WorkflowRunsResponse};
use crate::error::{DashboardError, Result};

const USER_AGENT: &str = "janus-dashboard";
pub const GITHUB_API: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
/// GitHub's ceiling for `per_page` on list endpoints.
pub const MAX_PAGE_SIZE: usize = 100;

/// Characters left unescaped in a URL path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[async_trait]
pub trait GithubClient: Send + Sync {
    /// Most recent run of a workflow, or `None` when it has never run.
    async fn fetch_latest_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
    ) -> Result<Option<WorkflowRunSummary>>;

    /// Up to `limit` most recent runs, newest first. Empty when the
    /// workflow has never run.
    async fn fetch_run_history(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRunSummary>>;
}

/// Shared HTTP client for GitHub calls. Every request is bounded by
/// [`REQUEST_TIMEOUT`] and never retried.
pub fn build_http_client() -> reqwest::Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(REQUEST_TIMEOUT)
        .build()
}

pub struct HttpGithubClient {
    client: Client,
    token: Option<String>,
    base_url: String,
}

impl HttpGithubClient {
    pub fn new(client: Client, token: Option<String>, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            token: token.filter(|t| !t.is_empty()),
            base_url,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn runs_url(&self, owner: &str, repo: &str, workflow_id: &str) -> String {
        format!(
            "{}/repos/{}/{}/actions/workflows/{}/runs",
            self.base_url,
            utf8_percent_encode(owner, PATH_SEGMENT),
            utf8_percent_encode(repo, PATH_SEGMENT),
            utf8_percent_encode(workflow_id, PATH_SEGMENT),
        )
    }

    /// One page of the runs listing.
    async fn fetch_runs_page(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        per_page: usize,
        page: usize,
    ) -> Result<Vec<WorkflowRunSummary>> {
        let url = self.runs_url(owner, repo, workflow_id);
        let mut req = self
            .client
            .get(&url)
            .query(&[("per_page", per_page), ("page", page)])
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| {
            tracing::warn!(error = %e, "GitHub request failed");
            DashboardError::RemoteFetchFailed {
                status: None,
                body: e.to_string(),
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "GitHub API returned an error");
            return Err(DashboardError::RemoteFetchFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        let payload: WorkflowRunsResponse =
            resp.json().await.map_err(|e| DashboardError::RemoteFetchFailed {
                status: Some(status.as_u16()),
                body: format!("failed to parse workflow runs: {e}"),
            })?;

        Ok(payload.into_runs())
    }
}

#[async_trait]
impl GithubClient for HttpGithubClient {
    #[tracing::instrument(skip(self), fields(authenticated = self.token.is_some()))]
    async fn fetch_latest_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
    ) -> Result<Option<WorkflowRunSummary>> {
        let runs = self.fetch_runs_page(owner, repo, workflow_id, 1, 1).await?;
        Ok(runs.into_iter().next())
    }

    #[tracing::instrument(skip(self), fields(authenticated = self.token.is_some()))]
    async fn fetch_run_history(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRunSummary>> {
        let per_page = limit.min(MAX_PAGE_SIZE);
        let mut runs = Vec::with_capacity(limit);
        let mut page = 1;
        while runs.len() < limit {
            let batch = self
                .fetch_runs_page(owner, repo, workflow_id, per_page, page)
                .await?;
            let exhausted = batch.len() < per_page;
            runs.extend(batch);
            if exhausted {
                break;
            }
            page += 1;
        }
        runs.truncate(limit);
        tracing::debug!(runs = runs.len(), pages = page, "fetched run history");
        Ok(runs)
    }
}
