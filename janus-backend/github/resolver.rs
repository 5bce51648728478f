use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use super::client::GithubClient;
use super::models::WorkflowRunSummary;
use crate::cache::TtlCache;
use crate::error::Result;

pub const RUN_CACHE_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WorkflowKey {
    owner: String,
    repo: String,
    workflow_id: String,
}

impl WorkflowKey {
    fn new(owner: &str, repo: &str, workflow_id: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
            workflow_id: workflow_id.to_string(),
        }
    }
}

/// Looks up workflow runs, memoizing each answer (including "no runs")
/// for [`RUN_CACHE_TTL`]. Failures are not cached.
pub struct RunResolver {
    client: Arc<dyn GithubClient>,
    cache: Mutex<TtlCache<WorkflowKey, Option<WorkflowRunSummary>>>,
    history: Mutex<TtlCache<(WorkflowKey, usize), Vec<WorkflowRunSummary>>>,
}

impl RunResolver {
    pub fn new(client: Arc<dyn GithubClient>) -> Self {
        Self::with_ttl(client, RUN_CACHE_TTL)
    }

    pub fn with_ttl(client: Arc<dyn GithubClient>, ttl: Duration) -> Self {
        Self {
            client,
            cache: Mutex::new(TtlCache::new(ttl)),
            history: Mutex::new(TtlCache::new(ttl)),
        }
    }

    pub async fn fetch_latest_run(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
    ) -> Result<Option<WorkflowRunSummary>> {
        let key = WorkflowKey::new(owner, repo, workflow_id);

        if let Some(cached) = self.cache.lock().await.get(&key) {
            tracing::debug!(owner, repo, workflow_id, "workflow run cache hit");
            return Ok(cached);
        }

        tracing::debug!(owner, repo, workflow_id, "workflow run cache miss");
        let run = self.client.fetch_latest_run(owner, repo, workflow_id).await?;
        let mut cache = self.cache.lock().await;
        cache.insert(key, run.clone());
        tracing::debug!(entries = cache.len(), "workflow run cached");
        Ok(run)
    }

    pub async fn fetch_run_history(
        &self,
        owner: &str,
        repo: &str,
        workflow_id: &str,
        limit: usize,
    ) -> Result<Vec<WorkflowRunSummary>> {
        let key = (WorkflowKey::new(owner, repo, workflow_id), limit);
        if let Some(cached) = self.history.lock().await.get(&key) {
            tracing::debug!(owner, repo, workflow_id, "run history cache hit");
            return Ok(cached);
        }

        let runs = self
            .client
            .fetch_run_history(owner, repo, workflow_id, limit)
            .await?;
        self.history.lock().await.insert(key, runs.clone());
        Ok(runs)
    }
}
