use serde::{Deserialize, Serialize};

use crate::format::{elapsed_seconds, format_duration, format_timestamp};
use crate::status::{DisplayStatus, derive_display_status};

/// One workflow to watch: `(owner, repo, workflow_id)` plus a panel title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub title: String,
    pub owner: String,
    pub repo: String,
    pub workflow_id: String,
}

impl WorkflowConfig {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRunsResponse {
    /// `null` and a missing key both mean "no runs".
    #[serde(default)]
    pub workflow_runs: Option<Vec<WorkflowRunSummary>>,
}

impl WorkflowRunsResponse {
    pub fn into_runs(self) -> Vec<WorkflowRunSummary> {
        self.workflow_runs.unwrap_or_default()
    }
}

/// The fields of a GitHub workflow run the dashboard displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRunSummary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub run_number: Option<u64>,
    #[serde(default)]
    pub run_started_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

impl WorkflowRunSummary {
    pub fn display_status(&self) -> DisplayStatus {
        derive_display_status(self.status.as_deref(), self.conclusion.as_deref())
    }

    fn ended_at(&self) -> Option<&str> {
        self.completed_at
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.updated_at.as_deref())
    }

    /// Run time measured to `completed_at`, or to `updated_at` while the
    /// run has not finished. Empty when it cannot be computed.
    pub fn duration(&self) -> String {
        format_duration(self.run_started_at.as_deref(), self.ended_at())
    }

    /// Same measurement as [`Self::duration`], in whole seconds.
    pub fn duration_seconds(&self) -> Option<i64> {
        elapsed_seconds(self.run_started_at.as_deref(), self.ended_at())
    }

    pub fn started(&self) -> String {
        format_timestamp(self.run_started_at.as_deref())
    }
}
