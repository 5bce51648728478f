use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DashboardError, Result};
use crate::github::models::{WorkflowConfig, WorkflowRunSummary};
use crate::github::resolver::RunResolver;
use crate::metrics::{DailyCount, MetricsReader, format_bound};
use crate::status::DisplayStatus;

pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Which workflows and staging tables the dashboard shows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardLayout {
    #[serde(default)]
    pub workflows: Vec<WorkflowConfig>,
    /// Workflows whose recent runs are listed on the history page.
    #[serde(default)]
    pub history: Vec<WorkflowConfig>,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableConfig {
    pub name: String,
    #[serde(default = "default_range_columns")]
    pub range_columns: Vec<String>,
    /// Column bucketed by day for the load-volume listing; `null` skips it.
    #[serde(default = "default_volume_column")]
    pub volume_column: Option<String>,
}

fn default_range_columns() -> Vec<String> {
    vec!["loaded_at".to_string()]
}

fn default_volume_column() -> Option<String> {
    Some("loaded_at".to_string())
}

fn workflow(title: &str, owner: &str, repo: &str, workflow_id: &str) -> WorkflowConfig {
    WorkflowConfig {
        title: title.to_string(),
        owner: owner.to_string(),
        repo: repo.to_string(),
        workflow_id: workflow_id.to_string(),
    }
}

fn table(name: &str, range_columns: &[&str]) -> TableConfig {
    TableConfig {
        name: name.to_string(),
        range_columns: range_columns.iter().map(|c| c.to_string()).collect(),
        volume_column: default_volume_column(),
    }
}

impl Default for DashboardLayout {
    fn default() -> Self {
        Self {
            workflows: vec![
                workflow("Matryoshka", "impact-initiatives", "matryoshka", "run-dbt-aci.yml"),
                workflow("KLT - Pipeline", "impact-initiatives", "klt", "run-pipeline-dev.yml"),
                workflow("KLT - Audit Log", "impact-initiatives", "klt", "run-audit-log.yml"),
            ],
            history: vec![
                workflow("Audit Logs", "impact-initiatives", "klt", "231782097"),
                workflow("Daily Data Ingestion", "impact-initiatives", "klt", "214422987"),
            ],
            history_limit: DEFAULT_HISTORY_LIMIT,
            tables: vec![
                table("stg_klt__kobo_asset", &["loaded_at", "created_at"]),
                table("stg_klt__kobo_submission", &["loaded_at", "submitted_at"]),
                table("stg_klt__kobo_asset_content__survey", &[]),
            ],
        }
    }
}

impl DashboardLayout {
    pub fn parse(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| DashboardError::DashboardFile(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DashboardError::DashboardFile(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// The layout at `path`, or the built-in one when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

/// `loaded_at` → `Loaded at range`.
pub fn range_label(column: &str) -> String {
    let spaced = column.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => format!("{}{} range", first.to_uppercase(), chars.as_str()),
        None => "Range".to_string(),
    }
}

// --- Orchestration panels ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunView {
    pub name: Option<String>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub display_status: DisplayStatus,
    pub run_number: Option<u64>,
    pub run_started_at: Option<String>,
    pub started: String,
    pub duration: Option<String>,
    pub html_url: Option<String>,
}

impl From<WorkflowRunSummary> for RunView {
    fn from(run: WorkflowRunSummary) -> Self {
        let duration = Some(run.duration()).filter(|d| !d.is_empty());
        Self {
            display_status: run.display_status(),
            started: run.started(),
            duration,
            name: run.name,
            status: run.status,
            conclusion: run.conclusion,
            run_number: run.run_number,
            run_started_at: run.run_started_at,
            html_url: run.html_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelState {
    Run { run: RunView },
    NoRuns,
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationPanel {
    #[serde(flatten)]
    pub workflow: WorkflowConfig,
    #[serde(flatten)]
    pub state: PanelState,
}

/// Evaluate each workflow panel in order. A failing panel records its
/// error and the rest still render.
pub async fn orchestration_panels(
    resolver: &RunResolver,
    workflows: &[WorkflowConfig],
) -> Vec<OrchestrationPanel> {
    let mut panels = Vec::with_capacity(workflows.len());
    for wf in workflows {
        let state = match resolver
            .fetch_latest_run(&wf.owner, &wf.repo, &wf.workflow_id)
            .await
        {
            Ok(Some(run)) => PanelState::Run { run: run.into() },
            Ok(None) => {
                tracing::info!(workflow_id = %wf.workflow_id, "no workflow runs found");
                PanelState::NoRuns
            }
            Err(e) => {
                tracing::warn!(
                    repo = %wf.full_name(),
                    workflow_id = %wf.workflow_id,
                    error = %e,
                    "failed to fetch workflow runs"
                );
                PanelState::Error {
                    message: e.to_string(),
                }
            }
        };
        panels.push(OrchestrationPanel {
            workflow: wf.clone(),
            state,
        });
    }
    panels
}

// --- Run history ---

/// One run on the history page. `duration_seconds` is the plottable value;
/// `duration` is the same measurement formatted for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPoint {
    pub run_number: Option<u64>,
    pub status: Option<String>,
    pub conclusion: Option<String>,
    pub display_status: DisplayStatus,
    pub started_at: Option<String>,
    pub started: String,
    pub duration: Option<String>,
    pub duration_seconds: Option<i64>,
}

impl From<WorkflowRunSummary> for HistoryPoint {
    fn from(run: WorkflowRunSummary) -> Self {
        let duration = Some(run.duration()).filter(|d| !d.is_empty());
        Self {
            display_status: run.display_status(),
            started: run.started(),
            duration_seconds: run.duration_seconds(),
            duration,
            run_number: run.run_number,
            status: run.status,
            conclusion: run.conclusion,
            started_at: run.run_started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum HistoryState {
    Runs { runs: Vec<HistoryPoint> },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPanel {
    #[serde(flatten)]
    pub workflow: WorkflowConfig,
    #[serde(flatten)]
    pub state: HistoryState,
}

/// Recent runs of each history workflow, newest first, with the same
/// per-panel failure isolation as the orchestration page.
pub async fn history_panels(
    resolver: &RunResolver,
    workflows: &[WorkflowConfig],
    limit: usize,
) -> Vec<HistoryPanel> {
    let mut panels = Vec::with_capacity(workflows.len());
    for wf in workflows {
        let state = match resolver
            .fetch_run_history(&wf.owner, &wf.repo, &wf.workflow_id, limit)
            .await
        {
            Ok(runs) => HistoryState::Runs {
                runs: runs.into_iter().map(HistoryPoint::from).collect(),
            },
            Err(e) => {
                tracing::warn!(
                    repo = %wf.full_name(),
                    workflow_id = %wf.workflow_id,
                    error = %e,
                    "failed to fetch run history"
                );
                HistoryState::Error {
                    message: e.to_string(),
                }
            }
        };
        panels.push(HistoryPanel {
            workflow: wf.clone(),
            state,
        });
    }
    panels
}

// --- Stats page ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RangeView {
    pub column: String,
    pub label: String,
    pub earliest: String,
    pub latest: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCountView {
    /// `YYYY-MM-DD`, or `unknown` for rows where the column is NULL.
    pub day: String,
    pub count: u64,
}

impl From<DailyCount> for DailyCountView {
    fn from(value: DailyCount) -> Self {
        Self {
            day: value
                .day
                .map_or_else(|| "unknown".to_string(), |d| d.format("%Y-%m-%d").to_string()),
            count: value.count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumeView {
    pub column: String,
    pub days: Vec<DailyCountView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TableState {
    Metrics {
        row_count: u64,
        ranges: Vec<RangeView>,
        volume: Option<VolumeView>,
    },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSection {
    pub table: String,
    #[serde(flatten)]
    pub state: TableState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StatsPage {
    ConfigIncomplete { missing: Vec<String> },
    ConnectionFailed { message: String },
    Ready { tables: Vec<TableSection> },
}

async fn table_metrics(reader: &MetricsReader, table: &TableConfig) -> Result<TableState> {
    let schema = reader.schema();
    let row_count = reader.fetch_row_count(schema, &table.name).await?;
    let mut ranges = Vec::with_capacity(table.range_columns.len());
    for column in &table.range_columns {
        let range = reader.fetch_range(schema, &table.name, column).await?;
        ranges.push(RangeView {
            column: column.clone(),
            label: range_label(column),
            earliest: format_bound(range.earliest.as_ref()),
            latest: format_bound(range.latest.as_ref()),
        });
    }
    let volume = match &table.volume_column {
        Some(column) => {
            let days = reader.fetch_count_by_date(schema, &table.name, column).await?;
            Some(VolumeView {
                column: column.clone(),
                days: days.into_iter().map(DailyCountView::from).collect(),
            })
        }
        None => None,
    };
    Ok(TableState::Metrics {
        row_count,
        ranges,
        volume,
    })
}

/// Build the stats page. `metrics` is the reader, or the configuration
/// error that prevented creating one.
pub async fn stats_page(
    metrics: std::result::Result<&MetricsReader, &DashboardError>,
    tables: &[TableConfig],
) -> StatsPage {
    let reader = match metrics {
        Ok(reader) => reader,
        Err(DashboardError::ConfigIncomplete { missing }) => {
            return StatsPage::ConfigIncomplete {
                missing: missing.clone(),
            };
        }
        Err(e) => {
            return StatsPage::ConnectionFailed {
                message: e.to_string(),
            };
        }
    };

    if let Err(e) = reader.check_connection().await {
        return StatsPage::ConnectionFailed {
            message: e.to_string(),
        };
    }

    let mut sections = Vec::with_capacity(tables.len());
    for table in tables {
        let state = match table_metrics(reader, table).await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(table = %table.name, error = %e, "failed to fetch table metrics");
                TableState::Error {
                    message: e.to_string(),
                }
            }
        };
        sections.push(TableSection {
            table: table.name.clone(),
            state,
        });
    }
    StatsPage::Ready { tables: sections }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::client::GithubClient;
    use crate::metrics::tests::{self as metrics_tests, MockMetricsSource};
    use crate::metrics::{TimeRange, TimestampValue};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    struct StubGithubClient {
        runs: HashMap<String, Result<Option<WorkflowRunSummary>>>,
        histories: HashMap<String, Result<Vec<WorkflowRunSummary>>>,
    }

    #[async_trait::async_trait]
    impl GithubClient for StubGithubClient {
        async fn fetch_latest_run(
            &self,
            _owner: &str,
            _repo: &str,
            workflow_id: &str,
        ) -> Result<Option<WorkflowRunSummary>> {
            self.runs.get(workflow_id).cloned().unwrap_or(Ok(None))
        }

        async fn fetch_run_history(
            &self,
            _owner: &str,
            _repo: &str,
            workflow_id: &str,
            limit: usize,
        ) -> Result<Vec<WorkflowRunSummary>> {
            self.histories
                .get(workflow_id)
                .cloned()
                .unwrap_or(Ok(Vec::new()))
                .map(|runs| runs.into_iter().take(limit).collect())
        }
    }

    fn completed_run() -> WorkflowRunSummary {
        WorkflowRunSummary {
            name: Some("Run dbt".into()),
            status: Some("completed".into()),
            conclusion: Some("success".into()),
            run_number: Some(12),
            run_started_at: Some("2024-01-01T00:00:00Z".into()),
            completed_at: None,
            updated_at: Some("2024-01-01T00:04:03Z".into()),
            html_url: Some("https://github.com/o/r/actions/runs/1".into()),
        }
    }

    #[test]
    fn default_layout_matches_deployment() {
        let layout = DashboardLayout::default();
        assert_eq!(layout.workflows.len(), 3);
        assert_eq!(layout.workflows[0].workflow_id, "run-dbt-aci.yml");
        assert_eq!(layout.tables[0].range_columns, vec!["loaded_at", "created_at"]);
        assert_eq!(layout.tables[1].range_columns, vec!["loaded_at", "submitted_at"]);
        assert!(layout.tables[2].range_columns.is_empty());
        assert!(
            layout
                .tables
                .iter()
                .all(|t| t.volume_column.as_deref() == Some("loaded_at"))
        );
        assert_eq!(layout.history[0].workflow_id, "231782097");
        assert_eq!(layout.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn parse_layout_with_defaults() {
        let layout = DashboardLayout::parse(
            r#"
workflows:
  - title: Nightly
    owner: acme
    repo: etl
    workflow_id: nightly.yml
tables:
  - name: stg_orders
  - name: stg_customers
    range_columns: [loaded_at, signed_up_at]
    volume_column: null
history_limit: 25
"#,
        )
        .unwrap();
        assert_eq!(layout.workflows[0].full_name(), "acme/etl");
        assert!(layout.history.is_empty());
        assert_eq!(layout.history_limit, 25);
        assert_eq!(layout.tables[0].range_columns, vec!["loaded_at"]);
        assert_eq!(layout.tables[0].volume_column.as_deref(), Some("loaded_at"));
        assert_eq!(layout.tables[1].range_columns, vec!["loaded_at", "signed_up_at"]);
        assert_eq!(layout.tables[1].volume_column, None);
    }

    #[test]
    fn parse_layout_missing_workflow_field_fails() {
        let err = DashboardLayout::parse(
            r#"
workflows:
  - title: Broken
    owner: acme
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DashboardError::DashboardFile(_)));
    }

    #[test]
    fn load_layout_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dashboard.yaml");
        std::fs::write(&path, "tables:\n  - name: stg_only\n").unwrap();

        let layout = DashboardLayout::load_or_default(Some(&path)).unwrap();
        assert!(layout.workflows.is_empty());
        assert_eq!(layout.tables[0].name, "stg_only");

        let missing = DashboardLayout::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(missing.to_string().contains("failed to read"));
    }

    #[test]
    fn range_labels() {
        assert_eq!(range_label("loaded_at"), "Loaded at range");
        assert_eq!(range_label("submitted_at"), "Submitted at range");
        assert_eq!(range_label(""), "Range");
    }

    #[tokio::test]
    async fn panels_isolate_failures() {
        let mut runs = HashMap::new();
        runs.insert("ok.yml".to_string(), Ok(Some(completed_run())));
        runs.insert(
            "broken.yml".to_string(),
            Err(DashboardError::RemoteFetchFailed {
                status: Some(500),
                body: "oops".into(),
            }),
        );
        let resolver = RunResolver::new(Arc::new(StubGithubClient {
            runs,
            ..Default::default()
        }));
        let workflows = vec![
            workflow("Broken", "o", "r", "broken.yml"),
            workflow("Empty", "o", "r", "empty.yml"),
            workflow("Good", "o", "r", "ok.yml"),
        ];

        let panels = orchestration_panels(&resolver, &workflows).await;
        assert_eq!(panels.len(), 3);
        assert!(matches!(panels[0].state, PanelState::Error { .. }));
        assert_eq!(panels[1].state, PanelState::NoRuns);
        match &panels[2].state {
            PanelState::Run { run } => {
                assert_eq!(run.display_status, DisplayStatus::Success);
                assert_eq!(run.duration.as_deref(), Some("4m 3s"));
                assert_eq!(run.started, "2024-01-01 00:00:00 UTC");
            }
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn panel_serializes_flat() {
        let panel = OrchestrationPanel {
            workflow: workflow("Empty", "o", "r", "empty.yml"),
            state: PanelState::NoRuns,
        };
        let value = serde_json::to_value(&panel).unwrap();
        assert_eq!(value["state"], "no_runs");
        assert_eq!(value["workflow_id"], "empty.yml");
        assert_eq!(value["title"], "Empty");
    }

    #[tokio::test]
    async fn history_panels_list_runs_and_isolate_failures() {
        let mut older = completed_run();
        older.run_number = Some(11);
        older.conclusion = Some("failure".into());
        older.run_started_at = None;

        let mut histories = HashMap::new();
        histories.insert("audit.yml".to_string(), Ok(vec![completed_run(), older]));
        histories.insert(
            "broken.yml".to_string(),
            Err(DashboardError::RemoteFetchFailed {
                status: Some(403),
                body: "rate limited".into(),
            }),
        );
        let resolver = RunResolver::new(Arc::new(StubGithubClient {
            histories,
            ..Default::default()
        }));
        let workflows = vec![
            workflow("Audit Logs", "o", "r", "audit.yml"),
            workflow("Broken", "o", "r", "broken.yml"),
            workflow("Never run", "o", "r", "new.yml"),
        ];

        let panels = history_panels(&resolver, &workflows, 10).await;
        let HistoryState::Runs { runs } = &panels[0].state else {
            panic!("expected runs");
        };
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].run_number, Some(12));
        assert_eq!(runs[0].duration.as_deref(), Some("4m 3s"));
        assert_eq!(runs[0].duration_seconds, Some(243));
        assert_eq!(runs[0].started, "2024-01-01 00:00:00 UTC");
        assert_eq!(runs[1].display_status, DisplayStatus::Failed);
        assert_eq!(runs[1].duration, None);
        assert_eq!(runs[1].started, "unknown");
        assert!(matches!(panels[1].state, HistoryState::Error { .. }));
        assert_eq!(panels[2].state, HistoryState::Runs { runs: Vec::new() });
    }

    #[tokio::test]
    async fn history_respects_limit() {
        let mut histories = HashMap::new();
        histories.insert("audit.yml".to_string(), Ok(vec![completed_run(); 5]));
        let resolver = RunResolver::new(Arc::new(StubGithubClient {
            histories,
            ..Default::default()
        }));

        let panels = history_panels(&resolver, &[workflow("A", "o", "r", "audit.yml")], 3).await;
        let HistoryState::Runs { runs } = &panels[0].state else {
            panic!("expected runs");
        };
        assert_eq!(runs.len(), 3);
    }

    #[tokio::test]
    async fn stats_config_incomplete_skips_database() {
        let err = DashboardError::ConfigIncomplete {
            missing: vec!["PASSWORD".into()],
        };
        let page = stats_page(Err(&err), &DashboardLayout::default().tables).await;
        assert_eq!(
            page,
            StatsPage::ConfigIncomplete {
                missing: vec!["PASSWORD".into()]
            }
        );
    }

    #[tokio::test]
    async fn stats_connection_failure_skips_tables() {
        let source = Arc::new(MockMetricsSource {
            ping_error: Some(DashboardError::DbConnectionFailed("refused".into())),
            ..Default::default()
        });
        let reader = MetricsReader::new(source.clone(), "staging");

        let page = stats_page(Ok(&reader), &DashboardLayout::default().tables).await;
        assert!(matches!(page, StatsPage::ConnectionFailed { .. }));
        assert_eq!(source.query_count(), 1);
    }

    #[tokio::test]
    async fn stats_table_failure_is_isolated() {
        let loaded = TimeRange {
            earliest: Some(TimestampValue::Zoned(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())),
            latest: Some(TimestampValue::Zoned(Utc.with_ymd_and_hms(2024, 2, 1, 12, 30, 0).unwrap())),
        };
        let source = Arc::new(
            MockMetricsSource::default()
                .with_failing_table("stg_broken", "relation does not exist")
                .with_count("stg_ok", 1_500)
                .with_range("stg_ok", "loaded_at", loaded)
                .with_volume(
                    "stg_ok",
                    "loaded_at",
                    vec![
                        DailyCount { day: None, count: 3 },
                        metrics_tests::day(2024, 1, 1, 1_497),
                    ],
                ),
        );
        let reader = MetricsReader::new(source, "staging");
        let mut unbucketed = table("stg_plain", &[]);
        unbucketed.volume_column = None;
        let tables = vec![
            table("stg_broken", &["loaded_at"]),
            table("stg_ok", &["loaded_at", "created_at"]),
            unbucketed,
        ];

        let StatsPage::Ready { tables } = stats_page(Ok(&reader), &tables).await else {
            panic!("expected ready page");
        };
        assert!(matches!(tables[0].state, TableState::Error { .. }));
        match &tables[1].state {
            TableState::Metrics {
                row_count,
                ranges,
                volume,
            } => {
                assert_eq!(*row_count, 1_500);
                assert_eq!(ranges[0].label, "Loaded at range");
                assert_eq!(ranges[0].earliest, "2024-01-01 00:00:00 UTC");
                assert_eq!(ranges[0].latest, "2024-02-01 12:30:00 UTC");
                assert_eq!(ranges[1].earliest, "unknown");
                assert_eq!(ranges[1].latest, "unknown");
                let volume = volume.as_ref().unwrap();
                assert_eq!(volume.column, "loaded_at");
                assert_eq!(volume.days[0].day, "unknown");
                assert_eq!(volume.days[1].day, "2024-01-01");
                assert_eq!(volume.days[1].count, 1_497);
            }
            other => panic!("unexpected state: {other:?}"),
        }
        assert!(matches!(
            tables[2].state,
            TableState::Metrics { volume: None, .. }
        ));
    }
}
