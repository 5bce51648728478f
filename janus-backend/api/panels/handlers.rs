use axum::Json;
use axum::extract::State;

use crate::api::AppState;
use crate::dashboard::{self, HistoryPanel, OrchestrationPanel, StatsPage};

/// GET /api/orchestration — latest run of every configured workflow
pub(crate) async fn orchestration(State(state): State<AppState>) -> Json<Vec<OrchestrationPanel>> {
    let panels = dashboard::orchestration_panels(&state.resolver, &state.layout.workflows).await;
    Json(panels)
}

/// GET /api/history — recent runs of every history workflow
pub(crate) async fn history(State(state): State<AppState>) -> Json<Vec<HistoryPanel>> {
    let layout = &state.layout;
    let panels = dashboard::history_panels(&state.resolver, &layout.history, layout.history_limit).await;
    Json(panels)
}

/// GET /api/stats — database liveness plus per-table metrics
pub(crate) async fn stats(State(state): State<AppState>) -> Json<StatsPage> {
    let page = dashboard::stats_page(state.metrics.as_deref(), &state.layout.tables).await;
    Json(page)
}
