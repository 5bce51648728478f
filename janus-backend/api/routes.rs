use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use hyper::StatusCode;
use hyper::header;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::AppState;
use super::middleware;
use crate::dashboard;
use crate::render;

pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new().route(
        "/",
        get(|| async {
            Json(json!({
                "status": "ok",
            }))
        }),
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(vec![header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/", get(text_page))
        .nest("/health", health_routes)
        .nest("/api", api_router())
        .fallback(not_found)
        .with_state(state)
        .layer(cors)
        .layer(axum::middleware::from_fn(middleware::strip_trailing_slash))
        .layer(axum::middleware::from_fn(
            middleware::enrich_current_span_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(middleware::request_span))
}

fn api_router() -> Router<AppState> {
    Router::new().merge(super::panels::router())
}

/// GET / — every page as plain text: orchestration, run history, stats.
#[tracing::instrument(skip_all)]
async fn text_page(State(state): State<AppState>) -> impl IntoResponse {
    let layout = &state.layout;
    let panels = dashboard::orchestration_panels(&state.resolver, &layout.workflows).await;
    let history =
        dashboard::history_panels(&state.resolver, &layout.history, layout.history_limit).await;
    let stats = dashboard::stats_page(state.metrics.as_deref(), &layout.tables).await;

    let body = format!(
        "{}\n{}\n{}",
        render::render_orchestration(&panels),
        render::render_history(&history),
        render::render_stats(&stats)
    );
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body)
}

async fn not_found(req: axum::extract::Request) -> impl IntoResponse {
    tracing::warn!("unhandled path: {}", req.uri());
    (StatusCode::NOT_FOUND, "Not Found")
}
