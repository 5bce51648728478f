pub mod handlers;

use axum::Router;
use axum::routing::get;

use crate::api::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orchestration", get(handlers::orchestration))
        .route("/history", get(handlers::history))
        .route("/stats", get(handlers::stats))
}
