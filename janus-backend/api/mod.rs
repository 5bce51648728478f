pub mod middleware;
pub mod panels;
mod routes;

use axum::Router;
use std::sync::Arc;

use crate::dashboard::DashboardLayout;
use crate::error::DashboardError;
use crate::github::resolver::RunResolver;
use crate::metrics::MetricsReader;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<RunResolver>,
    /// The metrics reader, or the configuration error that prevented
    /// building one.
    pub metrics: Result<Arc<MetricsReader>, DashboardError>,
    pub layout: Arc<DashboardLayout>,
}

pub fn create_app(state: AppState) -> Router {
    routes::build_router(state)
}
