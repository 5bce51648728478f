mod api;
mod cache;
mod config;
mod dashboard;
mod error;
mod format;
mod github;
mod metrics;
mod render;
mod status;

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::Request;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sentry::integrations::tower::{NewSentryLayer, SentryHttpLayer};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::dashboard::DashboardLayout;
use crate::error::DashboardError;
use crate::github::client::{GithubClient, HttpGithubClient, build_http_client};
use crate::github::resolver::RunResolver;
use crate::metrics::MetricsReader;
use crate::metrics::postgres::PgMetricsSource;

#[derive(Parser)]
#[command(name = "janus", about = "Pipeline status and staging-table freshness dashboard")]
struct Cli {
    /// Dashboard layout file (YAML); overrides JANUS_DASHBOARD
    #[arg(long, global = true)]
    dashboard: Option<PathBuf>,

    /// Defaults to `serve`
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Start the HTTP server
    #[command(alias = "run")]
    Serve,
    /// Print the latest run of every configured workflow
    Orchestration,
    /// Print recent runs of the history workflows
    History,
    /// Print database liveness and staging-table metrics
    Stats,
}

/// Long-lived handles owned by `main` and released on shutdown.
struct Resources {
    resolver: Arc<RunResolver>,
    metrics: Result<Arc<MetricsReader>, DashboardError>,
    layout: Arc<DashboardLayout>,
}

impl Resources {
    fn build(config: &Config, dashboard: Option<PathBuf>) -> Result<Self> {
        let layout_path = dashboard.or_else(|| config.dashboard_path.clone());
        let layout = DashboardLayout::load_or_default(layout_path.as_deref())
            .context("failed to load dashboard layout")?;

        let http_client = build_http_client().context("failed to build HTTP client")?;
        let github = HttpGithubClient::new(
            http_client,
            config.github_token.clone(),
            config.github_api_url.clone(),
        );
        if !github.is_authenticated() {
            tracing::warn!("GITHUB_TOKEN not set, using unauthenticated GitHub requests");
        }
        let github: Arc<dyn GithubClient> = Arc::new(github);

        let metrics = config.db.validate().map(|()| {
            let source = Arc::new(PgMetricsSource::new(&config.db));
            Arc::new(MetricsReader::new(source, config.db.schema_staging.clone()))
        });
        if let Err(e) = &metrics {
            tracing::warn!(error = %e, "database settings incomplete, stats page disabled");
        }

        Ok(Self {
            resolver: Arc::new(RunResolver::new(github)),
            metrics,
            layout: Arc::new(layout),
        })
    }

    async fn shutdown(&self) {
        if let Ok(reader) = &self.metrics {
            reader.close().await;
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("janus=info,tower_http=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true).with_bracketed_fields(false))
        .with(sentry::integrations::tracing::layer().event_filter(
            |metadata| match *metadata.level() {
                tracing::Level::ERROR => sentry::integrations::tracing::EventFilter::Event,
                tracing::Level::WARN | tracing::Level::INFO => {
                    sentry::integrations::tracing::EventFilter::Breadcrumb
                }
                _ => sentry::integrations::tracing::EventFilter::Ignore,
            },
        ))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env();
    init_tracing();

    let _guard = sentry::init((
        config.sentry_dsn.clone().unwrap_or_default(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.environment.clone().into()),
            traces_sample_rate: 0.2,
            ..Default::default()
        },
    ));

    let resources = Resources::build(&config, cli.dashboard)?;
    let layout = &resources.layout;
    let result = match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&config, &resources).await,
        Command::Orchestration => {
            let panels = dashboard::orchestration_panels(&resources.resolver, &layout.workflows).await;
            print!("{}", render::render_orchestration(&panels));
            Ok(())
        }
        Command::History => {
            let panels =
                dashboard::history_panels(&resources.resolver, &layout.history, layout.history_limit)
                    .await;
            print!("{}", render::render_history(&panels));
            Ok(())
        }
        Command::Stats => {
            let page = dashboard::stats_page(resources.metrics.as_deref(), &layout.tables).await;
            print!("{}", render::render_stats(&page));
            Ok(())
        }
    };
    resources.shutdown().await;
    result
}

async fn run_server(config: &Config, resources: &Resources) -> Result<()> {
    let app_state = api::AppState {
        resolver: resources.resolver.clone(),
        metrics: resources.metrics.clone(),
        layout: resources.layout.clone(),
    };

    let app = api::create_app(app_state)
        .layer(SentryHttpLayer::new().enable_transaction())
        .layer(NewSentryLayer::<Request<Body>>::new_from_top());

    let port = config.port;
    let addr = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");
    println!("Listening on http://{addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
