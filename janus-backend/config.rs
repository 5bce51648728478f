use std::path::PathBuf;

use crate::error::{DashboardError, Result};
use crate::github::client::GITHUB_API;

/// Process configuration loaded from environment variables.
pub struct Config {
    pub port: u16,
    pub sentry_dsn: Option<String>,
    pub environment: String,
    pub github_token: Option<String>,
    pub github_api_url: String,
    pub dashboard_path: Option<PathBuf>,
    pub db: DbConfig,
}

/// Analytical database settings. All five values are required before any
/// connection is attempted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub dbname: String,
    pub user: String,
    pub password: String,
    pub schema_staging: String,
}

impl DbConfig {
    /// Names of the environment variables that are empty.
    pub fn missing(&self) -> Vec<String> {
        [
            ("DBNAME", &self.dbname),
            ("HOST", &self.host),
            ("DB_USER", &self.user),
            ("PASSWORD", &self.password),
            ("SCHEMA_STAGING", &self.schema_staging),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name.to_string())
        .collect()
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DashboardError::ConfigIncomplete { missing })
        }
    }
}

/// Raw environment values, as strings, before defaults are applied.
#[derive(Default)]
pub struct RawEnv<'a> {
    pub port: Option<&'a str>,
    pub sentry_dsn: Option<&'a str>,
    pub environment: Option<&'a str>,
    pub github_token: Option<&'a str>,
    pub gh_token: Option<&'a str>,
    pub github_api_url: Option<&'a str>,
    pub dashboard_path: Option<&'a str>,
    pub db_host: Option<&'a str>,
    pub db_name: Option<&'a str>,
    pub db_user: Option<&'a str>,
    pub db_password: Option<&'a str>,
    pub schema_staging: Option<&'a str>,
}

impl Config {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok();
        let (port, sentry_dsn, environment) = (var("PORT"), var("SENTRY_DSN"), var("ENVIRONMENT"));
        let (github_token, gh_token, github_api_url) =
            (var("GITHUB_TOKEN"), var("GH_TOKEN"), var("GITHUB_API_URL"));
        let dashboard_path = var("JANUS_DASHBOARD");
        let (db_host, db_name, db_user) = (var("HOST"), var("DBNAME"), var("DB_USER"));
        let (db_password, schema_staging) = (var("PASSWORD"), var("SCHEMA_STAGING"));

        Self::from_raw_values(RawEnv {
            port: port.as_deref(),
            sentry_dsn: sentry_dsn.as_deref(),
            environment: environment.as_deref(),
            github_token: github_token.as_deref(),
            gh_token: gh_token.as_deref(),
            github_api_url: github_api_url.as_deref(),
            dashboard_path: dashboard_path.as_deref(),
            db_host: db_host.as_deref(),
            db_name: db_name.as_deref(),
            db_user: db_user.as_deref(),
            db_password: db_password.as_deref(),
            schema_staging: schema_staging.as_deref(),
        })
    }

    /// Build a Config from raw string values (as they would come from env vars).
    /// Used directly in tests to avoid mutating process-global environment.
    pub fn from_raw_values(raw: RawEnv<'_>) -> Self {
        let non_empty = |v: Option<&str>| v.filter(|s| !s.is_empty()).map(String::from);

        let port = raw.port.and_then(|v| v.parse().ok()).unwrap_or(8081);

        let environment = non_empty(raw.environment).unwrap_or_else(|| "local".to_string());

        let github_token = non_empty(raw.github_token).or_else(|| non_empty(raw.gh_token));

        let github_api_url = non_empty(raw.github_api_url).unwrap_or_else(|| GITHUB_API.to_string());

        Config {
            port,
            sentry_dsn: non_empty(raw.sentry_dsn),
            environment,
            github_token,
            github_api_url,
            dashboard_path: non_empty(raw.dashboard_path).map(PathBuf::from),
            db: DbConfig {
                host: raw.db_host.unwrap_or_default().to_string(),
                dbname: raw.db_name.unwrap_or_default().to_string(),
                user: raw.db_user.unwrap_or_default().to_string(),
                password: raw.db_password.unwrap_or_default().to_string(),
                schema_staging: raw.schema_staging.unwrap_or_default().to_string(),
            },
        }
    }
}
