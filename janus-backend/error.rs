/// Errors surfaced by the dashboard panels.
///
/// Each panel or table maps its own failure into one of these variants so
/// the page can keep rendering the remaining panels. An empty workflow is
/// not an error: `fetch_latest_run` returns `Ok(None)` for it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("missing configuration: {}", missing.join(", "))]
    ConfigIncomplete { missing: Vec<String> },

    #[error("{}", remote_fetch_message(*status, body))]
    RemoteFetchFailed { status: Option<u16>, body: String },

    #[error("database connection failed: {0}")]
    DbConnectionFailed(String),

    #[error("query failed for {table}: {message}")]
    QueryFailed { table: String, message: String },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("dashboard file: {0}")]
    DashboardFile(String),
}

fn remote_fetch_message(status: Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("GitHub API error {code}: {body}"),
        None => format!("GitHub request failed: {body}"),
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_incomplete_lists_missing_names() {
        let err = DashboardError::ConfigIncomplete {
            missing: vec!["DBNAME".into(), "PASSWORD".into()],
        };
        assert_eq!(err.to_string(), "missing configuration: DBNAME, PASSWORD");
    }

    #[test]
    fn remote_fetch_with_status_displays_code_and_body() {
        let err = DashboardError::RemoteFetchFailed {
            status: Some(404),
            body: "{\"message\":\"Not Found\"}".into(),
        };
        assert_eq!(
            err.to_string(),
            "GitHub API error 404: {\"message\":\"Not Found\"}"
        );
    }

    #[test]
    fn remote_fetch_without_status_is_transport_failure() {
        let err = DashboardError::RemoteFetchFailed {
            status: None,
            body: "operation timed out".into(),
        };
        assert_eq!(err.to_string(), "GitHub request failed: operation timed out");
    }

    #[test]
    fn query_failed_names_table() {
        let err = DashboardError::QueryFailed {
            table: "stg_klt__kobo_asset".into(),
            message: "relation does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "query failed for stg_klt__kobo_asset: relation does not exist"
        );
    }

    #[test]
    fn db_connection_and_identifier_display() {
        assert_eq!(
            DashboardError::DbConnectionFailed("connection refused".into()).to_string(),
            "database connection failed: connection refused"
        );
        assert_eq!(
            DashboardError::InvalidIdentifier("empty identifier".into()).to_string(),
            "invalid identifier: empty identifier"
        );
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DashboardError>();
    }
}
