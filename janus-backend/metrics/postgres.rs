use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Connection, PgConnection, Row};
use tokio::sync::Mutex;

use super::identifier::{Identifier, QualifiedTable};
use super::{DailyCount, MetricsSource, TimeRange, TimestampValue};
use crate::config::DbConfig;
use crate::error::{DashboardError, Result};

/// [`MetricsSource`] over a single long-lived Postgres connection.
///
/// The connection is opened on first use and reused afterwards. After a
/// failed statement the session is rolled back; if that fails as well the
/// connection is dropped and reopened on the next call.
pub struct PgMetricsSource {
    options: PgConnectOptions,
    host: String,
    conn: Mutex<Option<PgConnection>>,
}

impl PgMetricsSource {
    pub fn new(config: &DbConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .database(&config.dbname)
            .username(&config.user)
            .password(&config.password)
            .application_name("janus");
        Self::with_options(options)
    }

    fn with_options(options: PgConnectOptions) -> Self {
        Self {
            host: options.get_host().to_string(),
            options,
            conn: Mutex::new(None),
        }
    }

    async fn connection<'a>(&self, slot: &'a mut Option<PgConnection>) -> Result<&'a mut PgConnection> {
        let conn = match slot.take() {
            Some(conn) => conn,
            None => {
                tracing::info!(host = %self.host, "opening database connection");
                PgConnection::connect_with(&self.options).await.map_err(|e| {
                    tracing::error!(host = %self.host, error = %e, "database connection failed");
                    DashboardError::DbConnectionFailed(e.to_string())
                })?
            }
        };
        Ok(slot.insert(conn))
    }
}

/// A session whose open transaction can be abandoned.
#[async_trait]
trait Rollback: Send {
    async fn rollback_session(&mut self) -> std::result::Result<(), sqlx::Error>;
}

#[async_trait]
impl Rollback for PgConnection {
    async fn rollback_session(&mut self) -> std::result::Result<(), sqlx::Error> {
        sqlx::Executor::execute(self, "ROLLBACK").await.map(|_| ())
    }
}

/// Pass `result` through, rolling the session back first when it is an
/// error. A session that cannot be rolled back is dropped from `slot`.
async fn settle<C: Rollback, T>(
    slot: &mut Option<C>,
    result: std::result::Result<T, sqlx::Error>,
) -> std::result::Result<T, sqlx::Error> {
    if result.is_err() {
        recover(slot).await;
    }
    result
}

async fn recover<C: Rollback>(slot: &mut Option<C>) {
    let Some(conn) = slot.as_mut() else {
        return;
    };
    if let Err(e) = conn.rollback_session().await {
        tracing::warn!(error = %e, "rollback failed, discarding connection");
        *slot = None;
    }
}

fn decode_bound(row: &PgRow, index: usize) -> std::result::Result<Option<TimestampValue>, sqlx::Error> {
    if let Ok(value) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return Ok(value.map(TimestampValue::Zoned));
    }
    if let Ok(value) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return Ok(value.map(TimestampValue::Naive));
    }
    if let Ok(value) = row.try_get::<Option<NaiveDate>, _>(index) {
        return Ok(value.map(TimestampValue::Date));
    }
    row.try_get::<Option<String>, _>(index)
        .map(|value| value.map(TimestampValue::Text))
}

fn decode_range(row: Option<PgRow>) -> std::result::Result<TimeRange, sqlx::Error> {
    let Some(row) = row else {
        return Ok(TimeRange::default());
    };
    Ok(TimeRange {
        earliest: decode_bound(&row, 0)?,
        latest: decode_bound(&row, 1)?,
    })
}

fn query_failed(table: &QualifiedTable, e: sqlx::Error) -> DashboardError {
    DashboardError::QueryFailed {
        table: table.table.as_str().to_string(),
        message: e.to_string(),
    }
}

#[async_trait]
impl MetricsSource for PgMetricsSource {
    async fn ping(&self) -> Result<()> {
        let mut slot = self.conn.lock().await;
        let conn = self.connection(&mut slot).await?;
        let probe = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&mut *conn).await;
        if let Err(e) = settle(&mut *slot, probe).await {
            tracing::error!(error = %e, "database liveness probe failed");
            return Err(DashboardError::DbConnectionFailed(e.to_string()));
        }
        Ok(())
    }

    async fn row_count(&self, table: &QualifiedTable) -> Result<u64> {
        let sql = table.count_sql();
        let mut slot = self.conn.lock().await;
        let conn = self.connection(&mut slot).await?;
        let result = sqlx::query_scalar::<_, i64>(&sql).fetch_one(&mut *conn).await;
        match settle(&mut *slot, result).await {
            Ok(count) => Ok(u64::try_from(count).unwrap_or_default()),
            Err(e) => {
                tracing::warn!(table = %table, error = %e, "row count query failed");
                Err(query_failed(table, e))
            }
        }
    }

    async fn range(&self, table: &QualifiedTable, column: &Identifier) -> Result<TimeRange> {
        let sql = table.range_sql(column);
        let mut slot = self.conn.lock().await;
        let conn = self.connection(&mut slot).await?;
        let result = sqlx::query(&sql)
            .fetch_optional(&mut *conn)
            .await
            .and_then(decode_range);
        match settle(&mut *slot, result).await {
            Ok(range) => Ok(range),
            Err(e) => {
                tracing::warn!(table = %table, column = %column, error = %e, "range query failed");
                Err(query_failed(table, e))
            }
        }
    }

    async fn count_by_date(&self, table: &QualifiedTable, column: &Identifier) -> Result<Vec<DailyCount>> {
        let sql = table.count_by_date_sql(column);
        let mut slot = self.conn.lock().await;
        let conn = self.connection(&mut slot).await?;
        let result = sqlx::query_as::<_, (Option<NaiveDate>, i64)>(&sql)
            .fetch_all(&mut *conn)
            .await;
        match settle(&mut *slot, result).await {
            Ok(rows) => Ok(rows
                .into_iter()
                .map(|(day, count)| DailyCount {
                    day,
                    count: u64::try_from(count).unwrap_or_default(),
                })
                .collect()),
            Err(e) => {
                tracing::warn!(table = %table, column = %column, error = %e, "daily volume query failed");
                Err(query_failed(table, e))
            }
        }
    }

    async fn close(&self) {
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "error closing database connection");
            } else {
                tracing::info!(host = %self.host, "database connection closed");
            }
        }
    }
}
