pub mod identifier;
pub mod postgres;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::sync::Mutex;

use crate::cache::TtlCache;
use crate::error::Result;
use crate::format::format_timestamp;
use identifier::{Identifier, QualifiedTable};

pub const METRICS_CACHE_TTL: Duration = Duration::from_secs(60);

/// A MIN/MAX bound as decoded from the column's SQL type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampValue {
    Zoned(DateTime<Utc>),
    Naive(NaiveDateTime),
    Date(NaiveDate),
    Text(String),
}

impl TimestampValue {
    pub fn display(&self) -> String {
        match self {
            TimestampValue::Zoned(v) => format!("{} UTC", v.format("%Y-%m-%d %H:%M:%S")),
            TimestampValue::Naive(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
            TimestampValue::Date(v) => v.format("%Y-%m-%d 00:00:00").to_string(),
            TimestampValue::Text(v) => format_timestamp(Some(v)),
        }
    }
}

/// `unknown` for an absent bound (empty table), otherwise the display form.
pub fn format_bound(value: Option<&TimestampValue>) -> String {
    value.map_or_else(|| "unknown".to_string(), TimestampValue::display)
}

/// Earliest and latest value of a column; both `None` for an empty table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub earliest: Option<TimestampValue>,
    pub latest: Option<TimestampValue>,
}

/// Number of rows whose column value falls on `day`. A `None` day groups
/// the rows where the column is NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyCount {
    pub day: Option<NaiveDate>,
    pub count: u64,
}

/// Read-only aggregate queries against the analytical store.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Liveness probe (`SELECT 1`).
    async fn ping(&self) -> Result<()>;
    async fn row_count(&self, table: &QualifiedTable) -> Result<u64>;
    async fn range(&self, table: &QualifiedTable, column: &Identifier) -> Result<TimeRange>;
    /// Rows per calendar day of `column`, oldest first.
    async fn count_by_date(&self, table: &QualifiedTable, column: &Identifier) -> Result<Vec<DailyCount>>;
    /// Release the underlying connection, if one was opened.
    async fn close(&self);
}

type ColumnKey = (QualifiedTable, Identifier);

/// Row-count, timestamp-range and daily-volume reader with a short-lived
/// result cache in front of a [`MetricsSource`]. The liveness probe is never
/// cached.
pub struct MetricsReader {
    source: Arc<dyn MetricsSource>,
    schema: String,
    counts: Mutex<TtlCache<QualifiedTable, u64>>,
    ranges: Mutex<TtlCache<ColumnKey, TimeRange>>,
    volumes: Mutex<TtlCache<ColumnKey, Vec<DailyCount>>>,
}

impl MetricsReader {
    pub fn new(source: Arc<dyn MetricsSource>, schema: impl Into<String>) -> Self {
        Self::with_ttl(source, schema, METRICS_CACHE_TTL)
    }

    pub fn with_ttl(source: Arc<dyn MetricsSource>, schema: impl Into<String>, ttl: Duration) -> Self {
        Self {
            source,
            schema: schema.into(),
            counts: Mutex::new(TtlCache::new(ttl)),
            ranges: Mutex::new(TtlCache::new(ttl)),
            volumes: Mutex::new(TtlCache::new(ttl)),
        }
    }

    /// Schema holding the staging tables.
    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub async fn check_connection(&self) -> Result<()> {
        self.source.ping().await
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_row_count(&self, schema: &str, table: &str) -> Result<u64> {
        let key = QualifiedTable::new(schema, table)?;
        if let Some(count) = self.counts.lock().await.get(&key) {
            tracing::debug!("row count cache hit");
            return Ok(count);
        }

        let count = self.source.row_count(&key).await?;
        self.counts.lock().await.insert(key, count);
        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_range(&self, schema: &str, table: &str, column: &str) -> Result<TimeRange> {
        let key = (QualifiedTable::new(schema, table)?, Identifier::new(column)?);
        if let Some(range) = self.ranges.lock().await.get(&key) {
            tracing::debug!("range cache hit");
            return Ok(range);
        }

        let range = self.source.range(&key.0, &key.1).await?;
        self.ranges.lock().await.insert(key, range.clone());
        Ok(range)
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_count_by_date(&self, schema: &str, table: &str, column: &str) -> Result<Vec<DailyCount>> {
        let key = (QualifiedTable::new(schema, table)?, Identifier::new(column)?);
        if let Some(days) = self.volumes.lock().await.get(&key) {
            tracing::debug!("daily volume cache hit");
            return Ok(days);
        }

        let days = self.source.count_by_date(&key.0, &key.1).await?;
        self.volumes.lock().await.insert(key, days.clone());
        Ok(days)
    }

    pub async fn close(&self) {
        self.source.close().await;
    }
}
