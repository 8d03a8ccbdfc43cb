use crate::{corrupt, Database};
use brandscout_core::{CoreError, ScanRunRecord, ScanSummary};
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct ScanRunRow {
    scan_id: String,
    brand_id: i64,
    scan_trigger: String,
    status: String,
    candidates_examined: i64,
    found: i64,
    saved: i64,
    duplicates: i64,
    error_count: i64,
    message: String,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl TryFrom<ScanRunRow> for ScanRunRecord {
    type Error = CoreError;

    fn try_from(row: ScanRunRow) -> Result<Self, Self::Error> {
        Ok(ScanRunRecord {
            trigger: row
                .scan_trigger
                .parse()
                .map_err(|e| corrupt("scan_runs", e))?,
            status: row.status.parse().map_err(|e| corrupt("scan_runs", e))?,
            scan_id: row.scan_id,
            brand_id: row.brand_id,
            candidates_examined: row.candidates_examined,
            found: row.found,
            saved: row.saved,
            duplicates: row.duplicates,
            error_count: row.error_count,
            message: row.message,
            started_at: row.started_at,
            finished_at: row.finished_at,
        })
    }
}

impl Database {
    pub async fn record_scan_run(&self, summary: &ScanSummary) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO scan_runs (
                scan_id, brand_id, scan_trigger, status, candidates_examined, found, saved,
                duplicates, error_count, message, started_at, finished_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(summary.scan_id.to_string())
        .bind(summary.brand_id)
        .bind(summary.trigger.as_str())
        .bind(summary.status.as_str())
        .bind(summary.candidates_examined as i64)
        .bind(summary.found as i64)
        .bind(summary.saved as i64)
        .bind(summary.duplicates as i64)
        .bind(summary.error_count() as i64)
        .bind(summary.message())
        .bind(summary.started_at)
        .bind(summary.finished_at.unwrap_or_else(Utc::now))
        .execute(self.pool()?)
        .await?;
        Ok(())
    }

    pub async fn last_scan_started_at(
        &self,
        brand_id: i64,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT started_at FROM scan_runs WHERE brand_id = ?
             ORDER BY started_at DESC LIMIT 1",
        )
        .bind(brand_id)
        .fetch_optional(self.pool()?)
        .await?;
        Ok(row.map(|(at,)| at))
    }

    /// Most recent runs first.
    pub async fn scan_history(
        &self,
        brand_id: i64,
        limit: u32,
    ) -> Result<Vec<ScanRunRecord>, CoreError> {
        let rows: Vec<ScanRunRow> = sqlx::query_as(
            "SELECT scan_id, brand_id, scan_trigger, status, candidates_examined, found, saved,
                    duplicates, error_count, message, started_at, finished_at
             FROM scan_runs WHERE brand_id = ?
             ORDER BY started_at DESC LIMIT ?",
        )
        .bind(brand_id)
        .bind(limit.max(1) as i64)
        .fetch_all(self.pool()?)
        .await?;
        rows.into_iter().map(ScanRunRecord::try_from).collect()
    }
}
