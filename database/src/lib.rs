//! SQLite persistence for keywords, settings, opportunities and scan runs.
//!
//! Every write is scoped by brand id. The `(platform, post_id, brand_id)`
//! unique key on `opportunities` is what keeps ingestion idempotent across
//! overlapping scans.

use brandscout_core::{CoreError, DatabaseError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

mod keywords;
mod opportunities;
mod scan_runs;
mod settings;
mod watermarks;


pub use watermarks::SearchWatermarks;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: format!("invalid database url: {}", e),
            })?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to database {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }

    pub(crate) fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFailed {
                reason: "database not connected".to_string(),
            }
            .into()
        })
    }

    /// Brands with any configuration: a settings row or an active keyword.
    pub async fn active_brand_ids(&self) -> Result<Vec<i64>, CoreError> {
        let ids: Vec<(i64,)> = sqlx::query_as(
            "SELECT brand_id FROM brand_settings
             UNION
             SELECT brand_id FROM keywords WHERE is_active = 1
             ORDER BY 1",
        )
        .fetch_all(self.pool()?)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Removes every row belonging to a brand.
    pub async fn delete_brand(&self, brand_id: i64) -> Result<(), CoreError> {
        let mut tx = self.pool()?.begin().await?;
        sqlx::query(
            "DELETE FROM search_watermarks
             WHERE keyword_id IN (SELECT id FROM keywords WHERE brand_id = ?)",
        )
        .bind(brand_id)
        .execute(&mut *tx)
        .await?;
        for table in ["opportunities", "keywords", "brand_settings", "scan_runs"] {
            sqlx::query(&format!("DELETE FROM {} WHERE brand_id = ?", table))
                .bind(brand_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        info!("Deleted all data for brand {}", brand_id);
        Ok(())
    }
}

pub(crate) fn corrupt(table: &str, details: impl ToString) -> CoreError {
    DatabaseError::CorruptRow {
        table: table.to_string(),
        details: details.to_string(),
    }
    .into()
}

pub(crate) fn decode_json_list(table: &str, raw: &str) -> Result<Vec<String>, CoreError> {
    serde_json::from_str(raw).map_err(|e| corrupt(table, e))
}

pub(crate) fn encode_json_list(values: &[String]) -> Result<String, CoreError> {
    Ok(serde_json::to_string(values)?)
}
