use crate::Database;
use brandscout_core::CoreError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const PLATFORM_WIDE: &str = "";

/// Per-query search positions for one brand. A query missing from the map has
/// never completed.
#[derive(Debug, Clone, Default)]
pub struct SearchWatermarks {
    positions: HashMap<(i64, String), DateTime<Utc>>,
}

impl SearchWatermarks {
    pub fn get(&self, keyword_id: i64, subreddit: Option<&str>) -> Option<DateTime<Utc>> {
        let key = (keyword_id, subreddit.unwrap_or(PLATFORM_WIDE).to_string());
        self.positions.get(&key).copied()
    }
}

impl Database {
    pub async fn search_watermarks(&self, brand_id: i64) -> Result<SearchWatermarks, CoreError> {
        let rows: Vec<(i64, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT w.keyword_id, w.subreddit, w.searched_until
             FROM search_watermarks w
             JOIN keywords k ON k.id = w.keyword_id
             WHERE k.brand_id = ?",
        )
        .bind(brand_id)
        .fetch_all(self.pool()?)
        .await?;

        Ok(SearchWatermarks {
            positions: rows
                .into_iter()
                .map(|(keyword_id, subreddit, at)| ((keyword_id, subreddit), at))
                .collect(),
        })
    }

    /// Marks a keyword query as fully searched up to `searched_until`. Only
    /// called once every post the query returned has been ingested.
    pub async fn advance_search_watermark(
        &self,
        keyword_id: i64,
        subreddit: Option<&str>,
        searched_until: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO search_watermarks (keyword_id, subreddit, searched_until)
             VALUES (?, ?, ?)
             ON CONFLICT(keyword_id, subreddit) DO UPDATE SET
                searched_until = excluded.searched_until",
        )
        .bind(keyword_id)
        .bind(subreddit.unwrap_or(PLATFORM_WIDE))
        .bind(searched_until)
        .execute(self.pool()?)
        .await?;
        Ok(())
    }
}
