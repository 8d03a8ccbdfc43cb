use crate::{corrupt, decode_json_list, encode_json_list, Database};
use brandscout_core::{CoreError, Keyword, KeywordUpdate, NewKeyword};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;

const KEYWORD_COLUMNS: &str = "id, brand_id, term, subreddits, is_active, opportunity_count, \
                               last_scanned_at, created_at";

#[derive(Debug, FromRow)]
struct KeywordRow {
    id: i64,
    brand_id: i64,
    term: String,
    subreddits: String,
    is_active: bool,
    opportunity_count: i64,
    last_scanned_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<KeywordRow> for Keyword {
    type Error = CoreError;

    fn try_from(row: KeywordRow) -> Result<Self, Self::Error> {
        if row.term.trim().is_empty() {
            return Err(corrupt("keywords", format!("keyword {} has an empty term", row.id)));
        }
        Ok(Keyword {
            id: row.id,
            brand_id: row.brand_id,
            term: row.term,
            subreddits: decode_json_list("keywords", &row.subreddits)?,
            is_active: row.is_active,
            opportunity_count: row.opportunity_count,
            last_scanned_at: row.last_scanned_at,
            created_at: row.created_at,
        })
    }
}

impl Database {
    pub async fn add_keyword(&self, keyword: &NewKeyword) -> Result<Keyword, CoreError> {
        let subreddits = encode_json_list(&keyword.subreddits)?;
        let result = sqlx::query(
            "INSERT INTO keywords (brand_id, term, subreddits, is_active, created_at)
             VALUES (?, ?, ?, 1, ?)",
        )
        .bind(keyword.brand_id)
        .bind(&keyword.term)
        .bind(subreddits)
        .bind(Utc::now())
        .execute(self.pool()?)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => CoreError::invalid_input(
                format!("keyword '{}' is already registered for this brand", keyword.term),
            ),
            other => other.into(),
        })?;

        let id = result.last_insert_rowid();
        debug!("Added keyword {} ('{}') for brand {}", id, keyword.term, keyword.brand_id);
        self.get_keyword(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("keyword {}", id)))
    }

    pub async fn get_keyword(&self, id: i64) -> Result<Option<Keyword>, CoreError> {
        let row: Option<KeywordRow> =
            sqlx::query_as(&format!("SELECT {} FROM keywords WHERE id = ?", KEYWORD_COLUMNS))
                .bind(id)
                .fetch_optional(self.pool()?)
                .await?;
        row.map(Keyword::try_from).transpose()
    }

    pub async fn get_keywords(&self, brand_id: i64) -> Result<Vec<Keyword>, CoreError> {
        let rows: Vec<KeywordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM keywords WHERE brand_id = ? ORDER BY id",
            KEYWORD_COLUMNS
        ))
        .bind(brand_id)
        .fetch_all(self.pool()?)
        .await?;
        rows.into_iter().map(Keyword::try_from).collect()
    }

    pub async fn get_active_keywords(&self, brand_id: i64) -> Result<Vec<Keyword>, CoreError> {
        let rows: Vec<KeywordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM keywords WHERE brand_id = ? AND is_active = 1 ORDER BY id",
            KEYWORD_COLUMNS
        ))
        .bind(brand_id)
        .fetch_all(self.pool()?)
        .await?;
        rows.into_iter().map(Keyword::try_from).collect()
    }

    pub async fn update_keyword(&self, id: i64, update: &KeywordUpdate) -> Result<Keyword, CoreError> {
        if let Some(is_active) = update.is_active {
            sqlx::query("UPDATE keywords SET is_active = ? WHERE id = ?")
                .bind(is_active)
                .bind(id)
                .execute(self.pool()?)
                .await?;
        }
        self.get_keyword(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("keyword {}", id)))
    }

    /// Stored opportunities keep their matched-keyword snapshot.
    pub async fn delete_keyword(&self, id: i64) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM keywords WHERE id = ?")
            .bind(id)
            .execute(self.pool()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("keyword {}", id)));
        }
        debug!("Deleted keyword {}", id);
        Ok(())
    }

    /// Marks keywords as scanned without touching their counters.
    pub async fn touch_keywords(
        &self,
        brand_id: i64,
        keyword_ids: &[i64],
        scanned_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        if keyword_ids.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool()?.begin().await?;
        for id in keyword_ids {
            sqlx::query("UPDATE keywords SET last_scanned_at = ? WHERE id = ? AND brand_id = ?")
                .bind(scanned_at)
                .bind(id)
                .bind(brand_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn count_active_keywords(&self, brand_id: i64) -> Result<i64, CoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM keywords WHERE brand_id = ? AND is_active = 1")
                .bind(brand_id)
                .fetch_one(self.pool()?)
                .await?;
        Ok(count)
    }
}
