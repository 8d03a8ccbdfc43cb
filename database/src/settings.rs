use crate::{corrupt, Database};
use brandscout_core::{CommentTone, CoreError, ScanFrequency, Settings, SettingsPatch};
use chrono::Utc;
use sqlx::{FromRow, SqliteConnection};
use tracing::info;

#[derive(Debug, FromRow)]
struct SettingsRow {
    brand_id: i64,
    is_enabled: bool,
    scan_frequency_hours: i64,
    min_relevance_score: i64,
    auto_generate_comments: bool,
    comment_tone: String,
    include_brand_mention: bool,
    brand_name: Option<String>,
    brand_description: Option<String>,
}

impl TryFrom<SettingsRow> for Settings {
    type Error = CoreError;

    fn try_from(row: SettingsRow) -> Result<Self, Self::Error> {
        let scan_frequency = u32::try_from(row.scan_frequency_hours)
            .ok()
            .and_then(|hours| ScanFrequency::try_from(hours).ok())
            .ok_or_else(|| {
                corrupt(
                    "brand_settings",
                    format!("scan_frequency_hours {}", row.scan_frequency_hours),
                )
            })?;
        let min_relevance_score = u8::try_from(row.min_relevance_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| {
                corrupt(
                    "brand_settings",
                    format!("min_relevance_score {}", row.min_relevance_score),
                )
            })?;
        let comment_tone: CommentTone = row
            .comment_tone
            .parse()
            .map_err(|e| corrupt("brand_settings", e))?;

        Ok(Settings {
            brand_id: row.brand_id,
            is_enabled: row.is_enabled,
            scan_frequency,
            min_relevance_score,
            auto_generate_comments: row.auto_generate_comments,
            comment_tone,
            include_brand_mention: row.include_brand_mention,
            brand_name: row.brand_name,
            brand_description: row.brand_description,
        })
    }
}

async fn fetch_settings(conn: &mut SqliteConnection, brand_id: i64) -> Result<Settings, CoreError> {
    let row: Option<SettingsRow> = sqlx::query_as(
        "SELECT brand_id, is_enabled, scan_frequency_hours, min_relevance_score,
                auto_generate_comments, comment_tone, include_brand_mention,
                brand_name, brand_description
         FROM brand_settings WHERE brand_id = ?",
    )
    .bind(brand_id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => Settings::try_from(row),
        None => Ok(Settings::defaults_for(brand_id)),
    }
}

async fn upsert_settings(conn: &mut SqliteConnection, settings: &Settings) -> Result<(), CoreError> {
    sqlx::query(
        "INSERT INTO brand_settings (
            brand_id, is_enabled, scan_frequency_hours, min_relevance_score,
            auto_generate_comments, comment_tone, include_brand_mention,
            brand_name, brand_description, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(brand_id) DO UPDATE SET
            is_enabled = excluded.is_enabled,
            scan_frequency_hours = excluded.scan_frequency_hours,
            min_relevance_score = excluded.min_relevance_score,
            auto_generate_comments = excluded.auto_generate_comments,
            comment_tone = excluded.comment_tone,
            include_brand_mention = excluded.include_brand_mention,
            brand_name = excluded.brand_name,
            brand_description = excluded.brand_description,
            updated_at = excluded.updated_at",
    )
    .bind(settings.brand_id)
    .bind(settings.is_enabled)
    .bind(settings.scan_frequency.hours() as i64)
    .bind(settings.min_relevance_score as i64)
    .bind(settings.auto_generate_comments)
    .bind(settings.comment_tone.as_str())
    .bind(settings.include_brand_mention)
    .bind(&settings.brand_name)
    .bind(&settings.brand_description)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl Database {
    /// Stored settings, or the documented defaults when the brand has none.
    pub async fn get_settings(&self, brand_id: i64) -> Result<Settings, CoreError> {
        let mut conn = self.pool()?.acquire().await?;
        fetch_settings(&mut conn, brand_id).await
    }

    pub async fn save_settings(&self, settings: &Settings) -> Result<(), CoreError> {
        let mut conn = self.pool()?.acquire().await?;
        upsert_settings(&mut conn, settings).await
    }

    /// Validates the patch against current settings and upserts the result in
    /// one transaction. An invalid field leaves the stored record untouched.
    pub async fn update_settings(
        &self,
        brand_id: i64,
        patch: &SettingsPatch,
    ) -> Result<Settings, CoreError> {
        let mut tx = self.pool()?.begin().await?;
        // Take the write lock before reading so concurrent patches apply in turn.
        sqlx::query("UPDATE brand_settings SET brand_id = brand_id WHERE brand_id = ?")
            .bind(brand_id)
            .execute(&mut *tx)
            .await?;
        let current = fetch_settings(&mut tx, brand_id).await?;
        let next = current.apply(patch)?;
        upsert_settings(&mut tx, &next).await?;
        tx.commit().await?;

        info!(
            "Updated settings for brand {}: enabled={}, every {}h, min score {}",
            brand_id,
            next.is_enabled,
            next.scan_frequency.hours(),
            next.min_relevance_score
        );
        Ok(next)
    }
}
