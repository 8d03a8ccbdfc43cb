use crate::{corrupt, decode_json_list, encode_json_list, Database};
use brandscout_core::{
    BrandStats, CommentTone, CoreError, InsertOutcome, NewOpportunity, Opportunity,
    OpportunityPage, OpportunityQuery, OpportunityStatus,
};
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::debug;

const OPPORTUNITY_COLUMNS: &str = "id, brand_id, platform, post_id, subreddit, title, \
                                   body_snippet, post_url, upvotes, comment_count, posted_at, \
                                   relevance_score, opportunity_type, matched_keywords, status, \
                                   suggested_comment, comment_tone, discovered_at, \
                                   status_updated_at";

#[derive(Debug, FromRow)]
struct OpportunityRow {
    id: i64,
    brand_id: i64,
    platform: String,
    post_id: String,
    subreddit: String,
    title: String,
    body_snippet: Option<String>,
    post_url: String,
    upvotes: i64,
    comment_count: i64,
    posted_at: DateTime<Utc>,
    relevance_score: i64,
    opportunity_type: String,
    matched_keywords: String,
    status: String,
    suggested_comment: Option<String>,
    comment_tone: Option<String>,
    discovered_at: DateTime<Utc>,
    status_updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<OpportunityRow> for Opportunity {
    type Error = CoreError;

    fn try_from(row: OpportunityRow) -> Result<Self, Self::Error> {
        let relevance_score = u8::try_from(row.relevance_score)
            .ok()
            .filter(|score| *score <= 100)
            .ok_or_else(|| {
                corrupt(
                    "opportunities",
                    format!("relevance_score {} on {}", row.relevance_score, row.id),
                )
            })?;
        let status: OpportunityStatus = row
            .status
            .parse()
            .map_err(|e| corrupt("opportunities", e))?;
        let comment_tone = row
            .comment_tone
            .as_deref()
            .map(str::parse::<CommentTone>)
            .transpose()
            .map_err(|e| corrupt("opportunities", e))?;

        Ok(Opportunity {
            id: row.id,
            brand_id: row.brand_id,
            platform: row.platform,
            post_id: row.post_id,
            subreddit: row.subreddit,
            title: row.title,
            body_snippet: row.body_snippet,
            post_url: row.post_url,
            upvotes: row.upvotes,
            comment_count: row.comment_count,
            posted_at: row.posted_at,
            relevance_score,
            opportunity_type: row.opportunity_type,
            matched_keywords: decode_json_list("opportunities", &row.matched_keywords)?,
            status,
            suggested_comment: row.suggested_comment,
            comment_tone,
            discovered_at: row.discovered_at,
            status_updated_at: row.status_updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct StatsRow {
    total: i64,
    pending: i64,
    completed: i64,
    dismissed: i64,
    reach: i64,
    drafted: i64,
}

impl Database {
    /// Stores a new opportunity unless `(platform, post_id, brand_id)` already
    /// exists. On insert the matched keywords' counters are bumped in the same
    /// transaction, so a duplicate never inflates them.
    pub async fn insert_opportunity(
        &self,
        opportunity: &NewOpportunity,
        keyword_ids: &[i64],
        discovered_at: DateTime<Utc>,
    ) -> Result<InsertOutcome, CoreError> {
        let post = &opportunity.post;
        let matched = encode_json_list(&opportunity.matched_keywords)?;
        let mut tx = self.pool()?.begin().await?;

        let result = sqlx::query(
            "INSERT INTO opportunities (
                brand_id, platform, post_id, subreddit, title, body_snippet, post_url,
                upvotes, comment_count, posted_at, relevance_score, opportunity_type,
                matched_keywords, status, discovered_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?)
             ON CONFLICT(platform, post_id, brand_id) DO NOTHING",
        )
        .bind(opportunity.brand_id)
        .bind(&post.platform)
        .bind(&post.post_id)
        .bind(&post.subreddit)
        .bind(&post.title)
        .bind(opportunity.body_snippet())
        .bind(&post.url)
        .bind(post.upvotes.max(0))
        .bind(post.comment_count.max(0))
        .bind(post.posted_at)
        .bind(opportunity.relevance_score.min(100) as i64)
        .bind(&opportunity.opportunity_type)
        .bind(matched)
        .bind(discovered_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(
                "Post {}/{} already stored for brand {}",
                post.platform, post.post_id, opportunity.brand_id
            );
            return Ok(InsertOutcome::Duplicate);
        }

        let id = result.last_insert_rowid();
        for keyword_id in keyword_ids {
            sqlx::query(
                "UPDATE keywords
                 SET opportunity_count = opportunity_count + 1, last_scanned_at = ?
                 WHERE id = ? AND brand_id = ?",
            )
            .bind(discovered_at)
            .bind(keyword_id)
            .bind(opportunity.brand_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        debug!(
            "Stored opportunity {} (post {}) for brand {} with score {}",
            id, post.post_id, opportunity.brand_id, opportunity.relevance_score
        );
        Ok(InsertOutcome::Inserted(id))
    }

    pub async fn get_opportunity(&self, id: i64) -> Result<Option<Opportunity>, CoreError> {
        let row: Option<OpportunityRow> = sqlx::query_as(&format!(
            "SELECT {} FROM opportunities WHERE id = ?",
            OPPORTUNITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool()?)
        .await?;
        row.map(Opportunity::try_from).transpose()
    }

    /// Newest first. The cursor is the last id of the previous page.
    pub async fn list_opportunities(
        &self,
        query: &OpportunityQuery,
    ) -> Result<OpportunityPage, CoreError> {
        let limit = query.effective_limit() as usize;
        let rows: Vec<OpportunityRow> = sqlx::query_as(&format!(
            "SELECT {} FROM opportunities
             WHERE brand_id = ?
               AND (? IS NULL OR status = ?)
               AND (? IS NULL OR id < ?)
             ORDER BY id DESC
             LIMIT ?",
            OPPORTUNITY_COLUMNS
        ))
        .bind(query.brand_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.cursor)
        .bind(query.cursor)
        .bind((limit + 1) as i64)
        .fetch_all(self.pool()?)
        .await?;

        let mut opportunities = rows
            .into_iter()
            .map(Opportunity::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let has_more = opportunities.len() > limit;
        opportunities.truncate(limit);
        let next_cursor = if has_more {
            opportunities.last().map(|o| o.id)
        } else {
            None
        };

        Ok(OpportunityPage {
            opportunities,
            has_more,
            next_cursor,
        })
    }

    /// Moves an opportunity to `status`. Re-applying the current status keeps
    /// the original `status_updated_at`.
    pub async fn update_opportunity_status(
        &self,
        id: i64,
        status: OpportunityStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<Opportunity, CoreError> {
        sqlx::query(
            "UPDATE opportunities SET status = ?, status_updated_at = ?
             WHERE id = ? AND status != ?",
        )
        .bind(status.as_str())
        .bind(updated_at)
        .bind(id)
        .bind(status.as_str())
        .execute(self.pool()?)
        .await?;

        self.get_opportunity(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("opportunity {}", id)))
    }

    pub async fn set_suggested_comment(
        &self,
        id: i64,
        comment: &str,
        tone: CommentTone,
    ) -> Result<Opportunity, CoreError> {
        let result = sqlx::query(
            "UPDATE opportunities SET suggested_comment = ?, comment_tone = ? WHERE id = ?",
        )
        .bind(comment)
        .bind(tone.as_str())
        .bind(id)
        .execute(self.pool()?)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("opportunity {}", id)));
        }

        self.get_opportunity(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("opportunity {}", id)))
    }

    pub async fn brand_stats(&self, brand_id: i64) -> Result<BrandStats, CoreError> {
        let row: StatsRow = sqlx::query_as(
            "SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'dismissed' THEN 1 ELSE 0 END), 0) AS dismissed,
                COALESCE(SUM(upvotes + comment_count), 0) AS reach,
                COALESCE(SUM(CASE WHEN suggested_comment IS NOT NULL THEN 1 ELSE 0 END), 0)
                    AS drafted
             FROM opportunities WHERE brand_id = ?",
        )
        .bind(brand_id)
        .fetch_one(self.pool()?)
        .await?;

        Ok(BrandStats {
            total: row.total,
            pending: row.pending,
            completed: row.completed,
            dismissed: row.dismissed,
            monitored_keywords: self.count_active_keywords(brand_id).await?,
            total_engagement_reach: row.reach,
            total_comments_drafted: row.drafted,
        })
    }
}
