use brandscout_core::{CandidatePost, CoreError, InsertOutcome, MatchResult, NewOpportunity};
use chrono::Utc;
use database::Database;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Saved(i64),
    /// The post is already stored for this brand.
    AlreadyKnown,
    BelowThreshold,
}

/// Applies the brand's relevance threshold and the per-brand uniqueness key.
pub struct Ingestor {
    db: Arc<Database>,
}

impl Ingestor {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub async fn ingest(
        &self,
        brand_id: i64,
        post: CandidatePost,
        matched: MatchResult,
        min_relevance_score: u8,
    ) -> Result<IngestOutcome, CoreError> {
        let now = Utc::now();

        if matched.relevance_score < min_relevance_score {
            debug!(
                "Post {} scored {} below threshold {} for brand {}",
                post.post_id, matched.relevance_score, min_relevance_score, brand_id
            );
            self.db
                .touch_keywords(brand_id, &matched.matched_keyword_ids, now)
                .await?;
            return Ok(IngestOutcome::BelowThreshold);
        }

        let opportunity = NewOpportunity {
            brand_id,
            post,
            relevance_score: matched.relevance_score,
            opportunity_type: matched.opportunity_type,
            matched_keywords: matched.matched_keywords,
        };

        match self
            .db
            .insert_opportunity(&opportunity, &matched.matched_keyword_ids, now)
            .await?
        {
            InsertOutcome::Inserted(id) => Ok(IngestOutcome::Saved(id)),
            InsertOutcome::Duplicate => {
                self.db
                    .touch_keywords(brand_id, &matched.matched_keyword_ids, now)
                    .await?;
                Ok(IngestOutcome::AlreadyKnown)
            }
        }
    }
}
