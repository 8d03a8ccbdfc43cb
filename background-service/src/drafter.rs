use brandscout_core::{CoreError, LlmError, Opportunity, Settings};
use database::Database;
use llm_interface::{build_reply_request, clean_reply, TextGenerator};
use std::sync::Arc;
use tracing::{debug, info};

/// Produces the single-slot suggested reply stored on an opportunity.
pub struct CommentDrafter {
    db: Arc<Database>,
    generator: Option<Arc<dyn TextGenerator>>,
    max_words: u32,
}

impl CommentDrafter {
    pub fn new(db: Arc<Database>, generator: Option<Arc<dyn TextGenerator>>, max_words: u32) -> Self {
        Self {
            db,
            generator,
            max_words,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Drafts a reply regardless of the brand's auto-draft flag, replacing any
    /// previous draft.
    pub async fn draft(&self, opportunity_id: i64) -> Result<Opportunity, CoreError> {
        let opportunity = self
            .db
            .get_opportunity(opportunity_id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("opportunity {}", opportunity_id)))?;
        let settings = self.db.get_settings(opportunity.brand_id).await?;
        self.draft_for(&opportunity, &settings).await
    }

    pub(crate) async fn draft_for(
        &self,
        opportunity: &Opportunity,
        settings: &Settings,
    ) -> Result<Opportunity, CoreError> {
        let generator = self.generator.as_ref().ok_or(LlmError::NotConfigured)?;
        let request = build_reply_request(opportunity, settings, self.max_words);

        debug!(
            "Requesting draft for opportunity {} from {}",
            opportunity.id,
            generator.name()
        );
        let raw = generator.generate(&request).await?;
        let reply = clean_reply(&raw, self.max_words).ok_or_else(|| {
            LlmError::InvalidResponseFormat {
                provider: generator.name().to_string(),
            }
        })?;

        let updated = self
            .db
            .set_suggested_comment(opportunity.id, &reply, settings.comment_tone)
            .await?;
        info!(
            "Drafted {} reply for opportunity {}",
            settings.comment_tone, opportunity.id
        );
        Ok(updated)
    }
}
