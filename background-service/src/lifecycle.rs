use brandscout_core::{CoreError, Opportunity, OpportunityPage, OpportunityQuery, OpportunityStatus};
use chrono::Utc;
use database::Database;
use std::sync::Arc;
use tracing::info;

/// Review lifecycle: `pending` moves to `completed` or `dismissed` and never back.
pub struct LifecycleController {
    db: Arc<Database>,
}

impl LifecycleController {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Re-applying the current status is a no-op. Switching between the two
    /// terminal statuses overwrites the previous one.
    pub async fn update_status(
        &self,
        id: i64,
        status: OpportunityStatus,
    ) -> Result<Opportunity, CoreError> {
        if !status.is_terminal() {
            return Err(CoreError::invalid_input(
                "opportunities cannot be moved back to pending",
            ));
        }
        let opportunity = self
            .db
            .update_opportunity_status(id, status, Utc::now())
            .await?;
        info!("Opportunity {} is now {}", id, opportunity.status);
        Ok(opportunity)
    }

    pub async fn mark_completed(&self, id: i64) -> Result<Opportunity, CoreError> {
        self.update_status(id, OpportunityStatus::Completed).await
    }

    pub async fn dismiss(&self, id: i64) -> Result<Opportunity, CoreError> {
        self.update_status(id, OpportunityStatus::Dismissed).await
    }

    pub async fn get(&self, id: i64) -> Result<Opportunity, CoreError> {
        self.db
            .get_opportunity(id)
            .await?
            .ok_or_else(|| CoreError::not_found(format!("opportunity {}", id)))
    }

    pub async fn list(&self, query: &OpportunityQuery) -> Result<OpportunityPage, CoreError> {
        self.db.list_opportunities(query).await
    }
}
