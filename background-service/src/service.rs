use crate::drafter::CommentDrafter;
use crate::lifecycle::LifecycleController;
use crate::scan::{ScanOptions, ScanOrchestrator};
use brandscout_core::{
    BrandStats, CoreError, Keyword, KeywordUpdate, NewKeyword, Opportunity, OpportunityPage,
    OpportunityQuery, OpportunityStatus, ScanRunRecord, ScanSummary, ScanTrigger, Settings,
    SettingsPatch,
};
use database::Database;
use llm_interface::TextGenerator;
use matching_engine::RelevanceScorer;
use reddit_client::PostSearch;
use std::sync::Arc;
use tracing::info;

/// Operations exposed to the dashboard and the CLI.
pub struct BrandScoutService {
    db: Arc<Database>,
    orchestrator: Arc<ScanOrchestrator>,
    drafter: Arc<CommentDrafter>,
    lifecycle: LifecycleController,
}

impl BrandScoutService {
    pub fn new(
        db: Arc<Database>,
        search: Arc<dyn PostSearch>,
        scorer: Arc<dyn RelevanceScorer>,
        generator: Option<Arc<dyn TextGenerator>>,
        max_words: u32,
        options: ScanOptions,
    ) -> Self {
        let drafter = Arc::new(CommentDrafter::new(Arc::clone(&db), generator, max_words));
        let orchestrator = Arc::new(ScanOrchestrator::new(
            Arc::clone(&db),
            search,
            scorer,
            Arc::clone(&drafter),
            options,
        ));
        Self {
            lifecycle: LifecycleController::new(Arc::clone(&db)),
            db,
            orchestrator,
            drafter,
        }
    }

    pub fn database(&self) -> Arc<Database> {
        Arc::clone(&self.db)
    }

    pub fn orchestrator(&self) -> Arc<ScanOrchestrator> {
        Arc::clone(&self.orchestrator)
    }

    pub async fn add_keyword(
        &self,
        brand_id: i64,
        term: &str,
        subreddits: &[String],
    ) -> Result<Keyword, CoreError> {
        let keyword = NewKeyword::new(brand_id, term, subreddits)?;
        let stored = self.db.add_keyword(&keyword).await?;
        info!("Brand {} now monitors '{}'", brand_id, stored.term);
        Ok(stored)
    }

    pub async fn update_keyword(&self, id: i64, update: &KeywordUpdate) -> Result<Keyword, CoreError> {
        self.db.update_keyword(id, update).await
    }

    pub async fn delete_keyword(&self, id: i64) -> Result<(), CoreError> {
        self.db.delete_keyword(id).await
    }

    pub async fn get_keywords(&self, brand_id: i64) -> Result<Vec<Keyword>, CoreError> {
        self.db.get_keywords(brand_id).await
    }

    pub async fn get_settings(&self, brand_id: i64) -> Result<Settings, CoreError> {
        self.db.get_settings(brand_id).await
    }

    pub async fn update_settings(
        &self,
        brand_id: i64,
        patch: &SettingsPatch,
    ) -> Result<Settings, CoreError> {
        self.db.update_settings(brand_id, patch).await
    }

    /// Manual scan. Honours the brand's enabled flag like a scheduled one.
    pub async fn trigger_scan(&self, brand_id: i64) -> Result<ScanSummary, CoreError> {
        self.orchestrator
            .run_scan(brand_id, ScanTrigger::Manual)
            .await
    }

    pub fn cancel_scan(&self, brand_id: i64) -> bool {
        self.orchestrator.cancel(brand_id)
    }

    pub async fn scan_history(
        &self,
        brand_id: i64,
        limit: u32,
    ) -> Result<Vec<ScanRunRecord>, CoreError> {
        self.db.scan_history(brand_id, limit).await
    }

    pub async fn get_opportunities(
        &self,
        query: &OpportunityQuery,
    ) -> Result<OpportunityPage, CoreError> {
        self.lifecycle.list(query).await
    }

    pub async fn get_opportunity(&self, id: i64) -> Result<Opportunity, CoreError> {
        self.lifecycle.get(id).await
    }

    pub async fn update_opportunity_status(
        &self,
        id: i64,
        status: OpportunityStatus,
    ) -> Result<Opportunity, CoreError> {
        self.lifecycle.update_status(id, status).await
    }

    /// Always permitted, whatever the brand's auto-draft flag says.
    pub async fn generate_comment(&self, opportunity_id: i64) -> Result<Opportunity, CoreError> {
        self.drafter.draft(opportunity_id).await
    }

    pub async fn get_stats(&self, brand_id: i64) -> Result<BrandStats, CoreError> {
        self.db.brand_stats(brand_id).await
    }

    /// Deletes everything stored for a brand. Refused while it is being scanned.
    pub async fn purge_brand(&self, brand_id: i64) -> Result<(), CoreError> {
        if self.orchestrator.is_running(brand_id) {
            return Err(CoreError::ScanInProgress { brand_id });
        }
        self.db.delete_brand(brand_id).await
    }
}
