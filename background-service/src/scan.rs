use crate::drafter::CommentDrafter;
use crate::ingest::{IngestOutcome, Ingestor};
use brandscout_core::{
    AppConfig, CoreError, ErrorExt, Keyword, QueryFailure, RedditApiError, ScanStatus,
    ScanSummary, ScanTrigger, Settings, SkipReason,
};
use chrono::{DateTime, Utc};
use database::{Database, SearchWatermarks};
use futures::stream::{self, StreamExt};
use matching_engine::RelevanceScorer;
use reddit_client::{PostSearch, SearchQuery};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Re-read window before a query's watermark, for posts the platform indexes late.
const SCAN_OVERLAP_MINUTES: i64 = 15;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Scans allowed to run at once across all brands.
    pub max_concurrent_scans: usize,
    /// Platform queries in flight at once within one brand's scan.
    pub per_brand_query_concurrency: usize,
    /// Window searched for keywords that have never been scanned.
    pub lookback: chrono::Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_concurrent_scans: 4,
            per_brand_query_concurrency: 3,
            lookback: chrono::Duration::hours(24),
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_scans: config.scheduler.max_concurrent_scans.max(1),
            per_brand_query_concurrency: config.scheduler.per_brand_query_concurrency.max(1),
            lookback: chrono::Duration::hours(i64::from(config.reddit.lookback_hours.max(1))),
        }
    }
}

type InFlight = Mutex<HashMap<i64, CancellationToken>>;

/// Removes the brand from the in-flight set however the scan ends.
struct InFlightGuard<'a> {
    registry: &'a InFlight,
    brand_id: i64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.remove(&self.brand_id);
    }
}

/// Runs one brand's scan: platform search, scoring, ingestion and optional
/// drafting. At most one scan per brand is in flight at any time.
pub struct ScanOrchestrator {
    db: Arc<Database>,
    search: Arc<dyn PostSearch>,
    scorer: Arc<dyn RelevanceScorer>,
    drafter: Arc<CommentDrafter>,
    ingestor: Ingestor,
    in_flight: InFlight,
    scan_slots: Semaphore,
    options: ScanOptions,
}

impl ScanOrchestrator {
    pub fn new(
        db: Arc<Database>,
        search: Arc<dyn PostSearch>,
        scorer: Arc<dyn RelevanceScorer>,
        drafter: Arc<CommentDrafter>,
        options: ScanOptions,
    ) -> Self {
        Self {
            ingestor: Ingestor::new(Arc::clone(&db)),
            db,
            search,
            scorer,
            drafter,
            in_flight: Mutex::new(HashMap::new()),
            scan_slots: Semaphore::new(options.max_concurrent_scans.max(1)),
            options,
        }
    }

    pub fn is_running(&self, brand_id: i64) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        in_flight.contains_key(&brand_id)
    }

    /// Requests cooperative cancellation. Returns `false` when no scan is running.
    pub fn cancel(&self, brand_id: i64) -> bool {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.get(&brand_id) {
            Some(token) => {
                info!("Cancelling scan for brand {}", brand_id);
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        for token in in_flight.values() {
            token.cancel();
        }
    }

    fn register(&self, brand_id: i64) -> Result<(CancellationToken, InFlightGuard<'_>), CoreError> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.contains_key(&brand_id) {
            return Err(CoreError::ScanInProgress { brand_id });
        }
        let token = CancellationToken::new();
        in_flight.insert(brand_id, token.clone());
        Ok((
            token,
            InFlightGuard {
                registry: &self.in_flight,
                brand_id,
            },
        ))
    }

    /// Fails with `ScanInProgress` if the brand already has a scan running.
    /// Every other outcome, including "could not run", comes back as a summary.
    pub async fn run_scan(
        &self,
        brand_id: i64,
        trigger: ScanTrigger,
    ) -> Result<ScanSummary, CoreError> {
        let (cancel, _guard) = self.register(brand_id)?;

        let settings = match self.db.get_settings(brand_id).await {
            Ok(settings) => settings,
            Err(e) if e.is_store_unavailable() => {
                return Ok(store_unavailable(brand_id, trigger, &e))
            }
            Err(e) => return Err(e),
        };
        if !settings.is_enabled {
            info!("Monitoring disabled for brand {}, skipping scan", brand_id);
            return Ok(ScanSummary::skipped(brand_id, trigger, SkipReason::Disabled));
        }

        let keywords = match self.db.get_active_keywords(brand_id).await {
            Ok(keywords) => keywords,
            Err(e) if e.is_store_unavailable() => {
                return Ok(store_unavailable(brand_id, trigger, &e))
            }
            Err(e) => return Err(e),
        };
        if keywords.is_empty() {
            info!("Brand {} has no active keywords, skipping scan", brand_id);
            return Ok(ScanSummary::skipped(
                brand_id,
                trigger,
                SkipReason::NoActiveKeywords,
            ));
        }

        let _slot = self
            .scan_slots
            .acquire()
            .await
            .map_err(|_| CoreError::Internal {
                message: "scan worker pool is closed".to_string(),
            })?;

        let mut summary = ScanSummary::new(brand_id, trigger);
        summary.keywords_scanned = keywords.len();
        info!(
            "Starting {} scan {} for brand {} ({} keywords)",
            trigger.as_str(),
            summary.scan_id,
            brand_id,
            keywords.len()
        );

        let saved_ids = self
            .collect(&mut summary, &settings, &keywords, &cancel)
            .await;

        if settings.auto_generate_comments
            && self.drafter.is_configured()
            && matches!(summary.status, ScanStatus::Completed | ScanStatus::Partial)
        {
            self.auto_draft(&mut summary, &settings, &saved_ids, &cancel)
                .await;
        }

        summary.finished_at = Some(Utc::now());
        if let Err(e) = self.db.record_scan_run(&summary).await {
            warn!("Failed to record scan run {}: {}", summary.scan_id, e);
        }

        match summary.status {
            ScanStatus::ConnectionFailed | ScanStatus::StoreUnavailable => {
                error!("Scan {} for brand {}: {}", summary.scan_id, brand_id, summary.message())
            }
            _ => info!("Scan {} for brand {}: {}", summary.scan_id, brand_id, summary.message()),
        }
        Ok(summary)
    }

    /// One query per platform-wide keyword, or one per scoped subreddit. Each
    /// starts just before where that query last completed, never earlier
    /// than the lookback floor.
    fn plan_queries(
        &self,
        keywords: &[Keyword],
        watermarks: &SearchWatermarks,
        now: DateTime<Utc>,
    ) -> Vec<PlannedQuery> {
        let floor = now - self.options.lookback;
        let overlap = chrono::Duration::minutes(SCAN_OVERLAP_MINUTES);
        let since = |keyword_id: i64, subreddit: Option<&str>| {
            watermarks
                .get(keyword_id, subreddit)
                .map(|until| (until - overlap).max(floor))
                .unwrap_or(floor)
        };

        let mut queries = Vec::new();
        for keyword in keywords {
            if keyword.is_platform_wide() {
                queries.push(PlannedQuery {
                    keyword_id: keyword.id,
                    query: SearchQuery::new(keyword.term.clone()).since(since(keyword.id, None)),
                });
            } else {
                for subreddit in &keyword.subreddits {
                    queries.push(PlannedQuery {
                        keyword_id: keyword.id,
                        query: SearchQuery::new(keyword.term.clone())
                            .in_subreddit(subreddit.clone())
                            .since(since(keyword.id, Some(subreddit.as_str()))),
                    });
                }
            }
        }
        queries
    }

    /// Queries the platform and ingests what matches. Returns the ids of newly
    /// saved opportunities.
    async fn collect(
        &self,
        summary: &mut ScanSummary,
        settings: &Settings,
        keywords: &[Keyword],
        cancel: &CancellationToken,
    ) -> Vec<i64> {
        let watermarks = match self.db.search_watermarks(summary.brand_id).await {
            Ok(watermarks) => watermarks,
            Err(e) if e.is_store_unavailable() => {
                summary.errors.push(e.to_string());
                summary.status = ScanStatus::StoreUnavailable;
                return Vec::new();
            }
            Err(e) => {
                warn!("Searching the full lookback window for brand {}: {}", summary.brand_id, e);
                SearchWatermarks::default()
            }
        };
        let planned_at = Utc::now();
        let queries = self.plan_queries(keywords, &watermarks, planned_at);
        let mut saved_ids = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut succeeded = 0usize;
        let mut transport_only = true;

        let mut results = stream::iter(queries)
            .map(|planned| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return (planned, None);
                    }
                    debug!("Searching {}", planned.query.describe());
                    let result = self.search.search_posts(&planned.query).await;
                    (planned, Some(result))
                }
            })
            .buffer_unordered(self.options.per_brand_query_concurrency.max(1));

        'queries: while let Some((planned, result)) = results.next().await {
            let query = &planned.query;
            let posts = match result {
                None => {
                    summary.status = ScanStatus::Cancelled;
                    break;
                }
                Some(Ok(posts)) => {
                    summary.platform_calls += 1;
                    succeeded += 1;
                    posts
                }
                Some(Err(e)) => {
                    summary.platform_calls += 1;
                    summary.query_failures.push(query_failure(query, &e));
                    if e.is_connection_failure() {
                        error!("Aborting scan for brand {}: {}", summary.brand_id, e);
                        summary.status = ScanStatus::ConnectionFailed;
                        break;
                    }
                    transport_only &= is_transport_failure(&e);
                    warn!("Skipping query {}: {}", query.describe(), e);
                    continue;
                }
            };

            let mut fully_ingested = true;
            for post in posts {
                if cancel.is_cancelled() {
                    summary.status = ScanStatus::Cancelled;
                    break 'queries;
                }
                if !seen.insert(format!("{}:{}", post.platform, post.post_id)) {
                    continue;
                }
                summary.candidates_examined += 1;

                let Some(matched) = self.scorer.score(&post, keywords) else {
                    continue;
                };
                if matched.relevance_score >= settings.min_relevance_score {
                    summary.found += 1;
                }

                let post_id = post.post_id.clone();
                match self
                    .ingestor
                    .ingest(
                        summary.brand_id,
                        post,
                        matched,
                        settings.min_relevance_score,
                    )
                    .await
                {
                    Ok(IngestOutcome::Saved(id)) => {
                        summary.saved += 1;
                        saved_ids.push(id);
                    }
                    Ok(IngestOutcome::AlreadyKnown) => summary.duplicates += 1,
                    Ok(IngestOutcome::BelowThreshold) => {}
                    Err(e) if e.is_store_unavailable() => {
                        summary.errors.push(e.to_string());
                        summary.status = ScanStatus::StoreUnavailable;
                        break 'queries;
                    }
                    Err(e) => {
                        warn!("Failed to store post {}: {}", post_id, e);
                        summary.errors.push(format!("post {}: {}", post_id, e));
                        fully_ingested = false;
                    }
                }
            }

            if fully_ingested {
                if let Err(e) = self
                    .db
                    .advance_search_watermark(
                        planned.keyword_id,
                        query.subreddit.as_deref(),
                        planned_at,
                    )
                    .await
                {
                    warn!("Could not record search progress for {}: {}", query.describe(), e);
                }
            }
        }

        if summary.status == ScanStatus::Completed {
            if succeeded == 0 && !summary.query_failures.is_empty() && transport_only {
                summary.status = ScanStatus::ConnectionFailed;
            } else if summary.error_count() > 0 {
                summary.status = ScanStatus::Partial;
            }
        }
        saved_ids
    }

    async fn auto_draft(
        &self,
        summary: &mut ScanSummary,
        settings: &Settings,
        opportunity_ids: &[i64],
        cancel: &CancellationToken,
    ) {
        for id in opportunity_ids {
            if cancel.is_cancelled() {
                break;
            }
            let result = match self.db.get_opportunity(*id).await {
                Ok(Some(opportunity)) => self.drafter.draft_for(&opportunity, settings).await,
                Ok(None) => Err(CoreError::not_found(format!("opportunity {}", id))),
                Err(e) => Err(e),
            };
            match result {
                Ok(_) => summary.drafts_generated += 1,
                Err(e) => {
                    summary.drafts_failed += 1;
                    warn!("Could not draft a reply for opportunity {}: {}", id, e);
                }
            }
        }
    }
}

struct PlannedQuery {
    keyword_id: i64,
    query: SearchQuery,
}

fn store_unavailable(brand_id: i64, trigger: ScanTrigger, cause: &CoreError) -> ScanSummary {
    let mut summary = ScanSummary::new(brand_id, trigger);
    summary.status = ScanStatus::StoreUnavailable;
    summary.errors.push(cause.to_string());
    summary.finished_at = Some(Utc::now());
    error!("Scan for brand {} could not run: {}", brand_id, cause);
    summary
}

fn query_failure(query: &SearchQuery, error: &CoreError) -> QueryFailure {
    QueryFailure {
        keyword: query.term.clone(),
        subreddit: query.subreddit.clone(),
        error_code: error.error_code(),
        message: error.to_string(),
    }
}

/// The request never got a platform answer at all.
fn is_transport_failure(error: &CoreError) -> bool {
    matches!(
        error,
        CoreError::Network(_)
            | CoreError::Timeout { .. }
            | CoreError::RedditApi(RedditApiError::RequestTimeout)
    )
}
