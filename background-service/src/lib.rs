//! Scan pipeline, review lifecycle and the cadence scheduler.

use brandscout_core::{
    CoreError, ErrorReporter, ScanStatus, ScanSummary, ScanTrigger, Settings, SkipReason,
};
use chrono::{DateTime, Utc};
use database::Database;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub mod drafter;
pub mod ingest;
pub mod lifecycle;
pub mod scan;
pub mod service;


pub use drafter::CommentDrafter;
pub use ingest::{IngestOutcome, Ingestor};
pub use lifecycle::LifecycleController;
pub use scan::{ScanOptions, ScanOrchestrator};
pub use service::BrandScoutService;

/// Starts scheduled scans for brands whose cadence has elapsed.
pub struct BackgroundService {
    db: Arc<Database>,
    orchestrator: Arc<ScanOrchestrator>,
    tick_interval: Duration,
    reporter: ErrorReporter,
    /// Last skipped scheduled scan per brand. Skips are not audited, so this
    /// keeps a skipped brand from counting as due on every tick.
    skipped: Mutex<HashMap<i64, (DateTime<Utc>, SkipReason)>>,
}

impl BackgroundService {
    pub fn new(db: Arc<Database>, orchestrator: Arc<ScanOrchestrator>, tick_interval: Duration) -> Self {
        Self {
            db,
            orchestrator,
            tick_interval,
            reporter: ErrorReporter::new(),
            skipped: Mutex::new(HashMap::new()),
        }
    }

    /// Brands whose last recorded scan, or last skip while its cause still
    /// holds, is older than their frequency. Brands never scanned are due;
    /// brands with a scan in flight are left out.
    pub async fn due_brands(&self, now: DateTime<Utc>) -> Result<Vec<i64>, CoreError> {
        let mut due = Vec::new();
        for brand_id in self.db.active_brand_ids().await? {
            if self.orchestrator.is_running(brand_id) {
                continue;
            }
            let settings = self.db.get_settings(brand_id).await?;
            let last_scan = self.db.last_scan_started_at(brand_id).await?;
            let last_skip = self.skipped_at(brand_id, &settings).await?;
            let is_due = match last_scan.max(last_skip) {
                Some(last) => now - last >= settings.scan_frequency.as_duration(),
                None => true,
            };
            if is_due {
                due.push(brand_id);
            }
        }
        Ok(due)
    }

    /// When a scheduled scan last skipped the brand, as long as the reason
    /// for skipping still holds.
    async fn skipped_at(
        &self,
        brand_id: i64,
        settings: &Settings,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let entry = self
            .skipped
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&brand_id)
            .copied();
        let Some((at, reason)) = entry else {
            return Ok(None);
        };

        let still_applies = match reason {
            SkipReason::Disabled => !settings.is_enabled,
            SkipReason::NoActiveKeywords => self.db.count_active_keywords(brand_id).await? == 0,
        };
        if still_applies {
            Ok(Some(at))
        } else {
            self.skipped
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&brand_id);
            Ok(None)
        }
    }

    fn note_outcome(&self, summary: &ScanSummary) {
        let mut skipped = self.skipped.lock().unwrap_or_else(|e| e.into_inner());
        match summary.status {
            ScanStatus::Skipped(reason) => {
                skipped.insert(summary.brand_id, (summary.started_at, reason));
            }
            _ => {
                skipped.remove(&summary.brand_id);
            }
        }
    }

    /// Runs every due scan to completion and returns their summaries.
    pub async fn run_due_scans(&self) -> Result<Vec<ScanSummary>, CoreError> {
        let due = self.due_brands(Utc::now()).await?;
        if due.is_empty() {
            return Ok(Vec::new());
        }
        debug!("{} brands due for a scan", due.len());

        let results = join_all(
            due.iter()
                .map(|brand_id| self.orchestrator.run_scan(*brand_id, ScanTrigger::Scheduled)),
        )
        .await;

        let mut summaries = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(summary) => {
                    self.note_outcome(&summary);
                    summaries.push(summary);
                }
                Err(CoreError::ScanInProgress { brand_id }) => {
                    debug!("Brand {} is already being scanned", brand_id)
                }
                Err(e) => self.reporter.report_error(&e),
            }
        }
        Ok(summaries)
    }

    /// Ticks until `shutdown` fires. Each due brand's scan runs on its own
    /// task so a slow brand never delays the next tick.
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<(), CoreError> {
        info!(
            "Scheduler started, checking every {}s",
            self.tick_interval.as_secs()
        );
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let due = match self.due_brands(Utc::now()).await {
                        Ok(due) => due,
                        Err(e) => {
                            self.reporter.report_error(&e);
                            continue;
                        }
                    };
                    for brand_id in due {
                        let service = Arc::clone(&self);
                        tokio::spawn(async move {
                            match service
                                .orchestrator
                                .run_scan(brand_id, ScanTrigger::Scheduled)
                                .await
                            {
                                Ok(summary) => service.note_outcome(&summary),
                                Err(CoreError::ScanInProgress { .. }) => {
                                    debug!("Brand {} is already being scanned", brand_id)
                                }
                                Err(e) => service.reporter.report_error(&e),
                            }
                        });
                    }
                }
            }
        }

        info!("Scheduler stopping, cancelling in-flight scans");
        self.orchestrator.cancel_all();
        Ok(())
    }
}
