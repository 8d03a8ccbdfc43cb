use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTrigger {
    Manual,
    Scheduled,
}

impl ScanTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanTrigger::Manual => "manual",
            ScanTrigger::Scheduled => "scheduled",
        }
    }
}

impl FromStr for ScanTrigger {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ScanTrigger::Manual),
            "scheduled" => Ok(ScanTrigger::Scheduled),
            other => Err(CoreError::invalid_input(format!("unknown scan trigger: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    NoActiveKeywords,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Completed,
    Partial,
    Skipped(SkipReason),
    ConnectionFailed,
    StoreUnavailable,
    Cancelled,
}

impl ScanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Completed => "completed",
            ScanStatus::Partial => "partial",
            ScanStatus::Skipped(SkipReason::Disabled) => "skipped_disabled",
            ScanStatus::Skipped(SkipReason::NoActiveKeywords) => "skipped_no_keywords",
            ScanStatus::ConnectionFailed => "connection_failed",
            ScanStatus::StoreUnavailable => "store_unavailable",
            ScanStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(ScanStatus::Completed),
            "partial" => Ok(ScanStatus::Partial),
            "skipped_disabled" => Ok(ScanStatus::Skipped(SkipReason::Disabled)),
            "skipped_no_keywords" => Ok(ScanStatus::Skipped(SkipReason::NoActiveKeywords)),
            "connection_failed" => Ok(ScanStatus::ConnectionFailed),
            "store_unavailable" => Ok(ScanStatus::StoreUnavailable),
            "cancelled" => Ok(ScanStatus::Cancelled),
            other => Err(CoreError::invalid_input(format!("unknown scan status: {}", other))),
        }
    }
}

/// A platform query that was given up on during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFailure {
    pub keyword: String,
    pub subreddit: Option<String>,
    pub error_code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub brand_id: i64,
    pub trigger: ScanTrigger,
    pub status: ScanStatus,
    pub keywords_scanned: usize,
    pub platform_calls: usize,
    pub candidates_examined: usize,
    /// Candidates that matched and met the brand's relevance threshold.
    pub found: usize,
    /// Candidates newly stored after deduplication.
    pub saved: usize,
    pub duplicates: usize,
    pub drafts_generated: usize,
    pub drafts_failed: usize,
    pub query_failures: Vec<QueryFailure>,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ScanSummary {
    pub fn new(brand_id: i64, trigger: ScanTrigger) -> Self {
        Self {
            scan_id: Uuid::new_v4(),
            brand_id,
            trigger,
            status: ScanStatus::Completed,
            keywords_scanned: 0,
            platform_calls: 0,
            candidates_examined: 0,
            found: 0,
            saved: 0,
            duplicates: 0,
            drafts_generated: 0,
            drafts_failed: 0,
            query_failures: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn skipped(brand_id: i64, trigger: ScanTrigger, reason: SkipReason) -> Self {
        let mut summary = Self::new(brand_id, trigger);
        summary.status = ScanStatus::Skipped(reason);
        summary.finished_at = Some(summary.started_at);
        summary
    }

    pub fn error_count(&self) -> usize {
        self.query_failures.len() + self.errors.len()
    }

    pub fn outcome(&self) -> ScanOutcome {
        match self.status {
            ScanStatus::Skipped(reason) => ScanOutcome::Skipped(reason),
            ScanStatus::ConnectionFailed | ScanStatus::StoreUnavailable => {
                ScanOutcome::CouldNotRun
            }
            ScanStatus::Cancelled => ScanOutcome::Cancelled,
            ScanStatus::Partial => ScanOutcome::PartialFailure,
            ScanStatus::Completed if self.error_count() > 0 => ScanOutcome::PartialFailure,
            ScanStatus::Completed if self.found == 0 => ScanOutcome::NothingFound,
            ScanStatus::Completed => ScanOutcome::Found,
        }
    }

    pub fn message(&self) -> String {
        match self.outcome() {
            ScanOutcome::Skipped(SkipReason::Disabled) => {
                "Monitoring is disabled for this brand; scan skipped.".to_string()
            }
            ScanOutcome::Skipped(SkipReason::NoActiveKeywords) => {
                "No active keywords to scan for.".to_string()
            }
            ScanOutcome::NothingFound => format!(
                "Scan finished: {} posts examined, nothing relevant found.",
                self.candidates_examined
            ),
            ScanOutcome::Found => format!(
                "Scan finished: {} opportunities found, {} new.",
                self.found, self.saved
            ),
            ScanOutcome::PartialFailure => format!(
                "Scan partially failed: {} opportunities found, {} new, {} queries or writes failed.",
                self.found,
                self.saved,
                self.error_count()
            ),
            ScanOutcome::CouldNotRun => match self.status {
                ScanStatus::StoreUnavailable => {
                    "Scan could not run: the opportunity store is unreachable.".to_string()
                }
                _ => "Scan could not run: unable to connect to Reddit.".to_string(),
            },
            ScanOutcome::Cancelled => format!(
                "Scan cancelled after {} posts; {} opportunities saved before cancellation.",
                self.candidates_examined, self.saved
            ),
        }
    }
}

/// Operator-facing classification of a finished scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Skipped(SkipReason),
    NothingFound,
    Found,
    PartialFailure,
    CouldNotRun,
    Cancelled,
}

/// Persisted audit row for a finished scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRunRecord {
    pub scan_id: String,
    pub brand_id: i64,
    pub trigger: ScanTrigger,
    pub status: ScanStatus,
    pub candidates_examined: i64,
    pub found: i64,
    pub saved: i64,
    pub duplicates: i64,
    pub error_count: i64,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_distinguishes_nothing_partial_and_could_not_run() {
        let mut summary = ScanSummary::new(1, ScanTrigger::Manual);
        summary.candidates_examined = 12;
        assert_eq!(summary.outcome(), ScanOutcome::NothingFound);

        summary.found = 2;
        summary.saved = 1;
        assert_eq!(summary.outcome(), ScanOutcome::Found);

        summary.query_failures.push(QueryFailure {
            keyword: "crm".to_string(),
            subreddit: None,
            error_code: "REDDIT_SERVER_ERROR".to_string(),
            message: "Server error: 503".to_string(),
        });
        assert_eq!(summary.outcome(), ScanOutcome::PartialFailure);

        summary.status = ScanStatus::ConnectionFailed;
        assert_eq!(summary.outcome(), ScanOutcome::CouldNotRun);
        assert!(summary.message().contains("could not run"));
    }

    #[test]
    fn test_skipped_summary() {
        let summary = ScanSummary::skipped(4, ScanTrigger::Scheduled, SkipReason::Disabled);
        assert_eq!(summary.outcome(), ScanOutcome::Skipped(SkipReason::Disabled));
        assert_eq!(summary.platform_calls, 0);
        assert!(summary.finished_at.is_some());
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ScanStatus::Completed,
            ScanStatus::Partial,
            ScanStatus::Skipped(SkipReason::NoActiveKeywords),
            ScanStatus::ConnectionFailed,
            ScanStatus::StoreUnavailable,
            ScanStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ScanStatus>().unwrap(), status);
        }
    }
}
