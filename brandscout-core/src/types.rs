use crate::error::{ConfigError, CoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const PLATFORM_REDDIT: &str = "reddit";

pub const MAX_TERM_LENGTH: usize = 100;
pub const MAX_SUBREDDITS_PER_KEYWORD: usize = 10;
pub const BODY_SNIPPET_CHARS: usize = 1000;

/// A post returned by the platform, before any matching has happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidatePost {
    pub post_id: String,
    pub platform: String,
    pub subreddit: String,
    pub title: String,
    pub body: Option<String>,
    pub url: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub brand_id: i64,
    pub term: String,
    /// Normalised names without the `r/` prefix. Empty means platform-wide.
    pub subreddits: Vec<String>,
    pub is_active: bool,
    pub opportunity_count: i64,
    pub last_scanned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Keyword {
    pub fn is_platform_wide(&self) -> bool {
        self.subreddits.is_empty()
    }

    pub fn allows_subreddit(&self, subreddit: &str) -> bool {
        if self.subreddits.is_empty() {
            return true;
        }
        let normalized = normalize_subreddit(subreddit);
        self.subreddits.iter().any(|s| *s == normalized)
    }
}

/// Validated input for registering a keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKeyword {
    pub brand_id: i64,
    pub term: String,
    pub subreddits: Vec<String>,
}

impl NewKeyword {
    pub fn new(brand_id: i64, term: &str, subreddits: &[String]) -> Result<Self, CoreError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(CoreError::invalid_input("keyword term cannot be empty"));
        }
        if term.chars().count() > MAX_TERM_LENGTH {
            return Err(CoreError::invalid_input(format!(
                "keyword term cannot exceed {} characters",
                MAX_TERM_LENGTH
            )));
        }

        let mut normalized: Vec<String> = Vec::with_capacity(subreddits.len());
        for raw in subreddits {
            let name = normalize_subreddit(raw);
            if name.is_empty() {
                continue;
            }
            if !is_valid_subreddit_name(&name) {
                return Err(CoreError::invalid_input(format!(
                    "invalid subreddit name: {}",
                    raw.trim()
                )));
            }
            if !normalized.contains(&name) {
                normalized.push(name);
            }
        }
        if normalized.len() > MAX_SUBREDDITS_PER_KEYWORD {
            return Err(CoreError::invalid_input(format!(
                "a keyword can be scoped to at most {} subreddits",
                MAX_SUBREDDITS_PER_KEYWORD
            )));
        }

        Ok(Self {
            brand_id,
            term: term.to_string(),
            subreddits: normalized,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeywordUpdate {
    pub is_active: Option<bool>,
}

/// Strips surrounding whitespace and any `r/` or `/r/` marker, then lowercases.
pub fn normalize_subreddit(name: &str) -> String {
    let trimmed = name.trim().trim_start_matches('/');
    let stripped = match trimmed.get(..2) {
        Some(prefix) if prefix.eq_ignore_ascii_case("r/") => &trimmed[2..],
        _ => trimmed,
    };
    stripped.trim_end_matches('/').to_lowercase()
}

fn is_valid_subreddit_name(name: &str) -> bool {
    let len = name.len();
    (2..=21).contains(&len) && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ScanFrequency {
    Hourly,
    Every3Hours,
    Every6Hours,
    Every12Hours,
    Daily,
}

impl ScanFrequency {
    pub const ALLOWED_HOURS: [u32; 5] = [1, 3, 6, 12, 24];

    pub fn hours(self) -> u32 {
        match self {
            ScanFrequency::Hourly => 1,
            ScanFrequency::Every3Hours => 3,
            ScanFrequency::Every6Hours => 6,
            ScanFrequency::Every12Hours => 12,
            ScanFrequency::Daily => 24,
        }
    }

    pub fn as_duration(self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.hours()))
    }
}

impl TryFrom<u32> for ScanFrequency {
    type Error = ConfigError;

    fn try_from(hours: u32) -> Result<Self, Self::Error> {
        match hours {
            1 => Ok(ScanFrequency::Hourly),
            3 => Ok(ScanFrequency::Every3Hours),
            6 => Ok(ScanFrequency::Every6Hours),
            12 => Ok(ScanFrequency::Every12Hours),
            24 => Ok(ScanFrequency::Daily),
            other => Err(ConfigError::invalid("scan_frequency_hours", other)),
        }
    }
}

impl From<ScanFrequency> for u32 {
    fn from(frequency: ScanFrequency) -> Self {
        frequency.hours()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentTone {
    Helpful,
    Informative,
    Casual,
    Professional,
    Enthusiastic,
}

impl CommentTone {
    pub fn as_str(self) -> &'static str {
        match self {
            CommentTone::Helpful => "helpful",
            CommentTone::Informative => "informative",
            CommentTone::Casual => "casual",
            CommentTone::Professional => "professional",
            CommentTone::Enthusiastic => "enthusiastic",
        }
    }
}

impl fmt::Display for CommentTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentTone {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "helpful" => Ok(CommentTone::Helpful),
            "informative" => Ok(CommentTone::Informative),
            "casual" => Ok(CommentTone::Casual),
            "professional" => Ok(CommentTone::Professional),
            "enthusiastic" => Ok(CommentTone::Enthusiastic),
            _ => Err(ConfigError::invalid("comment_tone", s)),
        }
    }
}

/// Per-brand monitoring policy. One record per brand; absent means defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub brand_id: i64,
    pub is_enabled: bool,
    pub scan_frequency: ScanFrequency,
    pub min_relevance_score: u8,
    pub auto_generate_comments: bool,
    pub comment_tone: CommentTone,
    pub include_brand_mention: bool,
    pub brand_name: Option<String>,
    pub brand_description: Option<String>,
}

impl Settings {
    pub fn defaults_for(brand_id: i64) -> Self {
        Self {
            brand_id,
            is_enabled: true,
            scan_frequency: ScanFrequency::Every6Hours,
            min_relevance_score: 50,
            auto_generate_comments: true,
            comment_tone: CommentTone::Helpful,
            include_brand_mention: true,
            brand_name: None,
            brand_description: None,
        }
    }

    /// Applies a partial update. Nothing is changed if any field is invalid.
    pub fn apply(&self, patch: &SettingsPatch) -> Result<Settings, CoreError> {
        let mut next = self.clone();

        if let Some(enabled) = patch.is_enabled {
            next.is_enabled = enabled;
        }
        if let Some(hours) = patch.scan_frequency_hours {
            next.scan_frequency = ScanFrequency::try_from(hours)?;
        }
        if let Some(score) = patch.min_relevance_score {
            if !(0..=100).contains(&score) {
                return Err(ConfigError::invalid("min_relevance_score", score).into());
            }
            next.min_relevance_score = score as u8;
        }
        if let Some(auto) = patch.auto_generate_comments {
            next.auto_generate_comments = auto;
        }
        if let Some(tone) = &patch.comment_tone {
            next.comment_tone = tone.parse()?;
        }
        if let Some(mention) = patch.include_brand_mention {
            next.include_brand_mention = mention;
        }
        if let Some(name) = &patch.brand_name {
            next.brand_name = non_blank(name);
        }
        if let Some(description) = &patch.brand_description {
            next.brand_description = non_blank(description);
        }

        Ok(next)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Raw partial settings as received from the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub is_enabled: Option<bool>,
    pub scan_frequency_hours: Option<u32>,
    pub min_relevance_score: Option<i64>,
    pub auto_generate_comments: Option<bool>,
    pub comment_tone: Option<String>,
    pub include_brand_mention: Option<bool>,
    pub brand_name: Option<String>,
    pub brand_description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Pending,
    Completed,
    Dismissed,
}

impl OpportunityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityStatus::Pending => "pending",
            OpportunityStatus::Completed => "completed",
            OpportunityStatus::Dismissed => "dismissed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, OpportunityStatus::Pending)
    }
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpportunityStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OpportunityStatus::Pending),
            "completed" => Ok(OpportunityStatus::Completed),
            "dismissed" => Ok(OpportunityStatus::Dismissed),
            other => Err(CoreError::invalid_input(format!(
                "unknown opportunity status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: i64,
    pub brand_id: i64,
    pub platform: String,
    pub post_id: String,
    pub subreddit: String,
    pub title: String,
    pub body_snippet: Option<String>,
    pub post_url: String,
    pub upvotes: i64,
    pub comment_count: i64,
    pub posted_at: DateTime<Utc>,
    pub relevance_score: u8,
    pub opportunity_type: String,
    /// Snapshot of the keyword terms at discovery time, not live references.
    pub matched_keywords: Vec<String>,
    pub status: OpportunityStatus,
    pub suggested_comment: Option<String>,
    pub comment_tone: Option<CommentTone>,
    pub discovered_at: DateTime<Utc>,
    pub status_updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOpportunity {
    pub brand_id: i64,
    pub post: CandidatePost,
    pub relevance_score: u8,
    pub opportunity_type: String,
    pub matched_keywords: Vec<String>,
}

impl NewOpportunity {
    pub fn body_snippet(&self) -> Option<String> {
        self.post
            .body
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(|b| truncate_chars(b, BODY_SNIPPET_CHARS))
    }
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Outcome of a single dedup-guarded insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpportunityQuery {
    pub brand_id: i64,
    pub status: Option<OpportunityStatus>,
    pub limit: u32,
    /// Id of the last opportunity of the previous page.
    pub cursor: Option<i64>,
}

impl OpportunityQuery {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn for_brand(brand_id: i64) -> Self {
        Self {
            brand_id,
            status: None,
            limit: Self::DEFAULT_LIMIT,
            cursor: None,
        }
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunityPage {
    pub opportunities: Vec<Opportunity>,
    pub has_more: bool,
    pub next_cursor: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandStats {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub dismissed: i64,
    pub monitored_keywords: i64,
    pub total_engagement_reach: i64,
    pub total_comments_drafted: i64,
}

/// What the scorer concluded about one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub relevance_score: u8,
    pub matched_keywords: Vec<String>,
    pub matched_keyword_ids: Vec<i64>,
    pub opportunity_type: String,
}
