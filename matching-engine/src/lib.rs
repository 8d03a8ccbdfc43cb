//! Pure keyword matching, relevance scoring and opportunity classification.
//!
//! Nothing in this crate performs I/O; the scan pipeline hands it one
//! candidate post at a time together with the brand's active keywords.

use brandscout_core::{CandidatePost, Keyword, MatchResult};
use serde::{Deserialize, Serialize};
use tracing::trace;

pub mod classify;
pub mod matcher;
pub mod text;

pub use classify::classify;
pub use matcher::{KeywordPattern, MatchLocation, PreparedText};

/// Strategy seam for relevance scoring so the heuristic can be swapped or
/// tuned without touching ingestion.
pub trait RelevanceScorer: Send + Sync {
    /// `None` when no keyword matches the post.
    fn score(&self, post: &CandidatePost, keywords: &[Keyword]) -> Option<MatchResult>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Ceiling of the keyword component, approached as more keywords match.
    pub keyword_max: f64,
    pub title_bonus: f64,
    pub body_only_bonus: f64,
    pub engagement_max: f64,
    /// Upvote count at which the upvote half of the engagement signal saturates.
    pub upvote_saturation: f64,
    pub comment_saturation: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            keyword_max: 60.0,
            title_bonus: 25.0,
            body_only_bonus: 10.0,
            engagement_max: 15.0,
            upvote_saturation: 1000.0,
            comment_saturation: 200.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HeuristicScorer {
    weights: ScoringWeights,
}

impl HeuristicScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    fn keyword_component(&self, matched: usize) -> f64 {
        self.weights.keyword_max * (1.0 - 0.5_f64.powi(matched as i32))
    }

    fn engagement_component(&self, upvotes: i64, comments: i64) -> f64 {
        let half = self.weights.engagement_max / 2.0;
        half * log_ratio(upvotes, self.weights.upvote_saturation)
            + half * log_ratio(comments, self.weights.comment_saturation)
    }
}

fn log_ratio(value: i64, saturation: f64) -> f64 {
    if saturation <= 0.0 {
        return 0.0;
    }
    let value = value.max(0) as f64;
    ((1.0 + value).ln() / (1.0 + saturation).ln()).min(1.0)
}

impl RelevanceScorer for HeuristicScorer {
    fn score(&self, post: &CandidatePost, keywords: &[Keyword]) -> Option<MatchResult> {
        let title = PreparedText::new(&post.title);
        let body = PreparedText::new(post.body.as_deref().unwrap_or_default());

        let mut matched_keywords = Vec::new();
        let mut matched_keyword_ids = Vec::new();
        let mut in_title = false;

        for keyword in keywords {
            if !keyword.is_active || !keyword.allows_subreddit(&post.subreddit) {
                continue;
            }
            let pattern = KeywordPattern::parse(&keyword.term);
            if let Some(location) = matcher::locate(&pattern, &title, &body) {
                in_title |= location == MatchLocation::Title;
                matched_keywords.push(keyword.term.clone());
                matched_keyword_ids.push(keyword.id);
            }
        }

        if matched_keywords.is_empty() {
            return None;
        }

        let location_bonus = if in_title {
            self.weights.title_bonus
        } else {
            self.weights.body_only_bonus
        };
        let raw = self.keyword_component(matched_keywords.len())
            + location_bonus
            + self.engagement_component(post.upvotes, post.comment_count);
        let relevance_score = raw.round().clamp(0.0, 100.0) as u8;

        let mut all_tokens = title.tokens;
        all_tokens.extend(body.tokens);
        let opportunity_type = classify(&post.title, &all_tokens).to_string();

        trace!(
            "Post {} in r/{} matched {:?} with score {}",
            post.post_id,
            post.subreddit,
            matched_keywords,
            relevance_score
        );

        Some(MatchResult {
            relevance_score,
            matched_keywords,
            matched_keyword_ids,
            opportunity_type,
        })
    }
}
