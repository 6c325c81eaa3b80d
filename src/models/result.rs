use chrono::{DateTime, Utc};

use super::Article;
use crate::feed::FetchError;

/// What a single fetch task hands back to the aggregator.
#[derive(Debug)]
pub struct FetchResult {
    pub source: String,
    pub outcome: Result<FetchedArticle, FetchFailure>,
}

impl FetchResult {
    pub fn new(source: impl Into<String>, outcome: Result<FetchedArticle, FetchFailure>) -> Self {
        Self {
            source: source.into(),
            outcome,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArticle {
    /// `avatar` holds the resolved URL, or is empty when resolution failed.
    pub article: Article,
    pub published_at: DateTime<Utc>,
    pub avatar: AvatarOutcome,
}

/// Result of avatar resolution plus the liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarOutcome {
    Live,
    Missing,
    Broken,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error("feed could not be fetched or parsed: {0}")]
    ParseFailed(#[source] FetchError),
    #[error("feed has no entries")]
    FeedEmpty,
}
