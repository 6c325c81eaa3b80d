use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The newest post of one feed, as published in the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub blog_name: String,
    pub title: String,
    pub published: String,
    pub link: String,
    pub avatar: String,
}

impl Article {
    /// Identity used when comparing digests. The display date is left out so
    /// that reformatting alone never counts as a change.
    pub fn identity(&self) -> (&str, &str, &str) {
        (&self.blog_name, &self.title, &self.link)
    }
}

/// An article together with the timestamp it is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedArticle {
    pub article: Article,
    pub published_at: DateTime<Utc>,
}

/// The persisted JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digest {
    #[serde(default)]
    pub items: Vec<Article>,
    #[serde(default)]
    pub updated: String,
}
