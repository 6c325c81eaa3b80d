use std::collections::BTreeMap;
use std::fmt::Write;

use crate::models::{AvatarOutcome, DatedArticle, FetchFailure, FetchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Problem {
    ParseFailed,
    FeedEmpty,
    NoAvatar,
    BrokenAvatar,
}

impl Problem {
    pub const ALL: [Problem; 4] = [
        Problem::ParseFailed,
        Problem::FeedEmpty,
        Problem::NoAvatar,
        Problem::BrokenAvatar,
    ];

    fn describe(self) -> &'static str {
        match self {
            Problem::ParseFailed => "could not be fetched or parsed",
            Problem::FeedEmpty => "had no entries",
            Problem::NoAvatar => "had no avatar, default used",
            Problem::BrokenAvatar => "had an unreachable avatar, default used",
        }
    }
}

/// Offending source URLs per problem category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProblemTally {
    entries: BTreeMap<Problem, Vec<String>>,
}

impl ProblemTally {
    pub fn record(&mut self, problem: Problem, source: impl Into<String>) {
        self.entries.entry(problem).or_default().push(source.into());
    }

    pub fn urls(&self, problem: Problem) -> &[String] {
        self.entries.get(&problem).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_clean(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Human-readable run summary for the log.
    pub fn summary(&self, success_count: usize, total: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Feed run summary:");
        let _ = writeln!(out, "{total} feeds, {success_count} fetched successfully.");

        for problem in Problem::ALL {
            let urls = self.urls(problem);
            if urls.is_empty() {
                continue;
            }
            let _ = writeln!(out, "✘ {} feed(s) {}:", urls.len(), problem.describe());
            for url in urls {
                let _ = writeln!(out, "  - {url}");
            }
        }

        if self.is_clean() {
            let _ = writeln!(out, "No warnings or errors.");
        }
        out
    }
}

#[derive(Debug)]
pub struct Aggregate {
    pub articles: Vec<DatedArticle>,
    pub tally: ProblemTally,
    pub success_count: usize,
    pub total: usize,
}

/// Classify every result and collect the articles, substituting
/// `default_avatar` for missing or unreachable avatars.
pub fn aggregate(results: Vec<FetchResult>, default_avatar: &str) -> Aggregate {
    let total = results.len();
    let mut tally = ProblemTally::default();
    let mut articles = Vec::with_capacity(total);

    for result in results {
        let fetched = match result.outcome {
            Ok(fetched) => fetched,
            Err(FetchFailure::ParseFailed(_)) => {
                tally.record(Problem::ParseFailed, result.source);
                continue;
            }
            Err(FetchFailure::FeedEmpty) => {
                tally.record(Problem::FeedEmpty, result.source);
                continue;
            }
        };

        let mut article = fetched.article;
        match fetched.avatar {
            AvatarOutcome::Live if !article.avatar.is_empty() => {}
            AvatarOutcome::Broken => {
                tally.record(Problem::BrokenAvatar, result.source);
                article.avatar = default_avatar.to_string();
            }
            AvatarOutcome::Live | AvatarOutcome::Missing => {
                tally.record(Problem::NoAvatar, result.source);
                article.avatar = default_avatar.to_string();
            }
        }

        articles.push(DatedArticle {
            article,
            published_at: fetched.published_at,
        });
    }

    Aggregate {
        success_count: articles.len(),
        articles,
        tally,
        total,
    }
}
