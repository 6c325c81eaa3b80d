use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tokio::time::{timeout_at, Instant};

use super::avatar::AvatarResolver;
use super::parser::{FeedParser, ParseError};
use super::retry::{retry_with_backoff, Attempt, RetryNotifier, RetryPolicy};
use super::sanitize::sanitize;
use super::time::{format_display, resolve_published};
use crate::models::{Article, AvatarOutcome, FetchFailure, FetchResult, FetchedArticle, ParsedFeed};

const DEFAULT_USER_AGENT: &str = concat!("feedroll/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("run deadline reached")]
    DeadlineExceeded,
}

/// Which client a request goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Plain,
    /// No certificate validation and a browser-like user agent; only used
    /// once the plain path has failed.
    Hardened,
}

impl Transport {
    pub fn for_attempt(attempt: Attempt) -> Self {
        if attempt.is_retry() {
            Transport::Hardened
        } else {
            Transport::Plain
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub request_timeout: Duration,
    pub hardened_user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(15),
            hardened_user_agent: "Mozilla/5.0 (compatible; RSSFetcher/1.0)".to_string(),
        }
    }
}

pub struct HttpFetcher {
    plain: Client,
    hardened: Client,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, reqwest::Error> {
        let plain = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(DEFAULT_USER_AGENT)
            .build()?;
        let hardened = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.hardened_user_agent.as_str())
            .danger_accept_invalid_certs(true)
            .build()?;

        Ok(Self { plain, hardened })
    }

    pub fn client(&self) -> &Client {
        &self.plain
    }

    pub async fn get_bytes(&self, url: &str, transport: Transport) -> Result<Vec<u8>, FetchError> {
        let client = match transport {
            Transport::Plain => &self.plain,
            Transport::Hardened => &self.hardened,
        };
        let response = client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// One feed's whole lifecycle: request, sanitize, parse (with retries),
/// resolve the avatar and build the article for the newest entry.
pub struct FeedTask {
    http: HttpFetcher,
    parser: Arc<dyn FeedParser>,
    avatars: AvatarResolver,
    retry: RetryPolicy,
    notifier: Arc<dyn RetryNotifier>,
    published_format: String,
    blog_names: HashMap<String, String>,
}

impl FeedTask {
    /// `parser` is shared by every concurrent fetch; `notifier` receives
    /// failed attempts instead of the primary log.
    pub fn new(
        http: HttpFetcher,
        parser: Arc<dyn FeedParser>,
        avatars: AvatarResolver,
        notifier: Arc<dyn RetryNotifier>,
    ) -> Self {
        Self {
            http,
            parser,
            avatars,
            retry: RetryPolicy::default(),
            notifier,
            published_format: "%d %b %Y".to_string(),
            blog_names: HashMap::new(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_published_format(mut self, format: impl Into<String>) -> Self {
        self.published_format = format.into();
        self
    }

    /// Feed title -> display name.
    pub fn with_blog_names(mut self, names: HashMap<String, String>) -> Self {
        self.blog_names = names;
        self
    }

    pub async fn fetch(&self, source: &str, deadline: Option<Instant>) -> FetchResult {
        let started = std::time::Instant::now();
        let outcome = self.fetch_article(source, deadline).await;

        match &outcome {
            Ok(fetched) => tracing::debug!(
                url = %source,
                title = %fetched.article.title,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Fetched feed"
            ),
            Err(e) => tracing::warn!(
                url = %source,
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Feed failed"
            ),
        }

        FetchResult::new(source, outcome)
    }

    async fn fetch_article(&self, source: &str, deadline: Option<Instant>) -> Result<FetchedArticle, FetchFailure> {
        let feed = retry_with_backoff(&self.retry, deadline, self.notifier.as_ref(), source, |attempt| {
            self.fetch_parsed(source, Transport::for_attempt(attempt), deadline)
        })
        .await
        .map_err(FetchFailure::ParseFailed)?;

        let Some(entry) = feed.entries.first() else {
            return Err(FetchFailure::FeedEmpty);
        };

        let (avatar, avatar_outcome) = self.checked_avatar(&feed, deadline).await;
        let published_at = resolve_published(entry.published, entry.published_raw.as_deref(), Utc::now());
        let blog_name = self
            .blog_names
            .get(&feed.title)
            .cloned()
            .unwrap_or_else(|| feed.title.clone());

        Ok(FetchedArticle {
            article: Article {
                blog_name,
                title: entry.title.clone(),
                published: format_display(published_at, &self.published_format),
                link: entry.link.clone(),
                avatar,
            },
            published_at,
            avatar: avatar_outcome,
        })
    }

    async fn fetch_parsed(&self, url: &str, transport: Transport, deadline: Option<Instant>) -> Result<ParsedFeed, FetchError> {
        let request = self.http.get_bytes(url, transport);
        let raw = match deadline {
            Some(deadline) => timeout_at(deadline, request)
                .await
                .map_err(|_| FetchError::DeadlineExceeded)??,
            None => request.await?,
        };

        Ok(self.parser.parse(&sanitize(&raw))?)
    }

    async fn checked_avatar(&self, feed: &ParsedFeed, deadline: Option<Instant>) -> (String, AvatarOutcome) {
        let lookup = self.avatars.resolve_checked(feed);
        match deadline {
            Some(deadline) => timeout_at(deadline, lookup)
                .await
                .unwrap_or_else(|_| (String::new(), AvatarOutcome::Missing)),
            None => lookup.await,
        }
    }
}
