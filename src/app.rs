use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::time::Instant;

use crate::config::Config;
use crate::digest::{aggregate, should_update, sort_by_time, Aggregate, ProblemTally, SortOrder};
use crate::error::Result;
use crate::feed::time::{format_display, parse_display};
use crate::feed::{run_all, AvatarResolver, FeedRsParser, FeedTask, HttpFetcher, TraceNotifier};
use crate::models::{Article, DatedArticle, Digest};
use crate::store::{load_pinned, DigestStore};

#[derive(Debug)]
pub struct RunReport {
    /// The digest now on disk: freshly written, or the untouched previous one.
    pub digest: Digest,
    pub tally: ProblemTally,
    pub success_count: usize,
    pub total: usize,
    pub written: bool,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn summary(&self) -> String {
        self.tally.summary(self.success_count, self.total)
    }
}

pub struct Pipeline {
    task: FeedTask,
    client: Client,
    store: DigestStore,
    capacity: usize,
    deadline: Duration,
    default_avatar: String,
    sort_order: SortOrder,
    published_format: String,
    updated_format: String,
    pinned: Option<String>,
}

impl Pipeline {
    pub fn new(config: &Config) -> Result<Self> {
        let http = HttpFetcher::new(&config.fetch_settings())?;
        let client = http.client().clone();

        let avatars = AvatarResolver::new(client.clone(), config.liveness_timeout())
            .with_get_fallback(config.liveness_get_fallback)
            .with_overrides(config.avatar_overrides.clone());

        let task = FeedTask::new(http, Arc::new(FeedRsParser), avatars, Arc::new(TraceNotifier))
            .with_retry(config.retry.policy())
            .with_published_format(config.published_format.clone())
            .with_blog_names(config.blog_names.clone());

        Ok(Self {
            task,
            client,
            store: DigestStore::new(&config.output_path),
            capacity: config.capacity,
            deadline: config.deadline(),
            default_avatar: config.default_avatar.clone(),
            sort_order: config.sort_order,
            published_format: config.published_format.clone(),
            updated_format: config.updated_format.clone(),
            pinned: config.pinned.clone(),
        })
    }

    /// Plain HTTP client, shared with source list loading.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Fetch every source, build the sorted article list and persist it
    /// when it differs from the digest already on disk.
    pub async fn run(&self, sources: Vec<String>) -> Result<RunReport> {
        let started = Instant::now();
        let deadline = started + self.deadline;
        tracing::info!(feeds = sources.len(), capacity = self.capacity, "Starting feed run");

        let task = &self.task;
        let results = run_all(sources, self.capacity, |source| async move {
            task.fetch(&source, Some(deadline)).await
        })
        .await;

        let Aggregate {
            mut articles,
            tally,
            success_count,
            total,
        } = aggregate(results, &self.default_avatar);
        articles.extend(self.pinned_articles().await);

        let items: Vec<Article> = sort_by_time(articles, self.sort_order)
            .into_iter()
            .map(|dated| dated.article)
            .collect();

        let existing = match self.store.load_existing().await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(path = %self.store.path().display(), error = %e, "Previous digest unreadable, replacing it");
                Digest::default()
            }
        };

        let written = should_update(&items, &existing.items);
        let digest = if written {
            let digest = Digest {
                items,
                updated: format_display(Utc::now(), &self.updated_format),
            };
            self.store.save(&digest).await?;
            digest
        } else {
            tracing::info!("Articles unchanged, skipping write");
            existing
        };

        let report = RunReport {
            digest,
            tally,
            success_count,
            total,
            written,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            total = report.total,
            succeeded = report.success_count,
            written = report.written,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "{}",
            report.summary()
        );
        Ok(report)
    }

    /// Pinned articles dated from their display string; unreadable dates
    /// sort as the oldest. A pinned list that cannot be loaded is skipped.
    async fn pinned_articles(&self) -> Vec<DatedArticle> {
        let Some(location) = self.pinned.as_deref() else {
            return Vec::new();
        };
        let pinned = match load_pinned(&self.client, location).await {
            Ok(pinned) => pinned,
            Err(e) => {
                tracing::warn!(location, error = %e, "Pinned articles unavailable, continuing without them");
                return Vec::new();
            }
        };

        pinned
            .into_iter()
            .map(|mut article| {
                if article.avatar.trim().is_empty() {
                    article.avatar = self.default_avatar.clone();
                }
                let published_at = parse_display(&article.published, &self.published_format)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                DatedArticle { article, published_at }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::digest::aggregate::Problem;
    use crate::test_support::{rss_with_items, serve};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tempfile::TempDir;

    const DEFAULT_AVATAR: &str = "https://example.com/default.png";

    struct TestPipeline {
        pipeline: Pipeline,
        output: std::path::PathBuf,
        _dir: TempDir,
    }

    fn test_pipeline(sort_order: SortOrder) -> TestPipeline {
        test_pipeline_with(sort_order, |_, _| {})
    }

    fn test_pipeline_with(sort_order: SortOrder, adjust: impl FnOnce(&mut Config, &std::path::Path)) -> TestPipeline {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("out").join("data.json");
        let mut config = Config {
            output_path: output.clone(),
            default_avatar: DEFAULT_AVATAR.to_string(),
            capacity: 4,
            deadline_secs: 30,
            liveness_timeout_secs: 2,
            sort_order,
            retry: RetryConfig {
                max_attempts: 3,
                base_wait_ms: 10,
                multiplier: 2.0,
            },
            ..Config::default()
        };
        adjust(&mut config, dir.path());
        TestPipeline {
            pipeline: Pipeline::new(&config).unwrap(),
            output,
            _dir: dir,
        }
    }

    async fn feed_server(avatar_base: &str) -> (String, tokio::task::JoinHandle<()>) {
        let good = rss_with_items(
            "Good Blog",
            "https://good.example.com/",
            Some(&format!("{avatar_base}/avatar.png")),
            &[
                ("Fresh post", "https://good.example.com/fresh", "Mon, 10 Mar 2025 08:00:00 +0000"),
                ("Old post", "https://good.example.com/old", "Sat, 01 Mar 2025 08:00:00 +0000"),
            ],
        );
        let older = rss_with_items(
            "Older Blog",
            "",
            None,
            &[("Last year", "https://older.example.com/post", "Tue, 05 Mar 2024 12:00:00 +0000")],
        );
        let empty = rss_with_items("Quiet Blog", "https://quiet.example.com/", None, &[]);
        let odd = rss_with_items(
            "Odd Blog",
            "",
            None,
            &[("Undated", "https://odd.example.com/post", "sometime last spring")],
        );

        let router = Router::new()
            .route("/good.xml", get(move || async move { good }))
            .route("/older.xml", get(move || async move { older }))
            .route("/broken.xml", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/empty.xml", get(move || async move { empty }))
            .route("/odd.xml", get(move || async move { odd }));
        serve(router).await
    }

    #[tokio::test]
    async fn classifies_sorts_and_writes_digest() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline(SortOrder::Descending);

        let sources = vec![
            format!("{base}/older.xml"),
            format!("{base}/broken.xml"),
            format!("{base}/empty.xml"),
            format!("{base}/good.xml"),
        ];
        let report = test.pipeline.run(sources).await.unwrap();

        assert_eq!(report.total, 4);
        assert_eq!(report.success_count, 2);
        assert!(report.written);
        assert_eq!(report.tally.urls(Problem::ParseFailed), [format!("{base}/broken.xml")]);
        assert_eq!(report.tally.urls(Problem::FeedEmpty), [format!("{base}/empty.xml")]);
        assert_eq!(report.tally.urls(Problem::NoAvatar), [format!("{base}/older.xml")]);
        assert!(report.tally.urls(Problem::BrokenAvatar).is_empty());

        let titles: Vec<_> = report.digest.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Fresh post", "Last year"]);
        assert_eq!(report.digest.items[0].avatar, format!("{avatar_base}/avatar.png"));
        assert_eq!(report.digest.items[0].published, "10 Mar 2025");
        assert_eq!(report.digest.items[1].avatar, DEFAULT_AVATAR);

        let saved: Digest = serde_json::from_str(&std::fs::read_to_string(&test.output).unwrap()).unwrap();
        assert_eq!(saved, report.digest);

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn one_good_one_failing_one_empty() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline(SortOrder::Descending);

        let (good, broken, empty) = (
            format!("{base}/good.xml"),
            format!("{base}/broken.xml"),
            format!("{base}/empty.xml"),
        );
        let report = test.pipeline.run(vec![good, broken.clone(), empty.clone()]).await.unwrap();

        assert_eq!(report.digest.items.len(), 1);
        assert_eq!(report.tally.urls(Problem::ParseFailed), [broken]);
        assert_eq!(report.tally.urls(Problem::FeedEmpty), [empty]);
        assert!(report.tally.urls(Problem::NoAvatar).is_empty());

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn unrecognized_date_sorts_as_now() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline(SortOrder::Descending);

        let before = Utc::now();
        let report = test
            .pipeline
            .run(vec![format!("{base}/good.xml"), format!("{base}/odd.xml")])
            .await
            .unwrap();
        let after = Utc::now();

        assert_eq!(report.success_count, 2);
        let titles: Vec<_> = report.digest.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Undated", "Fresh post"]);
        // The run may straddle midnight.
        let published = &report.digest.items[0].published;
        assert!(
            *published == format_display(before, "%d %b %Y") || *published == format_display(after, "%d %b %Y"),
            "unexpected display date {published}"
        );

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn pinned_articles_are_merged_sorted_and_compared() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline_with(SortOrder::Descending, |config, dir| {
            let path = dir.join("pinned.json");
            std::fs::write(
                &path,
                r#"[
                    {"blog_name": "Friends", "title": "Blogroll", "published": "05 Mar 2025",
                     "link": "https://example.com/blogroll", "avatar": ""},
                    {"blog_name": "Friends", "title": "Undated", "published": "long ago",
                     "link": "https://example.com/undated", "avatar": "https://example.com/me.png"}
                ]"#,
            )
            .unwrap();
            config.pinned = Some(path.to_string_lossy().into_owned());
        });
        let sources = vec![format!("{base}/good.xml"), format!("{base}/older.xml")];

        let first = test.pipeline.run(sources.clone()).await.unwrap();

        assert!(first.written);
        assert_eq!(first.total, 2);
        assert_eq!(first.success_count, 2);
        let titles: Vec<_> = first.digest.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Fresh post", "Blogroll", "Last year", "Undated"]);
        assert_eq!(first.digest.items[1].avatar, DEFAULT_AVATAR);
        assert_eq!(first.digest.items[3].avatar, "https://example.com/me.png");

        let second = test.pipeline.run(sources).await.unwrap();
        assert!(!second.written);

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn unreadable_pinned_list_does_not_stop_the_run() {
        let (base, server) = feed_server("http://127.0.0.1:9").await;
        let test = test_pipeline_with(SortOrder::Descending, |config, dir| {
            config.pinned = Some(dir.join("missing.json").to_string_lossy().into_owned());
        });

        let report = test.pipeline.run(vec![format!("{base}/older.xml")]).await.unwrap();

        assert!(report.written);
        assert_eq!(report.digest.items.len(), 1);

        server.abort();
    }

    #[tokio::test]
    async fn ascending_order_puts_oldest_first() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline(SortOrder::Ascending);

        let report = test
            .pipeline
            .run(vec![format!("{base}/good.xml"), format!("{base}/older.xml")])
            .await
            .unwrap();

        let titles: Vec<_> = report.digest.items.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, ["Last year", "Fresh post"]);

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn identical_second_run_skips_the_write() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline(SortOrder::Descending);
        let sources = vec![format!("{base}/good.xml"), format!("{base}/older.xml")];

        let first = test.pipeline.run(sources.clone()).await.unwrap();
        assert!(first.written);
        let on_disk = std::fs::read_to_string(&test.output).unwrap();

        let second = test.pipeline.run(sources).await.unwrap();
        assert!(!second.written);
        assert_eq!(second.digest, first.digest);
        assert_eq!(std::fs::read_to_string(&test.output).unwrap(), on_disk);

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn corrupt_previous_digest_is_replaced() {
        let (avatar_base, avatar_server) =
            serve(Router::new().route("/avatar.png", get(|| async { "png" }))).await;
        let (base, server) = feed_server(&avatar_base).await;
        let test = test_pipeline(SortOrder::Descending);
        std::fs::create_dir_all(test.output.parent().unwrap()).unwrap();
        std::fs::write(&test.output, "{ not json").unwrap();

        let report = test.pipeline.run(vec![format!("{base}/good.xml")]).await.unwrap();
        assert!(report.written);
        assert_eq!(report.digest.items.len(), 1);

        server.abort();
        avatar_server.abort();
    }

    #[tokio::test]
    async fn nothing_fetched_and_nothing_stored_means_no_write() {
        let (base, server) = feed_server("http://127.0.0.1:9").await;
        let test = test_pipeline(SortOrder::Descending);

        let report = test.pipeline.run(vec![format!("{base}/empty.xml")]).await.unwrap();

        assert!(!report.written);
        assert!(report.digest.items.is_empty());
        assert!(!test.output.exists());
        assert!(report.summary().contains("1 feeds, 0 fetched successfully."));

        server.abort();
    }
}
