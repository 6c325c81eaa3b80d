use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use url::Url;

use crate::models::{AvatarOutcome, ParsedFeed};

/// Finds a representative image for a feed's site.
///
/// Chain, first hit wins: configured override for the site host, the feed's
/// own image, podcast artwork, the homepage's `<link rel="...icon...">`,
/// the homepage's `og:image`, and finally `scheme://host/favicon.ico`.
pub struct AvatarResolver {
    client: Client,
    liveness_timeout: Duration,
    get_fallback: bool,
    overrides: HashMap<String, String>,
}

impl AvatarResolver {
    pub fn new(client: Client, liveness_timeout: Duration) -> Self {
        Self {
            client,
            liveness_timeout,
            get_fallback: false,
            overrides: HashMap::new(),
        }
    }

    /// Retry a failed HEAD liveness probe once with GET.
    pub fn with_get_fallback(mut self, enabled: bool) -> Self {
        self.get_fallback = enabled;
        self
    }

    /// Avatars keyed by site host; keys are compared lower-cased.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides
            .into_iter()
            .map(|(host, avatar)| (host.trim().to_ascii_lowercase(), avatar))
            .collect();
        self
    }

    /// Best-effort avatar URL; empty when nothing at all could be derived.
    pub async fn resolve(&self, feed: &ParsedFeed) -> String {
        if let Some(avatar) = self.override_for(feed.link.as_deref()) {
            return avatar.to_string();
        }
        if let Some(image) = non_empty(feed.image.as_deref()) {
            return image.to_string();
        }
        if let Some(art) = non_empty(feed.podcast_image.as_deref()) {
            return art.to_string();
        }
        match non_empty(feed.link.as_deref()) {
            Some(homepage) => self.from_homepage(homepage).await,
            None => String::new(),
        }
    }

    /// Resolve and verify in one step.
    pub async fn resolve_checked(&self, feed: &ParsedFeed) -> (String, AvatarOutcome) {
        let avatar = self.resolve(feed).await;
        if avatar.is_empty() {
            return (avatar, AvatarOutcome::Missing);
        }
        if self.is_alive(&avatar).await {
            (avatar, AvatarOutcome::Live)
        } else {
            tracing::debug!(avatar = %avatar, "Avatar failed liveness check");
            (avatar, AvatarOutcome::Broken)
        }
    }

    /// HEAD the URL; only a 200 counts as alive.
    pub async fn is_alive(&self, url: &str) -> bool {
        let head = self
            .client
            .head(url)
            .timeout(self.liveness_timeout)
            .send()
            .await;
        if matches!(&head, Ok(resp) if resp.status() == StatusCode::OK) {
            return true;
        }
        if !self.get_fallback {
            return false;
        }

        // Some servers refuse HEAD outright.
        match self
            .client
            .get(url)
            .timeout(self.liveness_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    fn override_for(&self, link: Option<&str>) -> Option<&str> {
        if self.overrides.is_empty() {
            return None;
        }
        let host = Url::parse(link?.trim()).ok()?.host_str()?.to_ascii_lowercase();
        self.overrides
            .get(&host)
            .map(String::as_str)
            .filter(|avatar| !avatar.trim().is_empty())
    }

    async fn from_homepage(&self, homepage: &str) -> String {
        let Ok(base) = Url::parse(homepage) else {
            return String::new();
        };

        let html = match self.client.get(base.clone()).send().await {
            Ok(resp) if resp.status().is_success() => resp.text().await.ok(),
            Ok(resp) => {
                tracing::debug!(homepage, status = %resp.status(), "Homepage fetch rejected");
                None
            }
            Err(e) => {
                tracing::debug!(homepage, error = %e, "Homepage fetch failed");
                None
            }
        };

        html.and_then(|html| scan_homepage(&html, &base))
            .or_else(|| favicon_url(&base))
            .unwrap_or_default()
    }
}

/// Look for a site icon in homepage markup, falling back to `og:image`.
/// Hits are made absolute against `base`.
pub fn scan_homepage(html: &str, base: &Url) -> Option<String> {
    let document = Html::parse_document(html);
    let link_selector = Selector::parse("link[rel][href]").ok()?;
    let meta_selector = Selector::parse("meta[property][content]").ok()?;

    let icon = document.select(&link_selector).find_map(|el| {
        let rel = el.value().attr("rel")?.to_ascii_lowercase();
        let href = el.value().attr("href")?.trim();
        (rel.contains("icon") && !href.is_empty()).then_some(href)
    });

    let found = icon.or_else(|| {
        document.select(&meta_selector).find_map(|el| {
            let property = el.value().attr("property")?.trim();
            let content = el.value().attr("content")?.trim();
            (property.eq_ignore_ascii_case("og:image") && !content.is_empty()).then_some(content)
        })
    })?;

    Some(absolutize(base, found))
}

/// `scheme://host[:port]/favicon.ico` for http(s) URLs.
pub fn favicon_url(homepage: &Url) -> Option<String> {
    if !matches!(homepage.scheme(), "http" | "https") || homepage.host_str().is_none() {
        return None;
    }
    Some(format!("{}/favicon.ico", homepage.origin().ascii_serialization()))
}

fn absolutize(base: &Url, reference: &str) -> String {
    base.join(reference)
        .map(String::from)
        .unwrap_or_else(|_| reference.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
