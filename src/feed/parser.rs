use feed_rs::model::{Entry, Feed, Link};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::models::{ParsedEntry, ParsedFeed};

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

/// Element names that may carry an entry's published time, most trusted first.
const DATE_TAGS: &[&str] = &["pubDate", "published", "date", "issued", "updated", "modified"];

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("feed body is empty")]
    EmptyBody,
    #[error("feed parse error: {0}")]
    Feed(#[from] feed_rs::parser::ParseFeedError),
}

/// Turns sanitized feed bytes into a [`ParsedFeed`].
///
/// Implementations hold no per-call state, so one instance is shared by
/// every concurrent fetch.
pub trait FeedParser: Send + Sync {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, ParseError>;
}

/// RSS 0.9x/1.0/2.0 and Atom via `feed-rs`, plus a raw XML pass for the
/// bits `feed-rs` normalizes away (original date text, iTunes artwork).
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedRsParser;

impl FeedParser for FeedRsParser {
    fn parse(&self, body: &[u8]) -> Result<ParsedFeed, ParseError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ParseError::EmptyBody);
        }

        let feed = feed_rs::parser::parse(body)?;
        let raw = RawScan::from_bytes(body);
        Ok(build_parsed_feed(feed, raw))
    }
}

fn build_parsed_feed(feed: Feed, raw: RawScan) -> ParsedFeed {
    let title = feed
        .title
        .map(|t| t.content.trim().to_string())
        .unwrap_or_default();
    let link = site_link(&feed.links);
    let image = feed
        .logo
        .map(|img| img.uri)
        .or_else(|| feed.icon.map(|img| img.uri))
        .filter(|uri| !uri.trim().is_empty());

    let mut raw_dates = raw.entry_dates.into_iter();
    let entries = feed
        .entries
        .into_iter()
        .map(|entry| entry_from_model(entry, raw_dates.next().flatten()))
        .collect();

    ParsedFeed {
        title,
        link,
        image,
        podcast_image: raw.podcast_image,
        entries,
    }
}

fn entry_from_model(entry: Entry, published_raw: Option<String>) -> ParsedEntry {
    ParsedEntry {
        title: entry
            .title
            .map(|t| t.content.trim().to_string())
            .unwrap_or_default(),
        link: site_link(&entry.links).unwrap_or_default(),
        published: entry.published.or(entry.updated),
        published_raw,
    }
}

/// First `alternate` (or rel-less) link; `self`, `hub` and friends point
/// back at the feed, not the site.
fn site_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")) && !l.href.trim().is_empty())
        .map(|l| l.href.trim().to_string())
}

#[derive(Debug, Default)]
struct RawScan {
    podcast_image: Option<String>,
    /// One slot per `<item>`/`<entry>`, in document order.
    entry_dates: Vec<Option<String>>,
}

impl RawScan {
    /// Streaming pass that tolerates what `feed-rs` tolerates: entity
    /// references are skipped rather than resolved, and a hard XML error
    /// keeps everything collected up to that point.
    fn from_bytes(body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let mut reader = Reader::from_str(&text);

        let mut scan = Self::default();
        let mut itunes_prefixes: Vec<String> = Vec::new();
        let mut path: Vec<String> = Vec::new();
        // (index into DATE_TAGS, text) for the entry being read.
        let mut dates: Option<Vec<(usize, String)>> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = qualified_name(&e);
                    scan.visit(&e, &name, &path, &mut itunes_prefixes);
                    if is_entry(&name) {
                        dates = Some(Vec::new());
                    }
                    path.push(name);
                }
                Ok(Event::Empty(e)) => {
                    let name = qualified_name(&e);
                    scan.visit(&e, &name, &path, &mut itunes_prefixes);
                    if is_entry(&name) {
                        scan.entry_dates.push(None);
                    }
                }
                Ok(Event::End(_)) => {
                    if path.pop().is_some_and(|name| is_entry(&name)) {
                        scan.entry_dates.push(dates.take().and_then(pick_date));
                    }
                }
                Ok(Event::Text(t)) => capture_date(&path, dates.as_mut(), &t),
                Ok(Event::CData(t)) => capture_date(&path, dates.as_mut(), &t),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Raw XML scan stopped early");
                    break;
                }
            }
        }

        if let Some(open) = dates.take() {
            scan.entry_dates.push(pick_date(open));
        }
        scan
    }

    fn visit(&mut self, element: &BytesStart<'_>, name: &str, path: &[String], itunes_prefixes: &mut Vec<String>) {
        let mut href = None;
        for attr in element.attributes().flatten() {
            let key = String::from_utf8_lossy(attr.key.as_ref());
            let value = String::from_utf8_lossy(&attr.value);
            if let Some(prefix) = key.strip_prefix("xmlns:") {
                if value.trim() == ITUNES_NS {
                    itunes_prefixes.push(prefix.to_string());
                }
            } else if key == "href" {
                href = Some(value.trim().to_string());
            }
        }

        if self.podcast_image.is_some() {
            return;
        }
        let is_itunes_image = match name.split_once(':') {
            Some((prefix, "image")) => itunes_prefixes.iter().any(|p| p == prefix),
            _ => false,
        };
        let under_channel = path.last().is_some_and(|parent| local_name(parent) == "channel");
        if is_itunes_image && under_channel {
            self.podcast_image = href.filter(|h| !h.is_empty());
        }
    }
}

fn qualified_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn is_entry(name: &str) -> bool {
    matches!(local_name(name), "item" | "entry")
}

/// Append text to the date slot when the current element is a date tag
/// sitting directly under an entry.
fn capture_date(path: &[String], dates: Option<&mut Vec<(usize, String)>>, text: &[u8]) {
    let (Some(dates), [.., parent, current]) = (dates, path) else {
        return;
    };
    if !is_entry(parent) {
        return;
    }
    let Some(rank) = DATE_TAGS.iter().position(|tag| *tag == local_name(current)) else {
        return;
    };

    let text = String::from_utf8_lossy(text);
    match dates.iter_mut().find(|(r, _)| *r == rank) {
        Some((_, existing)) => existing.push_str(&text),
        None => dates.push((rank, text.into_owned())),
    }
}

fn pick_date(mut dates: Vec<(usize, String)>) -> Option<String> {
    dates.sort_by_key(|(rank, _)| *rank);
    dates
        .into_iter()
        .map(|(_, text)| text.trim().to_string())
        .find(|text| !text.is_empty())
}
