use chrono::{DateTime, Utc};

/// Fixed-shape view of a parsed RSS or Atom document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    pub title: String,
    /// Canonical site URL (never the feed's own `rel="self"` link).
    pub link: Option<String>,
    /// `<image><url>` for RSS, `<logo>`/`<icon>` for Atom.
    pub image: Option<String>,
    /// Channel-level `<itunes:image href="...">`.
    pub podcast_image: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    /// Timestamp already understood by the feed parser.
    pub published: Option<DateTime<Utc>>,
    /// The published-time text exactly as it appeared in the document.
    pub published_raw: Option<String>,
}
