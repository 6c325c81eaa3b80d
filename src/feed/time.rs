use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Accepted published-time layouts, tried in order after RFC 2822.
const OFFSET_FORMATS: &[&str] = &[
    // "Mon, 02 Jan 2006 15:04:05 -0700"
    "%a, %d %b %Y %H:%M:%S %z",
    // "2025-02-09T13:20:27.000Z" / "+08:00"
    "%Y-%m-%dT%H:%M:%S%.3f%:z",
];

/// Layouts carrying a zone abbreviation, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    // "Mon, 02 Jan 2006 15:04:05 MST"
    "%a, %d %b %Y %H:%M:%S %Z",
];

/// Parse a raw published-time string against the accepted formats
/// (RFC 1123 with and without numeric zone, RFC 3339, RFC 3339 with
/// milliseconds).
pub fn parse_published(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Pick the published time for an entry: the parser's own timestamp first,
/// then the raw text, then `now`. The last step only costs sort accuracy.
pub fn resolve_published(
    pre_parsed: Option<DateTime<Utc>>,
    raw: Option<&str>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    if let Some(dt) = pre_parsed {
        return dt;
    }
    match raw.and_then(parse_published) {
        Some(dt) => dt,
        None => {
            tracing::debug!(raw = ?raw, "Unrecognized published time, using current time");
            now
        }
    }
}

/// Read back a date rendered by [`format_display`]; date-only formats land
/// on midnight UTC. Falls back to the feed layouts.
pub fn parse_display(text: &str, format: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
        return Some(naive.and_utc());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(text, format)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Some(midnight.and_utc());
    }
    parse_published(text)
}

/// Render `dt` with a strftime-style `format`; an unusable format falls
/// back to RFC 3339 instead of panicking.
pub fn format_display(dt: DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", dt.format(format)).is_err() {
        return dt.to_rfc3339();
    }
    out
}
