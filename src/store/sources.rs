use reqwest::Client;

use super::opml::parse_opml_sources;
use crate::error::Result;

/// Load the feed list from an `http(s)://` URL or a local path.
pub async fn load_sources(client: &Client, location: &str) -> Result<Vec<String>> {
    let content = read_location(client, location).await?;
    let sources = parse_source_list(&content)?;
    tracing::info!(location, count = sources.len(), "Loaded feed sources");
    Ok(sources)
}

/// Body of an `http(s)://` URL, or the contents of a local file.
pub(super) async fn read_location(client: &Client, location: &str) -> Result<String> {
    let location = location.trim();
    if location.starts_with("http://") || location.starts_with("https://") {
        let response = client.get(location).send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Failed to fetch {location}: HTTP {}", response.status()).into());
        }
        Ok(response.text().await?)
    } else {
        Ok(tokio::fs::read_to_string(location).await?)
    }
}

/// Newline-delimited URLs (trimmed, blanks dropped) or an OPML document.
pub fn parse_source_list(content: &str) -> Result<Vec<String>> {
    if looks_like_opml(content) {
        return parse_opml_sources(content);
    }

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn looks_like_opml(content: &str) -> bool {
    let head = content.trim_start();
    head.starts_with("<opml") || (head.starts_with("<?xml") && head.contains("<opml"))
}
