use reqwest::Client;

use super::sources::read_location;
use crate::error::Result;
use crate::models::Article;

/// Hand-maintained articles merged into every digest, read from a JSON
/// array at an `http(s)://` URL or a local path.
pub async fn load_pinned(client: &Client, location: &str) -> Result<Vec<Article>> {
    let content = read_location(client, location).await?;
    let pinned: Vec<Article> = serde_json::from_str(&content)?;
    tracing::info!(location, count = pinned.len(), "Loaded pinned articles");
    Ok(pinned)
}
