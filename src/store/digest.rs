use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::Result;
use crate::models::Digest;

/// The persisted `{ items, updated }` document on local disk.
pub struct DigestStore {
    path: PathBuf,
}

impl DigestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The previous digest; a missing file is an empty one.
    pub async fn load_existing(&self) -> Result<Digest> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No previous digest, starting fresh");
                return Ok(Digest::default());
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&content)?)
    }

    pub async fn save(&self, digest: &Digest) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(digest)?;
        fs::write(&self.path, json).await?;

        tracing::info!(path = %self.path.display(), items = digest.items.len(), "Wrote digest");
        Ok(())
    }
}
