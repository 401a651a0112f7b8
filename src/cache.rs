use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::github::types::RepoRecord;

/// Errors from the fetch cache. Corruption is not represented here: an
/// unreadable artifact is handled as a cache miss so the language is simply
/// re-fetched and the artifact overwritten.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// The durable per-language raw fetch result. Never expired automatically;
/// deleting the file is the way to force a refresh.
#[derive(Serialize, Deserialize, Debug)]
pub struct FetchArtifact {
    pub language: String,
    pub fetched_at: DateTime<Utc>,
    pub records: Vec<RepoRecord>,
}

/// Filesystem store of fetch artifacts, one JSON file per language slug.
/// This is what makes an interrupted run resumable: cached languages are
/// skipped on re-invocation, only the remainder is fetched.
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn artifact_path(&self, slug: &str) -> PathBuf {
        self.dir.join(format!("{slug}.json"))
    }

    /// Returns the cached artifact, or `None` if it is absent or corrupt.
    pub fn load(&self, slug: &str) -> Option<FetchArtifact> {
        let path = self.artifact_path(slug);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(slug, %e, "failed to read cache artifact, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(artifact) => Some(artifact),
            Err(e) => {
                warn!(slug, %e, path = %path.display(), "corrupt cache artifact, treating as miss");
                None
            }
        }
    }

    pub fn has(&self, slug: &str) -> bool {
        self.load(slug).is_some()
    }

    /// Persists a fetch result atomically: the artifact is written to a
    /// temporary sibling and renamed into place, so a crash mid-write never
    /// leaves a partially written file under the artifact's name.
    pub fn store(&self, slug: &str, language: &str, records: &[RepoRecord]) -> Result<PathBuf, CacheError> {
        fs::create_dir_all(&self.dir)?;
        let artifact = FetchArtifact {
            language: language.to_string(),
            fetched_at: Utc::now(),
            records: records.to_vec(),
        };
        let path = self.artifact_path(slug);
        let tmp = self.dir.join(format!("{slug}.json.tmp"));
        fs::write(&tmp, serde_json::to_vec(&artifact)?)?;
        fs::rename(&tmp, &path)?;
        debug!(slug, count = records.len(), "stored fetch artifact");
        Ok(path)
    }
}
