//! Artifact storage: writes rendered PDFs to the output directory.
//!
//! Filenames are `rendered-<UTC millis>-<random suffix>.pdf`, so concurrent
//! renders never collide even within the same millisecond.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

const ARTIFACT_PREFIX: &str = "rendered-";
const ARTIFACT_EXTENSION: &str = ".pdf";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid artifact name: {0}")]
    InvalidName(String),

    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A file persisted in the output directory.
#[derive(Debug, Clone, Serialize)]
pub struct StoredArtifact {
    pub filename: String,
    pub size_bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the output directory if needed.
    pub async fn ensure_dir(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Persists `bytes` under a fresh, collision-resistant name.
    pub async fn save(&self, bytes: &Bytes) -> Result<StoredArtifact, StorageError> {
        self.ensure_dir().await?;
        let filename = new_artifact_name();
        let path = self.dir.join(&filename);

        tokio::fs::write(&path, bytes).await?;
        info!(file = %filename, size = bytes.len(), "Artifact stored");

        Ok(StoredArtifact {
            filename,
            size_bytes: bytes.len(),
        })
    }

    /// Reads a previously stored artifact by its filename.
    pub async fn load(&self, filename: &str) -> Result<Bytes, StorageError> {
        if !is_artifact_name(filename) {
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        match tokio::fs::read(self.dir.join(filename)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(filename.to_string()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

fn new_artifact_name() -> String {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{ARTIFACT_PREFIX}{stamp}-{}{ARTIFACT_EXTENSION}", &suffix[..12])
}

/// Accepts only names this store could have produced: a flat file name made of
/// ASCII alphanumerics, `-` and `.`, with our prefix and extension.
pub fn is_artifact_name(name: &str) -> bool {
    name.starts_with(ARTIFACT_PREFIX)
        && name.ends_with(ARTIFACT_EXTENSION)
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}
