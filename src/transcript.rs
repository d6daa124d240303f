//! Flat transcript capture for finished sessions.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::llm::ChatMessage;

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("failed to write transcript {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize transcript: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Sink for completed conversations.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Persist `messages`, returning where they were written.
    async fn save(&self, messages: &[ChatMessage]) -> Result<PathBuf, TranscriptError>;
}

/// Writes each transcript as pretty JSON to `<dir>/<YYYYmmdd_HHMMSS>.json`.
pub struct FileTranscriptStore {
    dir: PathBuf,
}

impl FileTranscriptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a fresh file for a transcript saved at `at`. A numeric suffix is
    /// added when a transcript from the same second already exists; files are
    /// claimed with `create_new`, so concurrent saves never share a path.
    async fn create_file(&self, at: DateTime<Local>) -> Result<(PathBuf, File), TranscriptError> {
        let stem = at.format("%Y%m%d_%H%M%S").to_string();
        let mut path = self.dir.join(format!("{}.json", stem));
        let mut n = 1;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    path = self.dir.join(format!("{}_{}.json", stem, n));
                    n += 1;
                }
                Err(source) => return Err(TranscriptError::Io { path, source }),
            }
        }
    }

    async fn save_at(
        &self,
        messages: &[ChatMessage],
        at: DateTime<Local>,
    ) -> Result<PathBuf, TranscriptError> {
        let json = serde_json::to_string_pretty(messages)?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| TranscriptError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let (path, mut file) = self.create_file(at).await?;
        let written = async {
            file.write_all(json.as_bytes()).await?;
            file.flush().await
        };
        written.await.map_err(|source| TranscriptError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!("Conversation saved to {}", path.display());
        Ok(path)
    }
}

#[async_trait]
impl TranscriptStore for FileTranscriptStore {
    async fn save(&self, messages: &[ChatMessage]) -> Result<PathBuf, TranscriptError> {
        self.save_at(messages, Local::now()).await
    }
}
