use std::fmt::Display;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::config::UploadConfig;
use crate::error::AppError;

/// Declared MIME types accepted for video files.
pub const VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/x-msvideo",
    "video/x-ms-wmv",
    "video/mpeg",
    "video/ogg",
    "video/webm",
];

/// Declared MIME types accepted for thumbnails.
pub const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Video,
    Thumbnail,
}

impl FileKind {
    fn accepts(self, content_type: &str) -> bool {
        let allowed = match self {
            FileKind::Video => VIDEO_MIME_TYPES,
            FileKind::Thumbnail => IMAGE_MIME_TYPES,
        };
        allowed.iter().any(|t| t.eq_ignore_ascii_case(content_type))
    }
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("unsupported {0:?} type")]
    UnsupportedType(FileKind),
    #[error("file exceeds {0} bytes")]
    TooLarge(u64),
    #[error("upload read error: {0}")]
    Read(String),
    #[error("staging IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StageError> for AppError {
    fn from(err: StageError) -> Self {
        match err {
            StageError::UnsupportedType(FileKind::Video) => AppError::Validation(
                "The uploaded file is not a supported video format".into(),
            ),
            StageError::UnsupportedType(FileKind::Thumbnail) => AppError::Validation(
                "A valid thumbnail image is required (jpeg, png, gif)".into(),
            ),
            StageError::TooLarge(_) => AppError::Validation("The uploaded file is too large".into()),
            StageError::Read(e) => AppError::Validation(format!("Upload read error: {e}")),
            StageError::Io(e) => AppError::Internal(format!("Staging failed: {e}")),
        }
    }
}

/// A multipart file held on local disk until it is promoted to the store.
#[derive(Debug)]
pub struct StagedFile {
    pub kind: FileKind,
    pub path: PathBuf,
    /// Generated name, reused as the stored filename.
    pub staged_name: String,
    pub original_name: Option<String>,
    pub content_type: String,
    pub size: u64,
}

/// Local holding area for uploads.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
    max_video_size: u64,
    max_thumbnail_size: u64,
}

impl Staging {
    /// Create the staging directory if needed.
    pub async fn init(config: &UploadConfig) -> std::io::Result<Self> {
        tokio::fs::create_dir_all(&config.staging_dir).await?;
        Ok(Self {
            dir: config.staging_dir.clone(),
            max_video_size: config.max_video_size,
            max_thumbnail_size: config.max_thumbnail_size,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn max_size(&self, kind: FileKind) -> u64 {
        match kind {
            FileKind::Video => self.max_video_size,
            FileKind::Thumbnail => self.max_thumbnail_size,
        }
    }

    /// Check the declared type, then write `stream` to a freshly named file.
    ///
    /// The size ceiling is enforced while writing. On failure nothing is left on disk.
    pub async fn stage_stream<S, E>(
        &self,
        kind: FileKind,
        original_name: Option<&str>,
        content_type: Option<&str>,
        stream: S,
    ) -> Result<StagedFile, StageError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let content_type = content_type
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| kind.accepts(t))
            .ok_or(StageError::UnsupportedType(kind))?;

        let staged_name = staged_name(original_name);
        let path = self.dir.join(&staged_name);
        let max_size = self.max_size(kind);

        let result = async {
            let mut file = tokio::fs::File::create(&path).await?;
            let mut size: u64 = 0;
            let mut stream = std::pin::pin!(stream);

            while let Some(chunk) = stream.next().await {
                let chunk = chunk.map_err(|e| StageError::Read(e.to_string()))?;
                size += chunk.len() as u64;
                if size > max_size {
                    return Err(StageError::TooLarge(max_size));
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(size)
        }
        .await;

        match result {
            Ok(size) => {
                tracing::debug!(staged = %staged_name, size, ?kind, "Staged upload");
                Ok(StagedFile {
                    kind,
                    path,
                    staged_name,
                    original_name: original_name.map(str::to_string),
                    content_type,
                    size,
                })
            }
            Err(e) => {
                remove_quietly(&path).await;
                Err(e)
            }
        }
    }

    /// Remove a staged file. Best effort.
    pub async fn discard(&self, file: &StagedFile) {
        remove_quietly(&file.path).await;
    }

    /// Remove staged files last modified before `cutoff`, left over from interrupted requests.
    pub async fn purge_stale(&self, cutoff: DateTime<Utc>) -> std::io::Result<usize> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || DateTime::<Utc>::from(metadata.modified()?) >= cutoff {
                continue;
            }
            remove_quietly(&entry.path()).await;
            removed += 1;
        }
        Ok(removed)
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove staged file"),
    }
}

/// 32 random hex characters followed by the original extension, if it looks sane.
pub fn staged_name(original_name: Option<&str>) -> String {
    let stem = hex::encode(rand::random::<[u8; 16]>());
    let ext = original_name
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 10 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(str::to_ascii_lowercase);
    match ext {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}
