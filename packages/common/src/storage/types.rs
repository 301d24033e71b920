use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;

/// Default chunk size for stored files (255 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 255 * 1024;

/// Identifier the store assigns to a file when its upload finishes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// Allocate a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// When the id was allocated. `None` for ids that carry no timestamp.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let (secs, nanos) = self.0.get_timestamp()?.to_unix();
        DateTime::from_timestamp(i64::try_from(secs).ok()?, nanos)
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for FileId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl From<FileId> for Uuid {
    fn from(id: FileId) -> Self {
        id.0
    }
}

impl FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record describing a completely uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    /// Name the file was uploaded under. Not unique: several revisions may share it.
    pub filename: String,
    pub content_type: Option<String>,
    /// Total size in bytes.
    pub length: u64,
    pub chunk_size: u32,
    /// Free-form metadata supplied at upload time.
    pub metadata: Option<serde_json::Value>,
    pub upload_date: DateTime<Utc>,
}

/// Options for a new upload stream.
#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub content_type: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// An inclusive byte range within a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Build a range, checking it lies within a file of `length` bytes.
    pub fn new(start: u64, end: u64, length: u64) -> Result<Self, StorageError> {
        if start > end || end >= length {
            return Err(StorageError::InvalidRange { start, end, length });
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered. Never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Indices of the first and last chunk touched by this range.
    pub fn chunk_span(&self, chunk_size: u64) -> (u64, u64) {
        (self.start / chunk_size, self.end / chunk_size)
    }

    /// Slice bounds inside chunk `n` that fall within this range.
    ///
    /// Returns `None` when the chunk does not overlap the range.
    pub fn within_chunk(&self, n: u64, chunk_size: u64, chunk_len: usize) -> Option<(usize, usize)> {
        let chunk_start = n * chunk_size;
        let chunk_end = chunk_start + chunk_len as u64;
        if chunk_end <= self.start || chunk_start > self.end {
            return None;
        }
        let lo = self.start.saturating_sub(chunk_start);
        let hi = (self.end + 1 - chunk_start).min(chunk_len as u64);
        Some((lo as usize, hi as usize))
    }
}
