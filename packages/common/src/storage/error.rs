use thiserror::Error;

use super::types::FileId;

/// Errors that can occur during binary store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No stored file with the given id exists.
    #[error("stored file not found: {0}")]
    NotFound(FileId),

    /// No stored file with the given filename exists.
    #[error("no stored file named {0:?}")]
    FilenameNotFound(String),

    /// A chunk expected by the file record is absent or truncated.
    #[error("file {id} is missing chunk {n}")]
    MissingChunk { id: FileId, n: u64 },

    /// The requested byte range lies outside the stored file.
    #[error("range {start}-{end} is outside a file of {length} bytes")]
    InvalidRange { start: u64, end: u64, length: u64 },

    /// The upload sink was already finished or aborted.
    #[error("upload stream for {0} is closed")]
    SinkClosed(FileId),

    /// A stored record could not be decoded.
    #[error("corrupt file record: {0}")]
    Corrupt(String),

    /// An I/O error occurred.
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing database or service reported an error.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Whether the error means the addressed file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::FilenameNotFound(_))
    }
}

impl From<StorageError> for std::io::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(e) => e,
            other => std::io::Error::other(other),
        }
    }
}
