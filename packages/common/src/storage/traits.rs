use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;
use super::types::{ByteRange, FileId, StoredFile, UploadOptions};

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Lazily produced file content, one chunk per item.
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Read buffer used when piping a reader into an upload sink.
const PIPE_BUFFER_SIZE: usize = 64 * 1024;

/// Writable side of a single upload.
///
/// The file becomes visible to readers only once [`UploadSink::finish`] returns.
#[async_trait]
pub trait UploadSink: Send {
    /// Append bytes to the upload.
    async fn write(&mut self, data: &[u8]) -> Result<(), StorageError>;

    /// Flush buffered bytes and publish the file record.
    async fn finish(&mut self) -> Result<StoredFile, StorageError>;

    /// Discard everything written so far.
    async fn abort(&mut self) -> Result<(), StorageError>;
}

/// Chunked large-object storage addressed by id or filename.
#[async_trait]
pub trait BinaryStore: Send + Sync {
    /// Start a new upload. Each call yields an independent sink.
    async fn open_upload_stream(
        &self,
        filename: &str,
        options: UploadOptions,
    ) -> Result<Box<dyn UploadSink>, StorageError>;

    /// Pipe `reader` end-to-end into a new upload and return the finished record.
    ///
    /// Every write is awaited before the next read. On failure the partial upload is aborted.
    async fn upload_from_reader(
        &self,
        filename: &str,
        options: UploadOptions,
        mut reader: BoxReader,
    ) -> Result<StoredFile, StorageError> {
        let mut sink = self.open_upload_stream(filename, options).await?;
        let mut buf = vec![0u8; PIPE_BUFFER_SIZE];

        loop {
            let n = match reader.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    abort_quietly(sink.as_mut()).await;
                    return Err(e.into());
                }
            };
            if n == 0 {
                break;
            }
            if let Err(e) = sink.write(&buf[..n]).await {
                abort_quietly(sink.as_mut()).await;
                return Err(e);
            }
        }

        match sink.finish().await {
            Ok(file) => Ok(file),
            Err(e) => {
                abort_quietly(sink.as_mut()).await;
                Err(e)
            }
        }
    }

    /// Look up a file record by id.
    async fn find_by_id(&self, id: FileId) -> Result<Option<StoredFile>, StorageError>;

    /// Look up several file records. Missing ids are skipped.
    async fn find_by_ids(&self, ids: &[FileId]) -> Result<Vec<StoredFile>, StorageError> {
        let mut files = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(file) = self.find_by_id(id).await? {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// All revisions stored under `filename`, newest first.
    async fn find_by_filename(&self, filename: &str) -> Result<Vec<StoredFile>, StorageError>;

    /// Files whose upload finished strictly before `cutoff`.
    async fn list_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredFile>, StorageError>;

    /// Remove content of uploads started before `cutoff` that never finished.
    ///
    /// Returns the number of abandoned uploads removed.
    async fn purge_incomplete(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError>;

    /// Stream a file's content, optionally restricted to `range`.
    async fn open_download_stream(
        &self,
        id: FileId,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, StorageError>;

    /// Stream the newest revision stored under `filename`.
    async fn open_download_stream_by_name(
        &self,
        filename: &str,
    ) -> Result<(StoredFile, ByteStream), StorageError> {
        let file = self
            .find_by_filename(filename)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StorageError::FilenameNotFound(filename.to_string()))?;
        let stream = self.open_download_stream(file.id, None).await?;
        Ok((file, stream))
    }

    /// Remove a file record and its content.
    ///
    /// Returns [`StorageError::NotFound`] if no such file exists.
    async fn delete(&self, id: FileId) -> Result<(), StorageError>;
}

async fn abort_quietly(sink: &mut dyn UploadSink) {
    if let Err(e) = sink.abort().await {
        tracing::warn!(error = %e, "Failed to abort upload stream");
    }
}
