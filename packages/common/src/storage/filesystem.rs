use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use super::error::StorageError;
use super::traits::{BinaryStore, ByteStream, UploadSink};
use super::types::{ByteRange, FileId, StoredFile, UploadOptions};

/// Filesystem-backed file bucket.
///
/// Layout:
/// `{base_path}/files/{id}.json` holds the [`StoredFile`] record,
/// `{base_path}/files/{id}.bin` holds the content,
/// `{base_path}/.tmp/{id}` holds uploads that have not finished yet.
///
/// The record is written last, so a file is visible only after its content is complete.
pub struct FilesystemBucket {
    base_path: PathBuf,
    chunk_size: usize,
}

impl FilesystemBucket {
    /// Create a new filesystem bucket, creating its directories.
    pub async fn new(base_path: PathBuf, chunk_size: usize) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join("files")).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            chunk_size: chunk_size.max(1),
        })
    }

    fn files_dir(&self) -> PathBuf {
        self.base_path.join("files")
    }

    fn tmp_dir(&self) -> PathBuf {
        self.base_path.join(".tmp")
    }

    fn data_path(&self, id: FileId) -> PathBuf {
        self.files_dir().join(format!("{id}.bin"))
    }

    fn record_path(&self, id: FileId) -> PathBuf {
        self.files_dir().join(format!("{id}.json"))
    }

    async fn read_record(path: &Path) -> Result<Option<StoredFile>, StorageError> {
        match fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read every record in the bucket.
    async fn all_records(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(self.files_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_record(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {} // Deleted concurrently.
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable file record"),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl BinaryStore for FilesystemBucket {
    async fn open_upload_stream(
        &self,
        filename: &str,
        options: UploadOptions,
    ) -> Result<Box<dyn UploadSink>, StorageError> {
        let id = FileId::new();
        let temp_path = self.tmp_dir().join(id.to_string());
        let file = fs::File::create(&temp_path).await?;

        Ok(Box::new(FilesystemUploadSink {
            id,
            filename: filename.to_string(),
            options,
            chunk_size: self.chunk_size,
            record_temp_path: temp_path.with_extension("json"),
            temp_path,
            data_path: self.data_path(id),
            record_path: self.record_path(id),
            file: Some(file),
            length: 0,
            closed: false,
        }))
    }

    async fn find_by_id(&self, id: FileId) -> Result<Option<StoredFile>, StorageError> {
        Self::read_record(&self.record_path(id)).await
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Vec<StoredFile>, StorageError> {
        let mut matches: Vec<StoredFile> = self
            .all_records()
            .await?
            .into_iter()
            .filter(|r| r.filename == filename)
            .collect();
        matches.sort_by(|a, b| b.upload_date.cmp(&a.upload_date).then(b.id.cmp(&a.id)));
        Ok(matches)
    }

    async fn list_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredFile>, StorageError> {
        Ok(self
            .all_records()
            .await?
            .into_iter()
            .filter(|r| r.upload_date < cutoff)
            .collect())
    }

    async fn purge_incomplete(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let mut removed = 0;
        let mut entries = fs::read_dir(self.tmp_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let modified = entry.metadata().await?.modified()?;
            if DateTime::<Utc>::from(modified) >= cutoff {
                continue;
            }
            let path = entry.path();
            match fs::remove_file(&path).await {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove abandoned upload")
                }
            }
        }
        Ok(removed)
    }

    async fn open_download_stream(
        &self,
        id: FileId,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, StorageError> {
        let record = self
            .find_by_id(id)
            .await?
            .ok_or(StorageError::NotFound(id))?;

        let mut file = match fs::File::open(self.data_path(id)).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::MissingChunk { id, n: 0 });
            }
            Err(e) => return Err(e.into()),
        };

        let (start, len) = match range {
            Some(r) => {
                if r.end >= record.length {
                    return Err(StorageError::InvalidRange {
                        start: r.start,
                        end: r.end,
                        length: record.length,
                    });
                }
                (r.start, r.len())
            }
            None => (0, record.length),
        };

        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        let stream = ReaderStream::with_capacity(file.take(len), self.chunk_size)
            .map(|chunk| chunk.map_err(StorageError::from));
        Ok(stream.boxed())
    }

    async fn delete(&self, id: FileId) -> Result<(), StorageError> {
        match fs::remove_file(self.record_path(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(self.data_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

struct FilesystemUploadSink {
    id: FileId,
    filename: String,
    options: UploadOptions,
    chunk_size: usize,
    temp_path: PathBuf,
    record_temp_path: PathBuf,
    data_path: PathBuf,
    record_path: PathBuf,
    /// `None` once writing has stopped.
    file: Option<fs::File>,
    length: u64,
    /// Set once the record is published or the upload aborted.
    closed: bool,
}

async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[async_trait]
impl UploadSink for FilesystemUploadSink {
    async fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let file = self.file.as_mut().ok_or(StorageError::SinkClosed(self.id))?;
        file.write_all(data).await?;
        self.length += data.len() as u64;
        Ok(())
    }

    /// On error nothing is published. Call [`UploadSink::abort`] to remove what was written.
    async fn finish(&mut self) -> Result<StoredFile, StorageError> {
        if self.closed {
            return Err(StorageError::SinkClosed(self.id));
        }
        let mut file = self.file.take().ok_or(StorageError::SinkClosed(self.id))?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&self.temp_path, &self.data_path).await?;

        let record = StoredFile {
            id: self.id,
            filename: self.filename.clone(),
            content_type: self.options.content_type.clone(),
            length: self.length,
            chunk_size: u32::try_from(self.chunk_size).unwrap_or(u32::MAX),
            metadata: self.options.metadata.clone(),
            upload_date: Utc::now(),
        };

        let encoded = serde_json::to_vec(&record)
            .map_err(|e| StorageError::Corrupt(format!("failed to encode record: {e}")))?;
        fs::write(&self.record_temp_path, encoded).await?;
        fs::rename(&self.record_temp_path, &self.record_path).await?;

        self.closed = true;
        Ok(record)
    }

    async fn abort(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.file = None;

        let mut result = Ok(());
        for path in [&self.temp_path, &self.record_temp_path, &self.data_path] {
            if let Err(e) = remove_if_present(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
                result = Err(e.into());
            }
        }
        result
    }
}
