use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use common::storage::{
    BinaryStore, ByteRange, ByteStream, FileId, StorageError, StoredFile, UploadOptions,
    UploadSink,
};
use futures::StreamExt;
use sea_orm::sea_query::{Query, SelectStatement};
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{bucket_chunk, bucket_file};

fn backend(err: DbErr) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Chunked file bucket kept in the application database.
///
/// Content lives in `bucket_chunk` rows of `chunk_size` bytes (the last one may be shorter).
/// The `bucket_file` row is inserted after the last chunk, so readers never see a partial file.
#[derive(Clone)]
pub struct DatabaseBucket {
    db: DatabaseConnection,
    chunk_size: usize,
}

impl DatabaseBucket {
    pub fn new(db: DatabaseConnection, chunk_size: usize) -> Self {
        Self {
            db,
            chunk_size: chunk_size.max(1),
        }
    }
}

impl TryFrom<bucket_file::Model> for StoredFile {
    type Error = StorageError;

    fn try_from(model: bucket_file::Model) -> Result<Self, Self::Error> {
        let length = u64::try_from(model.length)
            .map_err(|_| StorageError::Corrupt(format!("file {} has negative length", model.id)))?;
        let chunk_size = u32::try_from(model.chunk_size)
            .ok()
            .filter(|&s| s > 0)
            .ok_or_else(|| {
                StorageError::Corrupt(format!("file {} has invalid chunk size", model.id))
            })?;
        Ok(StoredFile {
            id: FileId::from_uuid(model.id),
            filename: model.filename,
            content_type: model.content_type,
            length,
            chunk_size,
            metadata: model.metadata,
            upload_date: model.upload_date,
        })
    }
}

/// Ids of every published file.
fn published_ids() -> SelectStatement {
    Query::select()
        .column(bucket_file::Column::Id)
        .from(bucket_file::Entity)
        .to_owned()
}

fn into_stored(models: Vec<bucket_file::Model>) -> Result<Vec<StoredFile>, StorageError> {
    models.into_iter().map(StoredFile::try_from).collect()
}

struct DatabaseUploadSink {
    db: DatabaseConnection,
    id: FileId,
    filename: String,
    options: UploadOptions,
    chunk_size: usize,
    buffer: Vec<u8>,
    next_chunk: i32,
    length: u64,
    closed: bool,
}

impl DatabaseUploadSink {
    async fn flush_chunk(&mut self, data: Vec<u8>) -> Result<(), StorageError> {
        let chunk = bucket_chunk::ActiveModel {
            files_id: Set(self.id.as_uuid()),
            n: Set(self.next_chunk),
            data: Set(data),
        };
        bucket_chunk::Entity::insert(chunk)
            .exec_without_returning(&self.db)
            .await
            .map_err(backend)?;
        self.next_chunk += 1;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), StorageError> {
        if self.closed {
            return Err(StorageError::SinkClosed(self.id));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadSink for DatabaseUploadSink {
    async fn write(&mut self, data: &[u8]) -> Result<(), StorageError> {
        self.ensure_open()?;
        self.buffer.extend_from_slice(data);
        self.length += data.len() as u64;

        while self.buffer.len() >= self.chunk_size {
            let rest = self.buffer.split_off(self.chunk_size);
            let full = std::mem::replace(&mut self.buffer, rest);
            self.flush_chunk(full).await?;
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<StoredFile, StorageError> {
        self.ensure_open()?;
        if !self.buffer.is_empty() {
            let tail = std::mem::take(&mut self.buffer);
            self.flush_chunk(tail).await?;
        }

        let length = i64::try_from(self.length)
            .map_err(|_| StorageError::Backend("file too large".into()))?;
        let chunk_size = i32::try_from(self.chunk_size)
            .map_err(|_| StorageError::Backend("chunk size too large".into()))?;

        let model = bucket_file::ActiveModel {
            id: Set(self.id.as_uuid()),
            filename: Set(self.filename.clone()),
            content_type: Set(self.options.content_type.clone()),
            length: Set(length),
            chunk_size: Set(chunk_size),
            metadata: Set(self.options.metadata.clone()),
            upload_date: Set(Utc::now()),
        }
        .insert(&self.db)
        .await
        .map_err(backend)?;

        self.closed = true;
        tracing::debug!(id = %self.id, filename = %self.filename, length = self.length, "Upload stream finished");
        StoredFile::try_from(model)
    }

    async fn abort(&mut self) -> Result<(), StorageError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.buffer.clear();
        bucket_chunk::Entity::delete_many()
            .filter(bucket_chunk::Column::FilesId.eq(self.id.as_uuid()))
            .exec(&self.db)
            .await
            .map_err(backend)?;
        Ok(())
    }
}

/// Cursor over the chunks a download still has to emit.
struct ChunkCursor {
    db: DatabaseConnection,
    file: StoredFile,
    range: ByteRange,
    next: u64,
    last: u64,
}

impl ChunkCursor {
    async fn read_next(mut self) -> Result<Option<(Bytes, Self)>, StorageError> {
        if self.next > self.last {
            return Ok(None);
        }
        let n = self.next;
        let chunk_size = u64::from(self.file.chunk_size);
        let expected = std::cmp::Ord::min(self.file.length - n * chunk_size, chunk_size) as usize;

        let idx = i32::try_from(n).map_err(|_| StorageError::MissingChunk { id: self.file.id, n })?;
        let chunk = bucket_chunk::Entity::find_by_id((self.file.id.as_uuid(), idx))
            .one(&self.db)
            .await
            .map_err(backend)?
            .filter(|c| c.data.len() == expected)
            .ok_or(StorageError::MissingChunk { id: self.file.id, n })?;

        let (lo, hi) = self
            .range
            .within_chunk(n, chunk_size, chunk.data.len())
            .ok_or(StorageError::MissingChunk { id: self.file.id, n })?;

        let mut data = chunk.data;
        data.truncate(hi);
        let bytes = Bytes::from(data).slice(lo..);

        self.next += 1;
        Ok(Some((bytes, self)))
    }
}

#[async_trait]
impl BinaryStore for DatabaseBucket {
    async fn open_upload_stream(
        &self,
        filename: &str,
        options: UploadOptions,
    ) -> Result<Box<dyn UploadSink>, StorageError> {
        Ok(Box::new(DatabaseUploadSink {
            db: self.db.clone(),
            id: FileId::new(),
            filename: filename.to_string(),
            options,
            chunk_size: self.chunk_size,
            buffer: Vec::with_capacity(self.chunk_size),
            next_chunk: 0,
            length: 0,
            closed: false,
        }))
    }

    async fn find_by_id(&self, id: FileId) -> Result<Option<StoredFile>, StorageError> {
        bucket_file::Entity::find_by_id(id.as_uuid())
            .one(&self.db)
            .await
            .map_err(backend)?
            .map(StoredFile::try_from)
            .transpose()
    }

    async fn find_by_ids(&self, ids: &[FileId]) -> Result<Vec<StoredFile>, StorageError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let models = bucket_file::Entity::find()
            .filter(bucket_file::Column::Id.is_in(ids.iter().map(|id| id.as_uuid())))
            .all(&self.db)
            .await
            .map_err(backend)?;
        into_stored(models)
    }

    async fn find_by_filename(&self, filename: &str) -> Result<Vec<StoredFile>, StorageError> {
        let models = bucket_file::Entity::find()
            .filter(bucket_file::Column::Filename.eq(filename))
            .order_by_desc(bucket_file::Column::UploadDate)
            .order_by_desc(bucket_file::Column::Id)
            .all(&self.db)
            .await
            .map_err(backend)?;
        into_stored(models)
    }

    async fn list_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<StoredFile>, StorageError> {
        let models = bucket_file::Entity::find()
            .filter(bucket_file::Column::UploadDate.lt(cutoff))
            .order_by_asc(bucket_file::Column::UploadDate)
            .all(&self.db)
            .await
            .map_err(backend)?;
        into_stored(models)
    }

    async fn purge_incomplete(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let unpublished: Vec<Uuid> = bucket_chunk::Entity::find()
            .select_only()
            .column(bucket_chunk::Column::FilesId)
            .distinct()
            .filter(bucket_chunk::Column::FilesId.not_in_subquery(published_ids()))
            .into_tuple()
            .all(&self.db)
            .await
            .map_err(backend)?;

        // v7 ids carry the instant the upload started.
        let abandoned: Vec<Uuid> = unpublished
            .into_iter()
            .filter(|&id| {
                FileId::from_uuid(id)
                    .created_at()
                    .is_some_and(|started| started < cutoff)
            })
            .collect();
        if abandoned.is_empty() {
            return Ok(0);
        }

        // Skip ids published since the lookup.
        bucket_chunk::Entity::delete_many()
            .filter(bucket_chunk::Column::FilesId.is_in(abandoned.iter().copied()))
            .filter(bucket_chunk::Column::FilesId.not_in_subquery(published_ids()))
            .exec(&self.db)
            .await
            .map_err(backend)?;

        tracing::debug!(count = abandoned.len(), "Purged chunks of abandoned uploads");
        Ok(abandoned.len())
    }

    async fn open_download_stream(
        &self,
        id: FileId,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, StorageError> {
        let file = self
            .find_by_id(id)
            .await?
            .ok_or(StorageError::NotFound(id))?;

        if file.length == 0 {
            return Ok(futures::stream::empty().boxed());
        }

        let range = match range {
            Some(r) => ByteRange::new(r.start, r.end, file.length)?,
            None => ByteRange::new(0, file.length - 1, file.length)?,
        };
        let (first, last) = range.chunk_span(u64::from(file.chunk_size));

        let cursor = ChunkCursor {
            db: self.db.clone(),
            file,
            range,
            next: first,
            last,
        };
        Ok(futures::stream::try_unfold(cursor, ChunkCursor::read_next).boxed())
    }

    async fn delete(&self, id: FileId) -> Result<(), StorageError> {
        let txn = self.db.begin().await.map_err(backend)?;

        let res = bucket_file::Entity::delete_by_id(id.as_uuid())
            .exec(&txn)
            .await
            .map_err(backend)?;
        if res.rows_affected == 0 {
            return Err(StorageError::NotFound(id));
        }

        bucket_chunk::Entity::delete_many()
            .filter(bucket_chunk::Column::FilesId.eq(id.as_uuid()))
            .exec(&txn)
            .await
            .map_err(backend)?;

        txn.commit().await.map_err(backend)?;
        tracing::debug!(%id, "Deleted stored file");
        Ok(())
    }
}
