mod database;
pub mod sweep;

use std::sync::Arc;

use common::storage::{BinaryStore, StorageError, filesystem::FilesystemBucket};
use sea_orm::DatabaseConnection;

use crate::config::{StorageBackend, StorageConfig};

pub use database::DatabaseBucket;

/// Build the store selected by `storage.backend`.
pub async fn init_store(
    db: &DatabaseConnection,
    config: &StorageConfig,
) -> Result<Arc<dyn BinaryStore>, StorageError> {
    let store: Arc<dyn BinaryStore> = match config.backend {
        StorageBackend::Database => Arc::new(DatabaseBucket::new(db.clone(), config.chunk_size)),
        StorageBackend::Filesystem => Arc::new(
            FilesystemBucket::new(config.filesystem_path.clone(), config.chunk_size).await?,
        ),
    };
    tracing::info!(backend = ?config.backend, chunk_size = config.chunk_size, "Binary store ready");
    Ok(store)
}
