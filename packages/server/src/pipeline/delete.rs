use common::storage::{BinaryStore, FileId};
use sea_orm::{ConnectionTrait, EntityTrait};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::video;
use crate::error::AppError;

/// Delete a video's stored binaries, then its record.
///
/// Binary deletions are independent and best effort: a missing binary is ignored and
/// any other failure is logged, leaving the file to the orphan sweep.
pub async fn delete_video<C: ConnectionTrait>(
    db: &C,
    store: &dyn BinaryStore,
    id: i32,
) -> Result<(), AppError> {
    let model = video::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".into()))?;

    for file_id in [model.video_file_id, model.thumbnail_file_id]
        .into_iter()
        .flatten()
    {
        remove_binary(store, file_id).await;
    }

    video::Entity::delete_by_id(id).exec(db).await?;
    debug!(video_id = id, "Deleted video record");
    Ok(())
}

async fn remove_binary(store: &dyn BinaryStore, id: Uuid) {
    let id = FileId::from_uuid(id);
    match store.delete(id).await {
        Ok(()) => debug!(file_id = %id, "Deleted stored file"),
        Err(e) if e.is_not_found() => debug!(file_id = %id, "Stored file already gone"),
        Err(e) => warn!(file_id = %id, error = %e, "Failed to delete stored file"),
    }
}
