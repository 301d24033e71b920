use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::storage::{BinaryStore, FileId};
use sea_orm::{DatabaseConnection, EntityTrait, QuerySelect};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::entity::video;
use crate::pipeline::staging::Staging;

/// What [`reclaim_leftovers`] removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Leftovers {
    /// Unfinished uploads in the store.
    pub incomplete_uploads: usize,
    /// Files abandoned in the staging directory.
    pub staged_files: usize,
}

fn cutoff(grace: TimeDelta) -> DateTime<Utc> {
    Utc::now()
        .checked_sub_signed(grace)
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Run the orphan sweep as a background task.
pub async fn run_orphan_sweep(
    db: DatabaseConnection,
    store: Arc<dyn BinaryStore>,
    staging: Staging,
    config: StorageConfig,
) {
    let sweep_interval = Duration::from_secs(config.sweep_interval_secs);
    let grace = config.orphan_grace();

    info!(
        interval_secs = config.sweep_interval_secs,
        grace_secs = config.orphan_grace_secs,
        "Starting orphan sweep"
    );

    let mut interval = tokio::time::interval(sweep_interval);

    loop {
        interval.tick().await;

        match sweep_orphans(&db, store.as_ref(), grace).await {
            Ok(0) => {}
            Ok(removed) => info!(removed, "Orphan sweep removed unreferenced files"),
            Err(e) => error!(error = %e, "Orphan sweep failed"),
        }

        match reclaim_leftovers(store.as_ref(), &staging, grace).await {
            Ok(left) if left == Leftovers::default() => {}
            Ok(left) => info!(
                incomplete_uploads = left.incomplete_uploads,
                staged_files = left.staged_files,
                "Orphan sweep removed interrupted uploads"
            ),
            Err(e) => error!(error = %e, "Leftover cleanup failed"),
        }
    }
}

/// Delete stored files older than `grace` that no video references.
///
/// Returns the number of files removed.
pub async fn sweep_orphans(
    db: &DatabaseConnection,
    store: &dyn BinaryStore,
    grace: TimeDelta,
) -> anyhow::Result<usize> {
    let candidates = store.list_before(cutoff(grace)).await?;
    if candidates.is_empty() {
        return Ok(0);
    }

    let refs: Vec<(Option<Uuid>, Option<Uuid>)> = video::Entity::find()
        .select_only()
        .column(video::Column::VideoFileId)
        .column(video::Column::ThumbnailFileId)
        .into_tuple()
        .all(db)
        .await?;

    let referenced: HashSet<FileId> = refs
        .into_iter()
        .flat_map(|(v, t)| [v, t])
        .flatten()
        .map(FileId::from_uuid)
        .collect();

    let mut removed = 0;
    for file in candidates {
        if referenced.contains(&file.id) {
            continue;
        }
        match store.delete(file.id).await {
            Ok(()) => removed += 1,
            Err(e) if e.is_not_found() => {}
            Err(e) => warn!(id = %file.id, filename = %file.filename, error = %e, "Failed to remove orphaned file"),
        }
    }

    Ok(removed)
}

/// Remove what interrupted uploads left behind for longer than `grace`: store content
/// that never got a file record, and files still sitting in the staging directory.
pub async fn reclaim_leftovers(
    store: &dyn BinaryStore,
    staging: &Staging,
    grace: TimeDelta,
) -> anyhow::Result<Leftovers> {
    let cutoff = cutoff(grace);
    Ok(Leftovers {
        incomplete_uploads: store.purge_incomplete(cutoff).await?,
        staged_files: staging.purge_stale(cutoff).await?,
    })
}
