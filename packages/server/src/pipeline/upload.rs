use axum::extract::Multipart;
use chrono::Utc;
use common::storage::{BinaryStore, BoxReader, StoredFile, UploadOptions};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use serde_json::json;
use tracing::debug;

use crate::entity::video;
use crate::error::AppError;
use crate::media::probe::DurationProber;
use crate::models::video::NewVideo;
use crate::pipeline::staging::{FileKind, StagedFile, Staging};

/// Parsed multipart body of a video upload.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub video: Option<StagedFile>,
    pub thumbnail: Option<StagedFile>,
}

impl UploadForm {
    /// Remove every staged file the form holds. Best effort.
    pub async fn discard_all(&mut self, staging: &Staging) {
        for file in [self.video.take(), self.thumbnail.take()].into_iter().flatten() {
            staging.discard(&file).await;
        }
    }

    fn non_blank_url(&self) -> Option<&str> {
        self.video_url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }
}

/// Read the multipart body, staging `videoFile` and `thumbnail` fields as they arrive.
///
/// On failure every file staged so far is removed.
pub async fn read_upload_form(
    mut multipart: Multipart,
    staging: &Staging,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    let result = async {
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("videoFile") | Some("thumbnail") => {
                    let kind = if name.as_deref() == Some("videoFile") {
                        FileKind::Video
                    } else {
                        FileKind::Thumbnail
                    };
                    let slot = match kind {
                        FileKind::Video => &mut form.video,
                        FileKind::Thumbnail => &mut form.thumbnail,
                    };
                    if slot.is_some() {
                        return Err(AppError::Validation(format!(
                            "Only one '{}' file is allowed",
                            name.as_deref().unwrap_or_default()
                        )));
                    }
                    let original = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let staged = staging
                        .stage_stream(kind, original.as_deref(), content_type.as_deref(), field)
                        .await?;
                    *slot = Some(staged);
                }
                Some("title") => form.title = Some(field.text().await?),
                Some("description") => form.description = Some(field.text().await?),
                Some("videoUrl") => form.video_url = Some(field.text().await?),
                _ => {} // Ignore unknown fields.
            }
        }
        Ok(())
    }
    .await;

    match result {
        Ok(()) => Ok(form),
        Err(e) => {
            form.discard_all(staging).await;
            Err(e)
        }
    }
}

/// Services the upload pipeline depends on.
pub struct UploadContext<'a, C: ConnectionTrait> {
    pub db: &'a C,
    pub store: &'a dyn BinaryStore,
    pub prober: &'a dyn DurationProber,
    pub staging: &'a Staging,
}

/// Drive a parsed form through probing, promotion and record commit.
///
/// Staged files are removed whatever the outcome. Binaries already promoted when a
/// later step fails stay in the store until the orphan sweep reclaims them.
pub async fn run_upload<C: ConnectionTrait>(
    ctx: &UploadContext<'_, C>,
    uploaded_by: i32,
    mut form: UploadForm,
) -> Result<video::Model, AppError> {
    let result = promote_and_commit(ctx, uploaded_by, &mut form).await;
    form.discard_all(ctx.staging).await;
    if let Err(e) = &result {
        debug!(stage = "aborted", error = ?e, "Upload aborted");
    }
    result
}

async fn promote_and_commit<C: ConnectionTrait>(
    ctx: &UploadContext<'_, C>,
    uploaded_by: i32,
    form: &mut UploadForm,
) -> Result<video::Model, AppError> {
    let video_url = form.non_blank_url().map(str::to_string);
    match (&form.video, &video_url) {
        (None, None) => {
            return Err(AppError::Validation(
                "Please provide either a video file or a video URL".into(),
            ));
        }
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "Provide either a video file or a video URL, not both".into(),
            ));
        }
        _ => {}
    }
    if form.thumbnail.is_none() {
        return Err(AppError::Validation(
            "A valid thumbnail image is required (jpeg, png, gif)".into(),
        ));
    }
    debug!(stage = "staged", has_file = form.video.is_some(), "Upload validated");

    let title = form.title.clone().unwrap_or_default();
    let description = form.description.clone().unwrap_or_default();

    let mut duration = None;
    let mut video_file = None;
    if let Some(staged) = form.video.take() {
        debug!(stage = "probing", staged = %staged.staged_name);
        let secs = ctx.prober.probe_duration(&staged.path).await?;
        duration = Some(secs);

        debug!(stage = "promoting_video", staged = %staged.staged_name);
        let metadata = json!({
            "title": title,
            "description": description,
            "duration": secs,
        });
        let stored = promote(ctx, &staged, Some(metadata)).await;
        ctx.staging.discard(&staged).await;
        video_file = Some(stored?);
    }

    let mut thumbnail_file = None;
    if let Some(staged) = form.thumbnail.take() {
        debug!(stage = "promoting_thumbnail", staged = %staged.staged_name);
        let stored = promote(ctx, &staged, None).await;
        ctx.staging.discard(&staged).await;
        thumbnail_file = Some(stored?);
    }

    debug!(stage = "committing_record");
    let record = NewVideo {
        title: title.trim().to_string(),
        description: description.trim().to_string(),
        video_url,
        video_file_id: video_file.map(|f| f.id.as_uuid()),
        thumbnail_file_id: thumbnail_file.map(|f| f.id.as_uuid()),
        duration,
        uploaded_by,
    };
    let errors = record.validate();
    if !errors.is_empty() {
        return Err(AppError::InvalidRecord(errors));
    }

    let now = Utc::now();
    let model = video::ActiveModel {
        title: Set(record.title),
        description: Set(record.description),
        video_url: Set(record.video_url),
        video_file_id: Set(record.video_file_id),
        thumbnail_file_id: Set(record.thumbnail_file_id),
        duration: Set(record.duration),
        views: Set(0),
        uploaded_by: Set(record.uploaded_by),
        edited_by: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(ctx.db)
    .await?;

    debug!(stage = "done", video_id = model.id);
    Ok(model)
}

async fn promote<C: ConnectionTrait>(
    ctx: &UploadContext<'_, C>,
    staged: &StagedFile,
    metadata: Option<serde_json::Value>,
) -> Result<StoredFile, AppError> {
    let file = tokio::fs::File::open(&staged.path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to reopen staged file: {e}")))?;
    let reader: BoxReader = Box::new(file);
    let options = UploadOptions {
        content_type: Some(staged.content_type.clone()),
        metadata,
    };
    let stored = ctx
        .store
        .upload_from_reader(&staged.staged_name, options, reader)
        .await?;
    debug!(file_id = %stored.id, length = stored.length, "Promoted staged file");
    Ok(stored)
}
