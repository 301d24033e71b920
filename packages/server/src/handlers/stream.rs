use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use common::storage::{FileId, StoredFile};
use sea_orm::EntityTrait;
use tracing::instrument;

use crate::entity::video;
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;
use crate::utils::range::{RangeRequest, parse_range};

#[utoipa::path(
    get,
    path = "/api/videos/stream/{filename}",
    tag = "Streaming",
    operation_id = "streamVideo",
    summary = "Stream a stored video file",
    description = "Serves the newest stored file with this name. Single byte ranges are honored.",
    params(("filename" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "Full content", content_type = "application/octet-stream"),
        (status = 206, description = "Requested byte range", content_type = "application/octet-stream"),
        (status = 404, description = "No file exists (NOT_FOUND)", body = ErrorBody),
        (status = 416, description = "Range outside the file (RANGE_NOT_SATISFIABLE)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers), fields(filename = %filename))]
pub async fn stream_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let file = state
        .store
        .find_by_filename(&filename)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("No file exists".into()))?;

    build_file_response(&state, file, &headers).await
}

#[utoipa::path(
    get,
    path = "/api/videos/thumbnail/{id}",
    tag = "Streaming",
    operation_id = "streamThumbnail",
    summary = "Serve a video's thumbnail",
    params(("id" = i32, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Thumbnail image", content_type = "image/*"),
        (status = 404, description = "Video or thumbnail not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, headers), fields(id))]
pub async fn stream_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let model = video::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".into()))?;

    let thumbnail_missing = || AppError::NotFound("Thumbnail not found".into());
    let file_id = model.thumbnail_file_id.ok_or_else(thumbnail_missing)?;
    let file = state
        .store
        .find_by_id(FileId::from_uuid(file_id))
        .await?
        .ok_or_else(thumbnail_missing)?;

    build_file_response(&state, file, &headers).await
}

/// Stream a stored file inline, honoring a single `Range` header.
async fn build_file_response(
    state: &AppState,
    file: StoredFile,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let (status, range) = match parse_range(range_header, file.length) {
        RangeRequest::Full => (StatusCode::OK, None),
        RangeRequest::Partial(range) => (StatusCode::PARTIAL_CONTENT, Some(range)),
        RangeRequest::Unsatisfiable => {
            return Err(AppError::RangeNotSatisfiable {
                length: file.length,
            });
        }
    };

    let stream = state.store.open_download_stream(file.id, range).await?;
    let content_length = range.map_or(file.length, |r| r.len());

    let content_type = file.content_type.clone().unwrap_or_else(|| {
        mime_guess::from_path(&file.filename)
            .first_or_octet_stream()
            .to_string()
    });

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length.to_string())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_value(&file.filename),
        );
    if let Some(range) = range {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", range.start, range.end, file.length),
        );
    }

    builder
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {e}")))
}

/// Build a safe inline `Content-Disposition` header value.
fn content_disposition_value(filename: &str) -> String {
    let ascii_safe: String = filename
        .chars()
        .filter(|c| c.is_ascii_graphic() && !matches!(c, '"' | ';' | '\\'))
        .collect();
    if ascii_safe.is_empty() {
        "inline".to_string()
    } else {
        format!("inline; filename=\"{ascii_safe}\"")
    }
}
