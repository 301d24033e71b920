use std::collections::{HashMap, HashSet};

use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use common::storage::FileId;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::ExprTrait;
use sea_orm::*;
use tracing::instrument;
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::entity::{role_permission, user, video};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::shared::{
    ApiResponse, MessageResponse, PageQuery, Pagination, keep_or_replace, page_offset,
};
use crate::models::user::UserSummary;
use crate::models::video::{
    UpdateVideoRequest, VideoResponse, ViewCount, stream_path, thumbnail_path,
};
use crate::pipeline::delete::delete_video as run_delete;
use crate::pipeline::upload::{UploadContext, read_upload_form, run_upload};
use crate::state::AppState;

/// Body limit for the upload route: one video, one thumbnail, and form fields.
pub fn upload_body_limit(config: &UploadConfig) -> DefaultBodyLimit {
    let limit = config
        .max_video_size
        .saturating_add(config.max_thumbnail_size)
        .saturating_add(1024 * 1024);
    DefaultBodyLimit::max(usize::try_from(limit).unwrap_or(usize::MAX))
}

async fn find_video<C: ConnectionTrait>(db: &C, id: i32) -> Result<video::Model, AppError> {
    video::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Video not found".into()))
}

/// Resolve playable URLs and user summaries for a batch of videos.
async fn to_responses(
    state: &AppState,
    videos: Vec<video::Model>,
) -> Result<Vec<VideoResponse>, AppError> {
    let file_ids: Vec<FileId> = videos
        .iter()
        .filter_map(|v| v.video_file_id)
        .map(FileId::from_uuid)
        .collect();
    let filenames: HashMap<Uuid, String> = state
        .store
        .find_by_ids(&file_ids)
        .await?
        .into_iter()
        .map(|f| (f.id.as_uuid(), f.filename))
        .collect();

    let user_ids: HashSet<i32> = videos
        .iter()
        .flat_map(|v| [Some(v.uploaded_by), v.edited_by])
        .flatten()
        .collect();
    let users: HashMap<i32, UserSummary> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(&state.db)
            .await?
            .iter()
            .map(|u| (u.id, UserSummary::from(u)))
            .collect()
    };

    Ok(videos
        .into_iter()
        .map(|v| {
            let video_url = v.video_url.clone().or_else(|| {
                v.video_file_id
                    .and_then(|id| filenames.get(&id))
                    .map(|name| stream_path(name))
            });
            VideoResponse {
                id: v.id,
                title: v.title,
                description: v.description,
                video_url,
                thumbnail_url: v.thumbnail_file_id.map(|_| thumbnail_path(v.id)),
                duration: v.duration,
                views: v.views,
                uploaded_by: users.get(&v.uploaded_by).cloned(),
                edited_by: v.edited_by.and_then(|id| users.get(&id).cloned()),
                created_at: v.created_at,
                updated_at: v.updated_at,
            }
        })
        .collect())
}

async fn to_response(state: &AppState, video: video::Model) -> Result<VideoResponse, AppError> {
    to_responses(state, vec![video])
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal("video response missing".into()))
}

#[utoipa::path(
    post,
    path = "/api/videos/upload",
    tag = "Videos",
    operation_id = "uploadVideo",
    summary = "Upload a video",
    description = "Multipart form with `title`, `description`, a `thumbnail` image, and either a \
        `videoFile` or a `videoUrl`. Requires `video:upload` permission.",
    request_body(content_type = "multipart/form-data", description = "Video upload form"),
    responses(
        (status = 201, description = "Video created", body = ApiResponse<VideoResponse>),
        (status = 400, description = "Invalid form, file type or size, or record (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 500, description = "Duration could not be read (PROBE_FAILED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, multipart), fields(user_id = auth_user.user_id))]
pub async fn upload_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    auth_user.require_permission(role_permission::VIDEO_UPLOAD)?;

    let form = read_upload_form(multipart, &state.staging).await?;
    let ctx = UploadContext {
        db: &state.db,
        store: state.store.as_ref(),
        prober: state.prober.as_ref(),
        staging: &state.staging,
    };
    let model = run_upload(&ctx, auth_user.user_id, form).await?;
    tracing::info!(video_id = model.id, "Video uploaded");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::data(to_response(&state, model).await?)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/videos",
    tag = "Videos",
    operation_id = "listVideos",
    summary = "List videos, newest first",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of videos", body = ApiResponse<Vec<VideoResponse>>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user, query))]
pub async fn list_videos(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<VideoResponse>>>, AppError> {
    let (page, per_page) = query.resolve();
    let select = video::Entity::find();

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let videos = select
        .order_by_desc(video::Column::CreatedAt)
        .order_by_desc(video::Column::Id)
        .offset(Some(page_offset(page, per_page)))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::page(
        to_responses(&state, videos).await?,
        Pagination::new(page, per_page, total),
    )))
}

#[utoipa::path(
    get,
    path = "/api/videos/{id}",
    tag = "Videos",
    operation_id = "getVideo",
    summary = "Get a video by ID",
    params(("id" = i32, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video", body = ApiResponse<VideoResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 404, description = "Video not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(id))]
pub async fn get_video(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<VideoResponse>>, AppError> {
    let model = find_video(&state.db, id).await?;
    Ok(Json(ApiResponse::data(to_response(&state, model).await?)))
}

#[utoipa::path(
    put,
    path = "/api/videos/{id}",
    tag = "Videos",
    operation_id = "updateVideo",
    summary = "Edit a video's title or description",
    description = "Absent or blank fields keep their current value. Requires `video:edit` permission.",
    params(("id" = i32, Path, description = "Video ID")),
    request_body = UpdateVideoRequest,
    responses(
        (status = 200, description = "Video updated", body = ApiResponse<VideoResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Video not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(id))]
pub async fn update_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<UpdateVideoRequest>,
) -> Result<Json<ApiResponse<VideoResponse>>, AppError> {
    auth_user.require_permission(role_permission::VIDEO_EDIT)?;

    let model = find_video(&state.db, id).await?;
    let title = keep_or_replace(model.title.clone(), payload.title);
    if title.chars().count() > 256 {
        return Err(AppError::Validation(
            "Title must be at most 256 characters".into(),
        ));
    }
    let description = keep_or_replace(model.description.clone(), payload.description);

    let mut active = model.into_active_model();
    active.title = Set(title);
    active.description = Set(description);
    active.edited_by = Set(Some(auth_user.user_id));
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    Ok(Json(ApiResponse::data(to_response(&state, updated).await?)))
}

#[utoipa::path(
    delete,
    path = "/api/videos/{id}",
    tag = "Videos",
    operation_id = "deleteVideo",
    summary = "Delete a video and its stored files",
    description = "Requires `video:delete` permission.",
    params(("id" = i32, Path, description = "Video ID")),
    responses(
        (status = 200, description = "Video deleted", body = MessageResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Video not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn delete_video(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    auth_user.require_permission(role_permission::VIDEO_DELETE)?;

    run_delete(&state.db, state.store.as_ref(), id).await?;
    tracing::info!(video_id = id, "Video deleted");

    Ok(Json(MessageResponse::new("Video deleted successfully")))
}

#[utoipa::path(
    post,
    path = "/api/videos/view/{id}",
    tag = "Videos",
    operation_id = "recordView",
    summary = "Record one view of a video",
    params(("id" = i32, Path, description = "Video ID")),
    responses(
        (status = 200, description = "New view count", body = ApiResponse<ViewCount>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 404, description = "Video not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, _auth_user), fields(id))]
pub async fn record_view(
    _auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<ViewCount>>, AppError> {
    let updated = video::Entity::update_many()
        .col_expr(
            video::Column::Views,
            Expr::col(video::Column::Views).add(1),
        )
        .filter(video::Column::Id.eq(id))
        .exec_with_returning(&state.db)
        .await?;

    let model = updated
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Video not found".into()))?;

    Ok(Json(ApiResponse::data(ViewCount {
        id: model.id,
        views: model.views,
    })))
}
