use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{role_permission, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::shared::{ApiResponse, PageQuery, Pagination, page_offset};
use crate::models::user::{EditUserRequest, UserResponse};
use crate::state::AppState;

async fn find_user<C: ConnectionTrait>(db: &C, id: i32) -> Result<user::Model, AppError> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

#[utoipa::path(
    get,
    path = "/api/users/info",
    tag = "Users",
    operation_id = "getOwnProfile",
    summary = "Get the caller's profile",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_own_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let model = find_user(&state.db, auth_user.user_id).await?;
    Ok(Json(ApiResponse::data(model.into())))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    operation_id = "getUser",
    summary = "Get a user by ID",
    description = "Requires `user:view_all` permission.",
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(id))]
pub async fn get_user(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    auth_user.require_permission(role_permission::USER_VIEW_ALL)?;

    let model = find_user(&state.db, id).await?;
    Ok(Json(ApiResponse::data(model.into())))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    operation_id = "listUsers",
    summary = "List users, newest first",
    description = "Requires `user:view_all` permission.",
    params(PageQuery),
    responses(
        (status = 200, description = "Page of users", body = ApiResponse<Vec<UserResponse>>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 403, description = "Forbidden (PERMISSION_DENIED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, query))]
pub async fn list_users(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, AppError> {
    auth_user.require_permission(role_permission::USER_VIEW_ALL)?;

    let (page, per_page) = query.resolve();
    let select = user::Entity::find();

    let total = select
        .clone()
        .paginate(&state.db, per_page)
        .num_items()
        .await?;

    let users = select
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id)
        .offset(Some(page_offset(page, per_page)))
        .limit(Some(per_page))
        .all(&state.db)
        .await?;

    Ok(Json(ApiResponse::page(
        users.into_iter().map(UserResponse::from).collect(),
        Pagination::new(page, per_page, total),
    )))
}

#[utoipa::path(
    put,
    path = "/api/users/edit",
    tag = "Users",
    operation_id = "editOwnProfile",
    summary = "Edit the caller's profile",
    description = "Absent or blank fields keep their current value.",
    request_body = EditUserRequest,
    responses(
        (status = 200, description = "Updated profile", body = ApiResponse<UserResponse>),
        (status = 400, description = "Validation error (VALIDATION_ERROR)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID, TOKEN_EXPIRED)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn edit_own_profile(
    auth_user: AuthUser,
    State(state): State<AppState>,
    AppJson(payload): AppJson<EditUserRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let model = find_user(&state.db, auth_user.user_id).await?;

    let name = non_blank(payload.name);
    if let Some(ref name) = name {
        crate::models::auth::validate_name(name)?;
    }
    let country = non_blank(payload.country);
    let city = non_blank(payload.city);

    if name.is_none() && country.is_none() && city.is_none() {
        return Ok(Json(ApiResponse::data(model.into())));
    }

    let mut active = model.into_active_model();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(country) = country {
        active.country = Set(Some(country));
    }
    if let Some(city) = city {
        active.city = Set(Some(city));
    }
    active.updated_at = Set(Utc::now());
    let updated = active.update(&state.db).await?;

    Ok(Json(ApiResponse::data(updated.into())))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
