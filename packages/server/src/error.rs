use axum::{
    Json,
    extract::multipart::MultipartError,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use common::storage::StorageError;
use sea_orm::DbErr;
use serde::Serialize;

/// Structured error response returned by all endpoints on failure.
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    #[schema(example = false)]
    pub success: bool,
    /// Machine-readable error code. One of: `VALIDATION_ERROR`, `USER_EXISTS`,
    /// `INVALID_CREDENTIALS`, `EMAIL_NOT_VERIFIED`, `TOKEN_MISSING`, `TOKEN_INVALID`,
    /// `TOKEN_EXPIRED`, `PERMISSION_DENIED`, `NOT_FOUND`, `RANGE_NOT_SATISFIABLE`,
    /// `PROBE_FAILED`, `MAIL_FAILED`, `INTERNAL_ERROR`.
    #[schema(example = "VALIDATION_ERROR")]
    pub code: &'static str,
    /// Human-readable error description.
    #[schema(example = "Title is required")]
    pub msg: String,
    /// Individual validation failures, when a record was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Vec<String>>,
}

impl ErrorBody {
    fn new(code: &'static str, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            msg: msg.into(),
            error: None,
        }
    }
}

/// Application-level error type.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    /// A new record failed validation. Contains one message per failed rule.
    InvalidRecord(Vec<String>),
    UserExists,
    InvalidCredentials,
    EmailNotVerified,
    TokenMissing,
    TokenInvalid,
    TokenExpired,
    PermissionDenied,
    NotFound(String),
    /// The requested range lies outside a resource of `length` bytes.
    RangeNotSatisfiable {
        length: u64,
    },
    ProbeFailed(String),
    Mail(String),
    Internal(String),
}

impl AppError {
    fn status_and_body(self) -> (StatusCode, ErrorBody) {
        match self {
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("VALIDATION_ERROR", msg),
            ),
            AppError::InvalidRecord(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: Some(errors),
                    ..ErrorBody::new("VALIDATION_ERROR", "Invalid video record")
                },
            ),
            AppError::UserExists => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("USER_EXISTS", "User already exists"),
            ),
            AppError::InvalidCredentials => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new("INVALID_CREDENTIALS", "Invalid Credentials"),
            ),
            AppError::EmailNotVerified => (
                StatusCode::BAD_REQUEST,
                ErrorBody::new(
                    "EMAIL_NOT_VERIFIED",
                    "Please verify your email before logging in",
                ),
            ),
            AppError::TokenMissing => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("TOKEN_MISSING", "No token, authorization denied"),
            ),
            AppError::TokenInvalid => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("TOKEN_INVALID", "Token is not valid"),
            ),
            AppError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                ErrorBody::new("TOKEN_EXPIRED", "Token expired"),
            ),
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                ErrorBody::new("PERMISSION_DENIED", "Access denied. Admins only."),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorBody::new("NOT_FOUND", msg)),
            AppError::RangeNotSatisfiable { length } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                ErrorBody::new(
                    "RANGE_NOT_SATISFIABLE",
                    format!("Requested range not satisfiable for {length} bytes"),
                ),
            ),
            AppError::ProbeFailed(detail) => {
                tracing::error!("Media probe failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("PROBE_FAILED", "Error extracting video metadata"),
                )
            }
            AppError::Mail(detail) => {
                tracing::error!("Mail delivery failed: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("MAIL_FAILED", "Failed to send email"),
                )
            }
            AppError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("INTERNAL_ERROR", "An unexpected error occurred"),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let unsatisfied = if let AppError::RangeNotSatisfiable { length } = &self {
            Some(*length)
        } else {
            None
        };

        let (status, body) = self.status_and_body();

        if let Some(length) = unsatisfied {
            (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{length}"))],
                Json(body),
            )
                .into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) | StorageError::FilenameNotFound(_) => {
                AppError::NotFound("No file exists".into())
            }
            StorageError::InvalidRange { length, .. } => AppError::RangeNotSatisfiable { length },
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::Validation(format!("Multipart error: {}", err.body_text()))
    }
}
