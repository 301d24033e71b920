use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use sea_orm::*;
use tracing::instrument;

use crate::entity::{role, role_permission, user};
use crate::error::{AppError, ErrorBody};
use crate::extractors::json::AppJson;
use crate::mail::{OtpPurpose, OutgoingMail};
use crate::models::auth::{
    EmailRequest, LoginRequest, LoginResponse, OtpKind, OtpRequest, RegisterRequest,
    ResendOtpRequest, SetNewPasswordRequest, normalize_email, validate_login_request,
    validate_password, validate_register_request,
};
use crate::models::shared::MessageResponse;
use crate::state::AppState;
use crate::utils::{hash, jwt, otp};

async fn find_user_by_email<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Email.eq(normalize_email(email)))
        .one(db)
        .await
}

async fn require_user<C: ConnectionTrait>(db: &C, email: &str) -> Result<user::Model, AppError> {
    find_user_by_email(db, email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

/// Store a fresh code of the given kind on the user and mail it.
async fn issue_otp(
    state: &AppState,
    user: user::Model,
    purpose: OtpPurpose,
) -> Result<(), AppError> {
    let code = otp::generate();
    let ttl = state.config.auth.otp_ttl_secs;
    let expires = otp::expires_at(ttl);

    let (to, name) = (user.email.clone(), user.name.clone());
    let mut active = user.into_active_model();
    match purpose {
        OtpPurpose::EmailVerification => {
            active.email_verification_otp = Set(Some(code.clone()));
            active.email_verification_expires = Set(Some(expires));
        }
        OtpPurpose::PasswordReset => {
            active.reset_password_otp = Set(Some(code.clone()));
            active.reset_password_expires = Set(Some(expires));
            active.reset_password_verified = Set(false);
        }
    }
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    state
        .mailer
        .send(OutgoingMail::otp(&to, &name, purpose, &code, ttl))
        .await?;
    tracing::info!(?purpose, "Issued one-time code");
    Ok(())
}

/// Permissions granted to a role.
pub async fn role_permissions<C: ConnectionTrait>(db: &C, role: &str) -> Result<Vec<String>, DbErr> {
    let perms = role_permission::Entity::find()
        .filter(role_permission::Column::Role.eq(role))
        .all(db)
        .await?;
    Ok(perms.into_iter().map(|rp| rp.permission).collect())
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    operation_id = "register",
    summary = "Register a new account",
    description = "Creates an unverified account with the `user` role and mails a six-digit verification code.",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = MessageResponse),
        (status = 400, description = "Validation error (VALIDATION_ERROR, USER_EXISTS)", body = ErrorBody),
        (status = 500, description = "Verification mail could not be sent (MAIL_FAILED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_register_request(&payload)?;

    let email = normalize_email(&payload.email);
    if find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(AppError::UserExists);
    }

    let hash = hash::hash_password(&payload.password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let now = Utc::now();
    let new_user = user::ActiveModel {
        name: Set(payload.name.trim().to_string()),
        email: Set(email),
        password: Set(hash),
        country: Set(payload.country.filter(|c| !c.trim().is_empty())),
        city: Set(payload.city.filter(|c| !c.trim().is_empty())),
        role: Set(role::DEFAULT_ROLE.to_string()),
        is_verified: Set(false),
        reset_password_verified: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user = new_user.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            tracing::debug!("Registration race condition: unique constraint caught on insert");
            AppError::UserExists
        }
        _ => AppError::from(e),
    })?;

    issue_otp(&state, user, OtpPurpose::EmailVerification).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "User registered successfully. Please check your email for the verification code.",
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    operation_id = "login",
    summary = "Log in with e-mail and password",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Bearer token issued", body = LoginResponse),
        (status = 400, description = "Bad credentials or unverified account (INVALID_CREDENTIALS, EMAIL_NOT_VERIFIED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    validate_login_request(&payload)?;

    let user = find_user_by_email(&state.db, &payload.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    let is_valid = hash::verify_password(&payload.password, &user.password)
        .map_err(|e| AppError::Internal(format!("Password verify error: {}", e)))?;

    if !is_valid {
        return Err(AppError::InvalidCredentials);
    }
    if !user.is_verified {
        return Err(AppError::EmailNotVerified);
    }

    let permissions = role_permissions(&state.db, &user.role).await?;

    let token = jwt::sign(
        user.id,
        &user.email,
        &user.role,
        permissions,
        &state.config.auth.jwt_secret,
        state.config.auth.token_ttl_secs,
    )
    .map_err(|e| AppError::Internal(format!("JWT sign error: {}", e)))?;

    Ok(Json(LoginResponse {
        success: true,
        token,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-email-otp",
    tag = "Auth",
    operation_id = "verifyEmailOtp",
    summary = "Confirm an e-mail address",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Account verified", body = MessageResponse),
        (status = 400, description = "Already verified, or invalid/expired code (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn verify_email_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<OtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = require_user(&state.db, &payload.email).await?;

    if user.is_verified {
        return Err(AppError::Validation("User already verified".into()));
    }
    if !otp::matches(
        user.email_verification_otp.as_deref(),
        user.email_verification_expires,
        &payload.otp,
        Utc::now(),
    ) {
        return Err(AppError::Validation("Invalid or expired OTP".into()));
    }

    let mut active = user.into_active_model();
    active.is_verified = Set(true);
    active.email_verification_otp = Set(None);
    active.email_verification_expires = Set(None);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    Ok(Json(MessageResponse::new("Account verified successfully")))
}

#[utoipa::path(
    post,
    path = "/api/auth/request-password-reset",
    tag = "Auth",
    operation_id = "requestPasswordReset",
    summary = "Mail a password reset code",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset code sent", body = MessageResponse),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Mail could not be sent (MAIL_FAILED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn request_password_reset(
    State(state): State<AppState>,
    AppJson(payload): AppJson<EmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = require_user(&state.db, &payload.email).await?;
    issue_otp(&state, user, OtpPurpose::PasswordReset).await?;
    Ok(Json(MessageResponse::new("Password reset code sent")))
}

#[utoipa::path(
    post,
    path = "/api/auth/verify-password-reset-otp",
    tag = "Auth",
    operation_id = "verifyPasswordResetOtp",
    summary = "Confirm a password reset code",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code accepted", body = MessageResponse),
        (status = 400, description = "Invalid or expired code (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn verify_password_reset_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<OtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = require_user(&state.db, &payload.email).await?;

    if !otp::matches(
        user.reset_password_otp.as_deref(),
        user.reset_password_expires,
        &payload.otp,
        Utc::now(),
    ) {
        return Err(AppError::Validation("Invalid or expired OTP".into()));
    }

    let mut active = user.into_active_model();
    active.reset_password_verified = Set(true);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    Ok(Json(MessageResponse::new(
        "OTP verified. You can now set a new password",
    )))
}

#[utoipa::path(
    post,
    path = "/api/auth/set-new-password",
    tag = "Auth",
    operation_id = "setNewPassword",
    summary = "Set a new password after a verified reset",
    request_body = SetNewPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Reset not verified or expired, or weak password (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email))]
pub async fn set_new_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<SetNewPasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = require_user(&state.db, &payload.email).await?;

    let unexpired = user
        .reset_password_expires
        .is_some_and(|expires| Utc::now() < expires);
    if !user.reset_password_verified || !unexpired {
        return Err(AppError::Validation(
            "Password reset has not been verified or has expired".into(),
        ));
    }
    validate_password(&payload.new_password)?;

    let hash = hash::hash_password(&payload.new_password)
        .map_err(|e| AppError::Internal(format!("Password hash error: {}", e)))?;

    let mut active = user.into_active_model();
    active.password = Set(hash);
    active.reset_password_otp = Set(None);
    active.reset_password_expires = Set(None);
    active.reset_password_verified = Set(false);
    active.updated_at = Set(Utc::now());
    active.update(&state.db).await?;

    Ok(Json(MessageResponse::new("Password reset successfully")))
}

#[utoipa::path(
    post,
    path = "/api/auth/resend-otp",
    tag = "Auth",
    operation_id = "resendOtp",
    summary = "Reissue a verification or reset code",
    request_body = ResendOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = MessageResponse),
        (status = 400, description = "Account already verified (VALIDATION_ERROR)", body = ErrorBody),
        (status = 404, description = "User not found (NOT_FOUND)", body = ErrorBody),
        (status = 500, description = "Mail could not be sent (MAIL_FAILED)", body = ErrorBody),
    ),
)]
#[instrument(skip(state, payload), fields(email = %payload.email, kind = ?payload.kind))]
pub async fn resend_otp(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResendOtpRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = require_user(&state.db, &payload.email).await?;

    let purpose = match payload.kind {
        OtpKind::Email => {
            if user.is_verified {
                return Err(AppError::Validation("User already verified".into()));
            }
            OtpPurpose::EmailVerification
        }
        OtpKind::Password => OtpPurpose::PasswordReset,
    };
    issue_otp(&state, user, purpose).await?;

    Ok(Json(MessageResponse::new("OTP sent successfully")))
}
