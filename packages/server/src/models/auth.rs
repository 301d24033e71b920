use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::AppError;

/// Request body for user registration.
#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Display name (1-100 characters).
    #[schema(example = "Alice Wonder")]
    pub name: String,
    /// E-mail address, used as the login identifier.
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Password (8-128 characters).
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
    #[schema(example = "Nigeria")]
    pub country: Option<String>,
    #[schema(example = "Lagos")]
    pub city: Option<String>,
}

/// Lower-case and trim an e-mail address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if email.len() > 254 || !email.validate_email() {
        return Err(AppError::Validation(
            "Please provide a valid email address".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 || password.len() > 128 {
        return Err(AppError::Validation(
            "Password must be 8-128 characters".into(),
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 100 {
        return Err(AppError::Validation("Name must be 1-100 characters".into()));
    }
    Ok(())
}

pub fn validate_register_request(payload: &RegisterRequest) -> Result<(), AppError> {
    validate_name(&payload.name)?;
    validate_email(&normalize_email(&payload.email))?;
    validate_password(&payload.password)
}

/// Request body for user login.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "s3cure_P@ss!")]
    pub password: String,
}

pub fn validate_login_request(payload: &LoginRequest) -> Result<(), AppError> {
    if payload.email.trim().is_empty() {
        return Err(AppError::Validation("Email must not be empty".into()));
    }
    validate_email(&normalize_email(&payload.email))?;
    if payload.password.is_empty() {
        return Err(AppError::Validation("Password must not be empty".into()));
    }
    Ok(())
}

/// Successful login response.
#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    #[schema(example = true)]
    pub success: bool,
    /// JWT bearer token.
    #[schema(example = "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9...")]
    pub token: String,
}

/// Request body carrying only an e-mail address.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct EmailRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
}

/// Request body for OTP verification.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct OtpRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// Six-digit code received by e-mail.
    #[schema(example = "482913")]
    pub otp: String,
}

/// Request body for setting a new password after a verified reset.
#[derive(Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetNewPasswordRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[schema(example = "n3w_s3cure_P@ss!")]
    pub new_password: String,
}

/// Which code `resend-otp` should reissue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum OtpKind {
    /// E-mail verification code.
    Email,
    /// Password reset code.
    Password,
}

/// Request body for reissuing a code.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct ResendOtpRequest {
    #[schema(example = "alice@example.com")]
    pub email: String,
    #[serde(rename = "type")]
    pub kind: OtpKind,
}
