use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::user;

/// Public user profile. Never carries the password hash or pending codes.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "Alice Wonder")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    pub country: Option<String>,
    pub city: Option<String>,
    #[schema(example = "user")]
    pub role: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(m: user::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            email: m.email,
            country: m.country,
            city: m.city,
            role: m.role,
            is_verified: m.is_verified,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Short form of a user embedded in other resources.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UserSummary {
    #[schema(example = 42)]
    pub id: i32,
    #[schema(example = "Alice Wonder")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
}

impl From<&user::Model> for UserSummary {
    fn from(m: &user::Model) -> Self {
        Self {
            id: m.id,
            name: m.name.clone(),
            email: m.email.clone(),
        }
    }
}

/// Request body for editing the caller's own profile.
///
/// Absent or blank fields keep their current value.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct EditUserRequest {
    #[schema(example = "Alice W.")]
    pub name: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
}
