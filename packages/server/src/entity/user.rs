use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,
    /// Trimmed and lower-cased before storage.
    #[sea_orm(unique)]
    pub email: String,
    /// Argon2 PHC string.
    pub password: String,
    pub country: Option<String>,
    pub city: Option<String>,

    pub role: String,
    #[sea_orm(belongs_to, from = "role", to = "name")]
    pub role_ref: HasOne<super::role::Entity>,

    pub is_verified: bool,
    pub email_verification_otp: Option<String>,
    pub email_verification_expires: Option<DateTimeUtc>,

    pub reset_password_otp: Option<String>,
    pub reset_password_expires: Option<DateTimeUtc>,
    /// Set once the reset code has been confirmed; cleared when the new password is stored.
    pub reset_password_verified: bool,

    #[sea_orm(has_many)]
    pub videos: HasMany<super::video::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
