use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const VIDEO_UPLOAD: &str = "video:upload";
pub const VIDEO_EDIT: &str = "video:edit";
pub const VIDEO_DELETE: &str = "video:delete";
/// Read any user's profile and list all accounts.
pub const USER_VIEW_ALL: &str = "user:view_all";

/// Grants one permission to one role. Permissions travel in the bearer token.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role_permission")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub role: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub permission: String,
    #[sea_orm(belongs_to, from = "role", to = "name")]
    pub role_ref: HasOne<super::role::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
