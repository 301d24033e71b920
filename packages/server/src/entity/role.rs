use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Assigned on registration. Can browse and watch, but holds no permissions.
pub const DEFAULT_ROLE: &str = "user";

/// Holds every permission. Only created by seeding, never by registration.
pub const ADMIN_ROLE: &str = "admin";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "role")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub name: String,

    #[sea_orm(has_many)]
    pub users: HasMany<super::user::Entity>,

    #[sea_orm(has_many)]
    pub permissions: HasMany<super::role_permission::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
