use chrono::Utc;
use sea_orm::sea_query::{Index, OnConflict, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::config::AdminSeedConfig;
use crate::entity::{bucket_file, role, role_permission, user, video};
use crate::models::auth::{normalize_email, validate_email, validate_password};
use crate::utils::hash;

/// Default roles seeded on startup.
const DEFAULT_ROLES: &[&str] = &[role::ADMIN_ROLE, role::DEFAULT_ROLE];

/// Default role-permission mappings seeded on startup.
const DEFAULT_MAPPINGS: &[(&str, &str)] = &[
    (role::ADMIN_ROLE, role_permission::VIDEO_UPLOAD),
    (role::ADMIN_ROLE, role_permission::VIDEO_EDIT),
    (role::ADMIN_ROLE, role_permission::VIDEO_DELETE),
    (role::ADMIN_ROLE, role_permission::USER_VIEW_ALL),
];

/// Seed the `role` and `role_permission` tables with defaults.
pub async fn seed_role_permissions(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut roles_inserted = 0u32;
    for &name in DEFAULT_ROLES {
        let model = role::ActiveModel {
            name: Set(name.to_string()),
        };

        let result = role::Entity::insert(model)
            .on_conflict(
                OnConflict::column(role::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(n) if n > 0 => roles_inserted += 1,
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if roles_inserted > 0 {
        info!("Seeded {} new roles", roles_inserted);
    }

    let mut perms_inserted = 0u32;
    for &(role, permission) in DEFAULT_MAPPINGS {
        let model = role_permission::ActiveModel {
            role: Set(role.to_string()),
            permission: Set(permission.to_string()),
        };

        let result = role_permission::Entity::insert(model)
            .on_conflict(
                OnConflict::columns([
                    role_permission::Column::Role,
                    role_permission::Column::Permission,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(n) if n > 0 => perms_inserted += 1,
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if perms_inserted > 0 {
        info!("Seeded {} new role-permission mappings", perms_inserted);
    }

    Ok(())
}

/// Create the configured bootstrap administrator if no account uses that e-mail yet.
///
/// The account is created verified, so it can log in immediately.
pub async fn seed_admin(db: &DatabaseConnection, admin: &AdminSeedConfig) -> anyhow::Result<()> {
    let email = normalize_email(&admin.email);
    validate_email(&email).map_err(|_| anyhow::anyhow!("auth.admin.email is not a valid address"))?;
    validate_password(&admin.password)
        .map_err(|_| anyhow::anyhow!("auth.admin.password must be 8-128 characters"))?;

    let exists = user::Entity::find()
        .filter(user::Column::Email.eq(&email))
        .count(db)
        .await?
        > 0;
    if exists {
        return Ok(());
    }

    let hash = hash::hash_password(&admin.password)
        .map_err(|e| anyhow::anyhow!("Password hash error: {e}"))?;
    let now = Utc::now();
    user::ActiveModel {
        name: Set(admin.name.clone()),
        email: Set(email.clone()),
        password: Set(hash),
        role: Set(role::ADMIN_ROLE.to_string()),
        is_verified: Set(true),
        reset_password_verified: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(%email, "Seeded bootstrap administrator");
    Ok(())
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Newest revision lookup by filename.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_bucket_file_filename_upload_date")
        .table(bucket_file::Entity)
        .col(bucket_file::Column::Filename)
        .col(bucket_file::Column::UploadDate)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_bucket_file_filename_upload_date", &stmt).await;

    // Newest-first video listing.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_video_created_at")
        .table(video::Entity)
        .col(video::Column::CreatedAt)
        .to_string(PostgresQueryBuilder);
    create_index(db, "idx_video_created_at", &stmt).await;

    Ok(())
}

async fn create_index(db: &DatabaseConnection, name: &str, stmt: &str) {
    match db.execute_unprepared(stmt).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
    }
}
