use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Completed file in the chunked large-object bucket.
///
/// Written only after every chunk of the upload is stored.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bucket_file")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub filename: String,
    pub content_type: Option<String>,

    /// Total size in bytes.
    pub length: i64,
    pub chunk_size: i32,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub metadata: Option<serde_json::Value>,

    pub upload_date: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
