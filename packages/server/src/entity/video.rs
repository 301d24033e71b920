use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "video")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,

    /// External playable source. Mutually exclusive with `video_file_id`.
    pub video_url: Option<String>,
    /// Stored binary holding the video content.
    pub video_file_id: Option<Uuid>,
    pub thumbnail_file_id: Option<Uuid>,

    /// Container duration in seconds, probed at upload time.
    pub duration: Option<f64>,
    pub views: i64,

    pub uploaded_by: i32,
    #[sea_orm(belongs_to, from = "uploaded_by", to = "id")]
    pub uploader: HasOne<super::user::Entity>,

    pub edited_by: Option<i32>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
