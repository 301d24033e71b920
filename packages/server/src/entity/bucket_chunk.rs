use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One fixed-size slice of a stored file. Chunk `n` covers bytes `n * chunk_size ..`.
///
/// No foreign key to `bucket_file`: chunks are written before the file row exists.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bucket_chunk")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub files_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub n: i32,

    pub data: Vec<u8>,
}

impl ActiveModelBehavior for ActiveModel {}
