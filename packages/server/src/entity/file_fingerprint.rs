use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Content-addressed fingerprint row.
///
/// The unique index on `file_hash` is what linearises concurrent uploads of
/// identical content: every path inserts with ON CONFLICT DO NOTHING and the
/// losers converge on the winner's row. `ref_count` tracks how many image
/// records point at the stored object; at zero the object is reclaimable.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "file_fingerprint")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// SHA-256 of the content, lowercase hex.
    #[sea_orm(unique)]
    pub file_hash: String,
    /// MD5 of the content; dedup requires the full triple match.
    pub file_md5: String,

    /// Object key the content lives under.
    pub storage_path: String,
    pub file_size: i64,

    /// Number of image records referencing this content. Never below zero.
    pub ref_count: i64,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
