use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only audit record of mutating operations.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "operation_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// e.g. "upload", "soft_delete", "hard_delete", "restore".
    pub operation_type: String,

    /// Target aggregate ("image", "tag", "album").
    pub target_type: String,
    #[sea_orm(indexed)]
    pub target_id: i64,

    pub detail: Option<String>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
