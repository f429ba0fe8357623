use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of an image record.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum ImageStatus {
    #[sea_orm(num_value = 0)]
    Deleted,
    #[sea_orm(num_value = 1)]
    Normal,
    #[sea_orm(num_value = 2)]
    Reviewing,
}

impl ImageStatus {
    pub fn code(&self) -> i32 {
        match self {
            Self::Deleted => 0,
            Self::Normal => 1,
            Self::Reviewing => 2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Deleted),
            1 => Some(Self::Normal),
            2 => Some(Self::Reviewing),
            _ => None,
        }
    }
}

/// Coarse access level carried by every image.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
pub enum AccessLevel {
    #[sea_orm(num_value = 0)]
    Public,
    #[sea_orm(num_value = 1)]
    Private,
    #[sea_orm(num_value = 2)]
    Restricted,
}

impl AccessLevel {
    pub fn code(&self) -> i32 {
        match self {
            Self::Public => 0,
            Self::Private => 1,
            Self::Restricted => 2,
        }
    }
}

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "image")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Opaque external identifier.
    #[sea_orm(unique)]
    pub image_uuid: String,

    /// SHA-256 of the content, lowercase hex.
    #[sea_orm(indexed)]
    pub file_hash: String,
    /// MD5 of the content, lowercase hex.
    pub file_md5: String,

    pub original_name: String,

    /// Object key inside the bucket.
    pub storage_path: String,
    pub bucket_name: String,

    pub file_size: i64,
    /// Pixel dimensions; 0 when extraction failed.
    pub width: i32,
    pub height: i32,

    /// Canonical format tag (`jpeg|png|gif|webp|bmp`).
    pub format: Option<String>,
    pub mime_type: Option<String>,
    pub color_space: Option<String>,
    pub has_alpha: bool,

    pub status: ImageStatus,
    pub access_level: AccessLevel,

    pub view_count: i64,
    pub description: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,

    #[sea_orm(has_one)]
    pub metadata: HasOne<super::image_metadata::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
