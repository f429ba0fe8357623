use sea_orm::entity::prelude::*;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};

/// Kind of background work a task row represents.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum AsyncTaskType {
    /// Read the stored object and extract EXIF metadata.
    #[sea_orm(string_value = "exif_extract")]
    ExifExtract,
    /// Recognised but a no-op: imgproxy renders thumbnails on demand.
    #[sea_orm(string_value = "thumbnail_generate")]
    ThumbnailGenerate,
    /// Recognised but a no-op: imgproxy converts formats on demand.
    #[sea_orm(string_value = "format_convert")]
    FormatConvert,
    /// Reserved for perceptual hashing.
    #[sea_orm(string_value = "image_hash")]
    ImageHash,
}

/// Lifecycle of a background task row.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum AsyncTaskStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "success")]
    Success,
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Terminal; set only by administrative action.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl AsyncTaskStatus {
    pub const ALL: &'static [AsyncTaskStatus] = &[
        Self::Pending,
        Self::Processing,
        Self::Success,
        Self::Failed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Durable background work unit, driven by the periodic sweeps.
///
/// A task terminates in `success`, `cancelled`, or `failed` with
/// `retry_count` at the cap.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "async_task")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub task_type: AsyncTaskType,

    /// Target image record.
    #[sea_orm(indexed)]
    pub image_id: i64,

    /// Opaque parameter string, interpreted per task type.
    pub params: Option<String>,

    #[sea_orm(indexed)]
    pub status: AsyncTaskStatus,

    /// Retries consumed so far. The retry sweep only selects rows with
    /// `retry_count < max_retry`.
    pub retry_count: i32,
    pub max_retry: i32,

    pub error_message: Option<String>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub executed_at: Option<DateTimeUtc>,
}

impl ActiveModelBehavior for ActiveModel {}
