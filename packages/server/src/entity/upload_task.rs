use sea_orm::entity::prelude::*;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};

/// State of a resumable chunked upload.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum UploadTaskStatus {
    /// Accepting chunk receipts.
    #[sea_orm(string_value = "uploading")]
    Uploading,
    /// All chunks received; merge in progress.
    #[sea_orm(string_value = "merging")]
    Merging,
    /// Merge produced exactly one committed image record.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Merge failed; temp chunks left for expiry cleanup.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Passed its 24h expiry before reaching a terminal state.
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl UploadTaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

/// Resumable multi-part upload state.
///
/// `uploaded_parts` is the received chunk set serialised as a sorted
/// comma-separated list of 1-based indices. It is only ever rewritten under
/// the per-upload lock held by chunk receipt.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "upload_task")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub upload_id: String,

    pub file_name: String,
    /// Declared total size in bytes.
    pub file_size: i64,
    /// Client-declared SHA-256, if provided at init.
    pub file_hash: Option<String>,

    pub chunk_size: i32,
    pub total_chunks: i32,
    pub uploaded_chunks: i32,
    pub uploaded_parts: String,

    /// Final object key, reserved at init.
    pub storage_path: String,

    pub status: UploadTaskStatus,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
    pub expires_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}

/// Parse the serialised received-chunk set.
pub fn parse_uploaded_parts(parts: &str) -> std::collections::BTreeSet<u32> {
    parts
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}

/// Serialise a received-chunk set in ascending order.
pub fn format_uploaded_parts(parts: &std::collections::BTreeSet<u32>) -> String {
    parts
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
