use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_hours: u32,
}

/// System-wide counters for the admin dashboard.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_images: u64,
    pub deleted_images: u64,
    pub reviewing_images: u64,
    /// Sum of file sizes over non-deleted images, in bytes.
    pub total_storage: i64,
    pub today_uploads: u64,
    pub format_distribution: BTreeMap<String, u64>,
}

/// Per-status background task counts.
#[derive(Serialize, utoipa::ToSchema)]
pub struct TaskStatsResponse {
    pub counts: BTreeMap<String, u64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    pub ids: Vec<i64>,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchTagRequest {
    pub image_ids: Vec<i64>,
    pub tag_names: Vec<String>,
}
