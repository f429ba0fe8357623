use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::image;
use crate::imgproxy::ThumbnailUrls;

/// Response DTO for a completed upload.
#[derive(Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    pub id: i64,
    pub image_uuid: String,
    pub original_name: String,
    pub file_size: i64,
    pub width: i32,
    pub height: i32,
    /// Canonical format tag, e.g. "jpeg".
    pub format: Option<String>,
    pub mime_type: Option<String>,
    pub storage_path: String,
    /// SHA-256 of the content.
    pub file_hash: String,
    /// Fresh presigned GET URL; absent when signing failed.
    pub download_url: Option<String>,
    /// True when the upload deduplicated against existing content.
    pub duplicate: bool,
}

impl ImageUpload {
    pub fn from_model(model: &image::Model, download_url: Option<String>) -> Self {
        Self {
            id: model.id,
            image_uuid: model.image_uuid.clone(),
            original_name: model.original_name.clone(),
            file_size: model.file_size,
            width: model.width,
            height: model.height,
            format: model.format.clone(),
            mime_type: model.mime_type.clone(),
            storage_path: model.storage_path.clone(),
            file_hash: model.file_hash.clone(),
            download_url,
            duplicate: false,
        }
    }

    pub fn duplicate(mut self) -> Self {
        self.duplicate = true;
        self
    }
}

/// Format variant URLs rendered by imgproxy on demand.
#[derive(Clone, Serialize, utoipa::ToSchema)]
pub struct VariantUrls {
    pub webp: String,
    pub avif: String,
}

/// Full image detail returned by query endpoints.
#[derive(Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetail {
    pub id: i64,
    pub image_uuid: String,
    pub original_name: String,
    pub file_size: i64,
    pub width: i32,
    pub height: i32,
    pub format: Option<String>,
    pub mime_type: Option<String>,
    pub color_space: Option<String>,
    pub has_alpha: bool,
    /// 0 deleted, 1 normal, 2 reviewing.
    pub status: i32,
    /// 0 public, 1 private, 2 restricted.
    pub access_level: i32,
    pub view_count: i64,
    pub description: Option<String>,
    pub file_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub download_url: Option<String>,
    pub thumbnails: Option<ThumbnailUrls>,
    pub variants: Option<VariantUrls>,
}

impl ImageDetail {
    /// Descriptive columns only; the URL fields are best-effort enrichment
    /// filled in by the handler.
    pub fn from_model(model: &image::Model) -> Self {
        Self {
            id: model.id,
            image_uuid: model.image_uuid.clone(),
            original_name: model.original_name.clone(),
            file_size: model.file_size,
            width: model.width,
            height: model.height,
            format: model.format.clone(),
            mime_type: model.mime_type.clone(),
            color_space: model.color_space.clone(),
            has_alpha: model.has_alpha,
            status: model.status.code(),
            access_level: model.access_level.code(),
            view_count: model.view_count,
            description: model.description.clone(),
            file_hash: model.file_hash.clone(),
            created_at: model.created_at,
            updated_at: model.updated_at,
            download_url: None,
            thumbnails: None,
            variants: None,
        }
    }
}

/// Filters for the image list endpoint.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageQuery {
    pub page: Option<u64>,
    pub size: Option<u64>,
    /// Status filter; defaults to normal (1). Admin may pass any status.
    pub status: Option<i32>,
    pub format: Option<String>,
    /// Substring match on the original filename.
    pub keyword: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// Parameters of the generic processing endpoint.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[serde(default, rename_all = "camelCase")]
pub struct ProcessQuery {
    pub width: u32,
    pub height: u32,
    /// Target format; empty keeps the original.
    pub format: Option<String>,
    pub quality: u32,
    pub smart_crop: bool,
}

impl Default for ProcessQuery {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            format: None,
            quality: 0,
            smart_crop: false,
        }
    }
}
