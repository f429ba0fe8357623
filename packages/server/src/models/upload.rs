use serde::{Deserialize, Serialize};

/// Fingerprint-only upload probe.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstantUploadRequest {
    /// SHA-256 of the content, lowercase hex.
    pub file_hash: String,
    /// MD5 of the content, lowercase hex.
    pub file_md5: String,
    pub file_size: i64,
    pub original_name: String,
}

/// Result of an instant-upload probe.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstantUpload {
    pub matched: bool,
    pub id: Option<i64>,
    pub image_uuid: Option<String>,
    pub download_url: Option<String>,
}

impl InstantUpload {
    pub fn matched(id: i64, image_uuid: String, download_url: Option<String>) -> Self {
        Self {
            matched: true,
            id: Some(id),
            image_uuid: Some(image_uuid),
            download_url,
        }
    }

    pub fn not_matched() -> Self {
        Self {
            matched: false,
            id: None,
            image_uuid: None,
            download_url: None,
        }
    }
}

/// Request to mint a presigned client-direct upload URL.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadRequest {
    pub file_name: String,
    pub content_type: String,
}

/// A minted presigned upload slot. The server keeps no state for it.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUpload {
    pub upload_url: String,
    pub storage_path: String,
    pub expiry_seconds: u32,
}

/// Confirmation of a completed client-direct upload.
///
/// The declared hashes are trusted as-is; clients wanting strict
/// verification use the direct upload path instead.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedConfirmRequest {
    pub storage_path: String,
    pub original_name: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub file_hash: String,
    pub file_md5: String,
}

/// Request to start a resumable chunked upload.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInitRequest {
    pub file_name: String,
    pub file_size: i64,
    /// Overrides the default 5 MiB chunk size.
    pub chunk_size: Option<u32>,
    /// Optional client-declared SHA-256.
    pub file_hash: Option<String>,
}

/// Chunked upload state, returned by init and progress.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInit {
    pub upload_id: String,
    pub total_chunks: u32,
    pub chunk_size: u32,
    /// 1-based indices already received, ascending.
    pub uploaded_chunks: Vec<u32>,
}

/// Acknowledgement of a single chunk receipt.
#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUpload {
    pub success: bool,
    pub chunk_number: u32,
    /// True exactly when this receipt completed the set.
    pub all_uploaded: bool,
}
