use axum::Json;
use axum::extract::{Multipart, Path, State};
use chrono::{Duration, Utc};
use common::magic::ImageFormat;
use common::storage::{chunk_key, generate_object_key};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{error, info, instrument, warn};

use crate::entity::async_task::AsyncTaskType;
use crate::entity::upload_task::{
    self, UploadTaskStatus, format_uploaded_parts, parse_uploaded_parts,
};
use crate::error::AppError;
use crate::handlers::image::presign_best_effort;
use crate::ingest::{self, NewImage};
use crate::models::shared::Envelope;
use crate::models::upload::{
    ChunkInit, ChunkInitRequest, ChunkUpload, InstantUpload, InstantUploadRequest,
    PresignedConfirmRequest, PresignedUpload, PresignedUploadRequest,
};
use crate::state::AppState;
use crate::tasks::merge;
use crate::utils::filename;

/// Maximum chunk count expressible in the 4-digit temp key layout.
const MAX_TOTAL_CHUNKS: i64 = 9999;

#[utoipa::path(
    post,
    path = "/instant-upload",
    tag = "Uploads",
    operation_id = "instantUpload",
    summary = "Fingerprint-only upload probe",
    description = "Matches the declared (SHA-256, MD5, size) triple against stored content. \
        On a hit a new image record is created without transferring bytes.",
    responses((status = 200, description = "Envelope with the probe result")),
)]
#[instrument(skip(state, request))]
pub async fn instant_upload(
    State(state): State<AppState>,
    Json(request): Json<InstantUploadRequest>,
) -> Result<Json<Envelope<InstantUpload>>, AppError> {
    let Some(fingerprint) = ingest::find_fingerprint(&state.db, &request.file_hash).await? else {
        return Ok(Json(Envelope::success(InstantUpload::not_matched())));
    };

    // Dedup requires the full triple; neither hash is trusted alone.
    if fingerprint.file_md5 != request.file_md5 {
        warn!(sha256 = %request.file_hash, "instant upload: SHA-256 matched but MD5 did not");
        return Ok(Json(Envelope::success(InstantUpload::not_matched())));
    }
    if fingerprint.file_size != request.file_size {
        warn!(
            sha256 = %request.file_hash,
            expected = fingerprint.file_size,
            declared = request.file_size,
            "instant upload: hash matched but size did not"
        );
        return Ok(Json(Envelope::success(InstantUpload::not_matched())));
    }

    let original_name = filename::validate_filename(&request.original_name)
        .map_err(|e| AppError::BadRequest(e.message().into()))?
        .to_string();

    let model = ingest::insert_image(
        &state.db,
        NewImage {
            original_name,
            storage_path: fingerprint.storage_path.clone(),
            bucket_name: state.store.bucket_name().to_string(),
            file_size: request.file_size,
            width: 0,
            height: 0,
            format: None,
            mime_type: None,
            color_space: None,
            has_alpha: false,
            sha256: request.file_hash.clone(),
            md5: request.file_md5.clone(),
        },
    )
    .await?;

    ingest::incr_ref(&state.db, &request.file_hash).await?;
    ingest::enqueue_task(&state.db, AsyncTaskType::ExifExtract, model.id, None).await?;

    state.caches.invalidate_images();
    state.caches.invalidate_fingerprints();

    let download_url = presign_best_effort(&state, &fingerprint.storage_path).await;
    info!(id = model.id, sha256 = %request.file_hash, "instant upload hit");
    Ok(Json(Envelope::success(InstantUpload::matched(
        model.id,
        model.image_uuid,
        download_url,
    ))))
}

#[utoipa::path(
    post,
    path = "/presigned-upload",
    tag = "Uploads",
    operation_id = "presignUpload",
    summary = "Mint a presigned client-direct upload URL",
    description = "Reserves an object key and signs a PUT URL. The server tracks nothing; \
        a client that never completes leaves no state behind.",
    responses((status = 200, description = "Envelope with the upload slot")),
)]
#[instrument(skip(state))]
pub async fn presign_upload(
    State(state): State<AppState>,
    Json(request): Json<PresignedUploadRequest>,
) -> Result<Json<Envelope<PresignedUpload>>, AppError> {
    let extension = filename::extension_or_default(&request.file_name);
    if ImageFormat::from_extension(&extension).is_none() {
        return Err(AppError::BadRequest(format!(
            "Unsupported file format: {extension}"
        )));
    }

    let storage_path = generate_object_key(&extension);
    let expiry = state.config.storage.presign_expiry_secs;
    let upload_url = state
        .store
        .presign_put(&storage_path, &request.content_type, expiry)
        .await?;

    Ok(Json(Envelope::success(PresignedUpload {
        upload_url,
        storage_path,
        expiry_seconds: expiry,
    })))
}

#[utoipa::path(
    post,
    path = "/presigned-upload/confirm",
    tag = "Uploads",
    operation_id = "confirmPresignedUpload",
    summary = "Register a completed client-direct upload",
    description = "Creates the image record from client-declared metadata. The declared hashes \
        are trusted without reading the object back; strict clients use the direct path.",
    responses((status = 200, description = "Envelope with the committed image")),
)]
#[instrument(skip(state, request))]
pub async fn confirm_presigned_upload(
    State(state): State<AppState>,
    Json(request): Json<PresignedConfirmRequest>,
) -> Result<Json<Envelope<crate::models::image::ImageUpload>>, AppError> {
    if request.file_hash.is_empty() || request.file_md5.is_empty() {
        return Err(AppError::BadRequest(
            "fileHash and fileMd5 are required".into(),
        ));
    }
    if request.file_size <= 0 {
        return Err(AppError::BadRequest("fileSize must be positive".into()));
    }
    let original_name = filename::validate_filename(&request.original_name)
        .map_err(|e| AppError::BadRequest(e.message().into()))?
        .to_string();

    let format = request
        .content_type
        .as_deref()
        .and_then(ImageFormat::from_mime);
    if format.is_none() {
        warn!(content_type = ?request.content_type, "confirm: could not infer image format");
    }

    let model = ingest::commit_image(
        &state.db,
        NewImage {
            original_name,
            storage_path: request.storage_path.clone(),
            bucket_name: state.store.bucket_name().to_string(),
            file_size: request.file_size,
            width: 0,
            height: 0,
            format: format.map(|f| f.as_str().to_string()),
            mime_type: request.content_type.clone(),
            color_space: None,
            has_alpha: false,
            sha256: request.file_hash.clone(),
            md5: request.file_md5.clone(),
        },
    )
    .await?;

    state.caches.invalidate_images();
    state.caches.invalidate_fingerprints();

    let download_url = presign_best_effort(&state, &model.storage_path).await;
    info!(id = model.id, "presigned upload confirmed");
    Ok(Json(Envelope::success(
        crate::models::image::ImageUpload::from_model(&model, download_url),
    )))
}

#[utoipa::path(
    post,
    path = "/chunk-upload/init",
    tag = "Uploads",
    operation_id = "initChunkUpload",
    summary = "Start a resumable chunked upload",
    responses((status = 200, description = "Envelope with upload id and chunk layout")),
)]
#[instrument(skip(state))]
pub async fn chunk_init(
    State(state): State<AppState>,
    Json(request): Json<ChunkInitRequest>,
) -> Result<Json<Envelope<ChunkInit>>, AppError> {
    if request.file_size <= 0 {
        return Err(AppError::BadRequest("fileSize must be positive".into()));
    }
    if request.file_size as u64 > state.config.storage.max_file_size {
        return Err(AppError::BadRequest(format!(
            "File size exceeds limit ({} bytes)",
            state.config.storage.max_file_size
        )));
    }

    // An existing fingerprint means the client could use instant upload
    // instead; init proceeds regardless.
    if let Some(hash) = request.file_hash.as_deref().filter(|h| !h.is_empty())
        && ingest::find_fingerprint(&state.db, hash).await?.is_some()
    {
        info!(sha256 = %hash, "chunk init: content already stored, instant upload possible");
    }

    let chunk_size = match request.chunk_size {
        Some(size) if size > 0 => size,
        _ => state.config.storage.chunk_size,
    };
    let total_chunks = (request.file_size as u64).div_ceil(chunk_size as u64) as i64;
    if total_chunks > MAX_TOTAL_CHUNKS {
        return Err(AppError::BadRequest(format!(
            "Too many chunks ({total_chunks}); increase chunkSize"
        )));
    }

    let upload_id = uuid::Uuid::new_v4().simple().to_string();
    let extension = filename::extension(&request.file_name).unwrap_or_else(|| "bin".to_string());
    let storage_path = generate_object_key(&extension);

    let now = Utc::now();
    let task = upload_task::ActiveModel {
        upload_id: Set(upload_id.clone()),
        file_name: Set(request.file_name.clone()),
        file_size: Set(request.file_size),
        file_hash: Set(request.file_hash.clone().filter(|h| !h.is_empty())),
        chunk_size: Set(chunk_size as i32),
        total_chunks: Set(total_chunks as i32),
        uploaded_chunks: Set(0),
        uploaded_parts: Set(String::new()),
        storage_path: Set(storage_path),
        status: Set(UploadTaskStatus::Uploading),
        created_at: Set(now),
        updated_at: Set(now),
        expires_at: Set(now + Duration::hours(24)),
        ..Default::default()
    };
    upload_task::Entity::insert(task)
        .exec_without_returning(&state.db)
        .await?;

    info!(%upload_id, total_chunks, chunk_size, "chunk upload initialised");
    Ok(Json(Envelope::success(ChunkInit {
        upload_id,
        total_chunks: total_chunks as u32,
        chunk_size,
        uploaded_chunks: Vec::new(),
    })))
}

#[utoipa::path(
    post,
    path = "/chunk-upload/{upload_id}/{chunk_number}",
    tag = "Uploads",
    operation_id = "uploadChunk",
    summary = "Upload one chunk",
    description = "Idempotent per chunk index: re-sending a received chunk is acknowledged \
        without rewriting. The receipt that completes the set schedules the merge exactly once.",
    params(
        ("upload_id" = String, Path, description = "Upload task ID"),
        ("chunk_number" = u32, Path, description = "1-based chunk index"),
    ),
    request_body(content_type = "multipart/form-data", description = "Chunk bytes in the `chunk` field"),
    responses((status = 200, description = "Envelope with the receipt acknowledgement")),
)]
#[instrument(skip(state, multipart))]
pub async fn chunk_put(
    State(state): State<AppState>,
    Path((upload_id, chunk_number)): Path<(String, u32)>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<ChunkUpload>>, AppError> {
    let mut chunk: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("chunk") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Chunk read error: {e}")))?;
            chunk = Some(bytes.to_vec());
        }
    }
    let chunk = chunk.ok_or_else(|| AppError::BadRequest("Missing 'chunk' field".into()))?;
    if chunk.is_empty() {
        return Err(AppError::BadRequest("Chunk is empty".into()));
    }

    // Receipts for one upload serialise here so the all-received transition
    // fires exactly once.
    let lock = state.upload_locks.get(&upload_id).await;
    let _guard = lock.lock().await;

    let task = upload_task::Entity::find()
        .filter(upload_task::Column::UploadId.eq(&upload_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload task not found: {upload_id}")))?;

    if task.status != UploadTaskStatus::Uploading {
        return Err(AppError::BadRequest(format!(
            "Upload task is not accepting chunks (status: {:?})",
            task.status
        )));
    }
    if chunk_number < 1 || chunk_number as i32 > task.total_chunks {
        return Err(AppError::BadRequest(format!(
            "Invalid chunk number: {chunk_number}"
        )));
    }

    let mut received = parse_uploaded_parts(&task.uploaded_parts);
    let total = task.total_chunks as usize;

    // Idempotent re-send of an already-received chunk.
    if received.contains(&chunk_number) {
        return Ok(Json(Envelope::success(ChunkUpload {
            success: true,
            chunk_number,
            all_uploaded: received.len() == total,
        })));
    }

    state
        .store
        .put_bytes(
            &chunk_key(&upload_id, chunk_number),
            &chunk,
            "application/octet-stream",
        )
        .await?;

    received.insert(chunk_number);
    let all_uploaded = received.len() == total;

    let mut active: upload_task::ActiveModel = task.clone().into();
    active.uploaded_chunks = Set(received.len() as i32);
    active.uploaded_parts = Set(format_uploaded_parts(&received));
    active.updated_at = Set(Utc::now());
    let task = upload_task::Entity::update(active).exec(&state.db).await?;

    if all_uploaded {
        schedule_merge(&state, task);
    }

    Ok(Json(Envelope::success(ChunkUpload {
        success: true,
        chunk_number,
        all_uploaded,
    })))
}

#[utoipa::path(
    get,
    path = "/chunk-upload/{upload_id}/progress",
    tag = "Uploads",
    operation_id = "chunkUploadProgress",
    summary = "Read upload progress for resume",
    params(("upload_id" = String, Path, description = "Upload task ID")),
    responses((status = 200, description = "Envelope with the received chunk set")),
)]
#[instrument(skip(state))]
pub async fn chunk_progress(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
) -> Result<Json<Envelope<ChunkInit>>, AppError> {
    let task = upload_task::Entity::find()
        .filter(upload_task::Column::UploadId.eq(&upload_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Upload task not found: {upload_id}")))?;

    Ok(Json(Envelope::success(ChunkInit {
        upload_id: task.upload_id,
        total_chunks: task.total_chunks as u32,
        chunk_size: task.chunk_size as u32,
        uploaded_chunks: parse_uploaded_parts(&task.uploaded_parts)
            .into_iter()
            .collect(),
    })))
}

/// Hand the merge to the worker pool. Saturation is logged and the task is
/// failed so the expiry sweep reclaims its chunks; nothing is dropped
/// silently.
fn schedule_merge(state: &AppState, task: upload_task::Model) {
    let pool = state.pool.clone();
    let job_state = state.clone();
    let upload_id = task.upload_id.clone();

    if pool
        .try_submit(async move {
            merge::merge_chunks(job_state, task).await;
        })
        .is_err()
    {
        error!(%upload_id, "worker pool saturated, failing chunk merge");
        let db = state.db.clone();
        tokio::spawn(async move {
            if let Err(e) = merge::mark_failed(&db, &upload_id).await {
                error!(%upload_id, error = %e, "could not mark saturated merge as failed");
            }
        });
    }
}
