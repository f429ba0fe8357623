use axum::Json;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use common::{fingerprint, magic};
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};
use tracing::{error, instrument, warn};

use crate::entity::image::{self, ImageStatus};
use crate::error::AppError;
use crate::ingest::{self, NewImage};
use crate::models::image::{ImageDetail, ImageQuery, ImageUpload, ProcessQuery, VariantUrls};
use crate::models::shared::{Envelope, PageResult};
use crate::state::AppState;
use crate::utils::{filename, oplog};

/// Request body ceiling for upload routes: the 50 MiB file cap plus
/// multipart framing overhead. The exact cap is enforced per file below.
pub fn upload_body_limit() -> DefaultBodyLimit {
    DefaultBodyLimit::max(64 * 1024 * 1024)
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "Images",
    operation_id = "uploadImage",
    summary = "Upload a single image",
    description = "Validates magic bytes, fingerprints the content and deduplicates against \
        previously stored objects. A dedup hit creates a new image record sharing the stored \
        object and is marked `duplicate: true`.",
    request_body(content_type = "multipart/form-data", description = "Image file in the `file` field"),
    responses((status = 200, description = "Envelope with the upload result")),
)]
#[instrument(skip(state, multipart))]
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<ImageUpload>>, AppError> {
    let mut file: Option<(Vec<u8>, String, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("upload.jpg").to_string();
            let declared_mime = field.content_type().unwrap_or_default().to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Upload read error: {e}")))?;
            file = Some((bytes.to_vec(), declared_mime, name));
        }
    }

    let (bytes, declared_mime, name) =
        file.ok_or_else(|| AppError::BadRequest("Missing 'file' field".into()))?;

    let result = ingest_direct(&state, bytes, &declared_mime, &name).await?;
    Ok(Json(Envelope::success(result)))
}

#[utoipa::path(
    post,
    path = "/batch-upload",
    tag = "Images",
    operation_id = "batchUploadImages",
    summary = "Upload several images in one request",
    description = "Each `files` field is ingested independently; a failing file is logged and \
        skipped, the rest still commit.",
    request_body(content_type = "multipart/form-data", description = "Image files in repeated `files` fields"),
    responses((status = 200, description = "Envelope with one result per successful file")),
)]
#[instrument(skip(state, multipart))]
pub async fn batch_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Envelope<Vec<ImageUpload>>>, AppError> {
    let mut results = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Multipart error: {e}")))?
    {
        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }
        let name = field.file_name().unwrap_or("upload.jpg").to_string();
        let declared_mime = field.content_type().unwrap_or_default().to_string();
        let bytes = match field.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                warn!(file = %name, error = %e, "batch upload: field read failed");
                continue;
            }
        };

        match ingest_direct(&state, bytes, &declared_mime, &name).await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(file = %name, error = ?e, "batch upload: file failed, continuing");
            }
        }
    }

    Ok(Json(Envelope::success(results)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Images",
    operation_id = "getImageById",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Envelope with image detail")),
)]
#[instrument(skip(state))]
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<ImageDetail>>, AppError> {
    let cache_key = format!("id:{id}");
    if let Some(cached) = state.caches.image_detail.get(&cache_key) {
        return Ok(Json(Envelope::success(cached)));
    }

    let model = find_visible_image(&state, id).await?;
    let detail = build_detail(&state, &model).await;
    state.caches.image_detail.insert(cache_key, detail.clone());
    Ok(Json(Envelope::success(detail)))
}

#[utoipa::path(
    get,
    path = "/uuid/{uuid}",
    tag = "Images",
    operation_id = "getImageByUuid",
    params(("uuid" = String, Path, description = "External image UUID")),
    responses((status = 200, description = "Envelope with image detail")),
)]
#[instrument(skip(state))]
pub async fn get_by_uuid(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> Result<Json<Envelope<ImageDetail>>, AppError> {
    let cache_key = format!("uuid:{uuid}");
    if let Some(cached) = state.caches.image_detail.get(&cache_key) {
        return Ok(Json(Envelope::success(cached)));
    }

    let model = image::Entity::find()
        .filter(image::Column::ImageUuid.eq(&uuid))
        .one(&state.db)
        .await?
        .filter(|m| m.status != ImageStatus::Deleted)
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {uuid}")))?;

    let detail = build_detail(&state, &model).await;
    state.caches.image_detail.insert(cache_key, detail.clone());
    Ok(Json(Envelope::success(detail)))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Images",
    operation_id = "listImages",
    params(ImageQuery),
    responses((status = 200, description = "Envelope with a page of image details")),
)]
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ImageQuery>,
) -> Result<Json<Envelope<PageResult<ImageDetail>>>, AppError> {
    let page = query.page.unwrap_or(1).max(1);
    let size = query.size.unwrap_or(20).clamp(1, 100);

    let status = query
        .status
        .map(|code| {
            ImageStatus::from_code(code)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status: {code}")))
        })
        .transpose()?
        .unwrap_or(ImageStatus::Normal);

    let mut find = image::Entity::find().filter(image::Column::Status.eq(status));
    if let Some(format) = query.format.as_deref().filter(|f| !f.is_empty()) {
        find = find.filter(image::Column::Format.eq(format));
    }
    if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.is_empty()) {
        find = find.filter(image::Column::OriginalName.contains(keyword));
    }

    let total = find.clone().count(&state.db).await?;
    if total == 0 {
        return Ok(Json(Envelope::success(PageResult::empty(page, size))));
    }

    let sort_column = match query.sort_by.as_deref() {
        Some("fileSize") | Some("file_size") => image::Column::FileSize,
        Some("viewCount") | Some("view_count") => image::Column::ViewCount,
        _ => image::Column::CreatedAt,
    };
    find = match query.sort_order.as_deref() {
        Some("asc") => find.order_by_asc(sort_column),
        _ => find.order_by_desc(sort_column),
    };

    let models = find
        .offset((page - 1) * size)
        .limit(size)
        .all(&state.db)
        .await?;

    let mut records = Vec::with_capacity(models.len());
    for model in &models {
        records.push(build_detail(&state, model).await);
    }

    Ok(Json(Envelope::success(PageResult::of(
        records, total, page, size,
    ))))
}

#[utoipa::path(
    get,
    path = "/{id}/download-url",
    tag = "Images",
    operation_id = "getDownloadUrl",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Envelope with a fresh presigned GET URL")),
)]
#[instrument(skip(state))]
pub async fn download_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<String>>, AppError> {
    let model = find_visible_image(&state, id).await?;

    // The counter mutates through a single UPDATE expression; concurrent
    // downloads serialise on the row.
    image::Entity::update_many()
        .col_expr(
            image::Column::ViewCount,
            sea_orm::ExprTrait::add(Expr::col(image::Column::ViewCount), 1).into(),
        )
        .filter(image::Column::Id.eq(id))
        .exec(&state.db)
        .await?;
    state.caches.invalidate_images();

    let url = state
        .store
        .presign_get(&model.storage_path, state.config.storage.presign_expiry_secs)
        .await?;
    Ok(Json(Envelope::success(url)))
}

#[utoipa::path(
    get,
    path = "/{id}/process-url",
    tag = "Images",
    operation_id = "getProcessUrl",
    params(("id" = i64, Path, description = "Image ID"), ProcessQuery),
    responses((status = 200, description = "Envelope with a signed imgproxy URL")),
)]
#[instrument(skip(state))]
pub async fn process_url(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ProcessQuery>,
) -> Result<Json<Envelope<String>>, AppError> {
    let url = signed_process_url(&state, id, &query).await?;
    Ok(Json(Envelope::success(url)))
}

#[utoipa::path(
    get,
    path = "/{id}/process",
    tag = "Images",
    operation_id = "processImage",
    summary = "Redirect to the signed imgproxy URL",
    params(("id" = i64, Path, description = "Image ID"), ProcessQuery),
    responses((status = 307, description = "Redirect to imgproxy")),
)]
#[instrument(skip(state))]
pub async fn process_redirect(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ProcessQuery>,
) -> Result<Response, AppError> {
    let url = signed_process_url(&state, id, &query).await?;
    Ok(Redirect::temporary(&url).into_response())
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Images",
    operation_id = "softDeleteImage",
    summary = "Move an image to the recycle bin",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn soft_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, AppError> {
    let model = image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {id}")))?;

    let mut active: image::ActiveModel = model.into();
    active.status = Set(ImageStatus::Deleted);
    active.deleted_at = Set(Some(Utc::now()));
    active.updated_at = Set(Utc::now());
    image::Entity::update(active).exec(&state.db).await?;

    state.caches.invalidate_images();
    oplog::record(&state.db, "soft_delete", "image", id, None);
    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    delete,
    path = "/{id}/permanent",
    tag = "Images",
    operation_id = "hardDeleteImage",
    summary = "Physically delete an image",
    description = "Deletes the stored object (best effort), removes the record and decrements \
        the fingerprint refcount.",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn hard_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, AppError> {
    let model = image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {id}")))?;

    if let Err(e) = state.store.delete(&model.storage_path).await {
        error!(path = %model.storage_path, error = %e, "object delete failed during hard delete");
    }

    image::Entity::delete_by_id(id).exec(&state.db).await?;
    ingest::decr_ref(&state.db, &model.file_hash).await?;

    state.caches.invalidate_images();
    state.caches.invalidate_fingerprints();
    oplog::record(
        &state.db,
        "hard_delete",
        "image",
        id,
        Some(model.storage_path.clone()),
    );
    Ok(Json(Envelope::success_empty()))
}

/// Single-shot ingestion: gates, magic validation, fingerprint, dedup probe,
/// store put, commit tail.
pub async fn ingest_direct(
    state: &AppState,
    bytes: Vec<u8>,
    declared_mime: &str,
    original_name: &str,
) -> Result<ImageUpload, AppError> {
    // Cheap gates before any hashing.
    if bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }
    let max = state.config.storage.max_file_size;
    if bytes.len() as u64 > max {
        return Err(AppError::BadRequest(format!(
            "File size exceeds limit ({max} bytes)"
        )));
    }
    if !magic::ImageFormat::is_allowed_mime(declared_mime) {
        return Err(AppError::BadRequest(format!(
            "Unsupported file type: {declared_mime}"
        )));
    }

    let original_name = filename::validate_filename(original_name)
        .map_err(|e| AppError::BadRequest(e.message().into()))?
        .to_string();

    let header = &bytes[..bytes.len().min(16)];
    let format = magic::detect_format(header)
        .ok_or_else(|| AppError::BadRequest("File content is not a valid image".into()))?;
    let detected_mime = format.mime();
    if detected_mime != declared_mime {
        // The detected MIME wins for persistence.
        warn!(declared = %declared_mime, detected = %detected_mime, "MIME mismatch on upload");
    }

    let fp = fingerprint::of_bytes(&bytes);

    // Dedup probe: an existing fingerprint plus a normal-status image with
    // the same hash means the bytes are already stored.
    if let Some(existing_fp) = lookup_fingerprint_cached(state, &fp.sha256).await? {
        if existing_fp.file_md5 == fp.md5 && existing_fp.file_size as u64 == fp.size {
            let existing_image = image::Entity::find()
                .filter(image::Column::FileHash.eq(&fp.sha256))
                .filter(image::Column::Status.eq(ImageStatus::Normal))
                .one(&state.db)
                .await?;

            if let Some(existing) = existing_image {
                return dedup_hit(state, &original_name, &fp, existing).await;
            }
        } else {
            warn!(sha256 = %fp.sha256, "fingerprint triple mismatch, treating as new content");
        }
    }

    // Fresh content: probe pixels, store the object, commit.
    let pixels = ingest::read_pixel_info(&bytes);
    let key = common::storage::generate_object_key(format.primary_extension());
    state
        .store
        .put_bytes(&key, &bytes, detected_mime)
        .await
        .map_err(AppError::from)?;

    let model = ingest::commit_image(
        &state.db,
        NewImage {
            original_name,
            storage_path: key,
            bucket_name: state.store.bucket_name().to_string(),
            file_size: fp.size as i64,
            width: pixels.width,
            height: pixels.height,
            format: Some(format.as_str().to_string()),
            mime_type: Some(detected_mime.to_string()),
            color_space: pixels.color_space,
            has_alpha: pixels.has_alpha,
            sha256: fp.sha256,
            md5: fp.md5,
        },
    )
    .await?;

    state.caches.invalidate_images();
    state.caches.invalidate_fingerprints();
    oplog::record(
        &state.db,
        "upload",
        "image",
        model.id,
        Some(model.storage_path.clone()),
    );

    let download_url = presign_best_effort(state, &model.storage_path).await;
    Ok(ImageUpload::from_model(&model, download_url))
}

/// Dedup hit: a new image record referencing the already-stored object.
async fn dedup_hit(
    state: &AppState,
    original_name: &str,
    fp: &common::fingerprint::Fingerprint,
    existing: image::Model,
) -> Result<ImageUpload, AppError> {
    let model = ingest::insert_image(
        &state.db,
        NewImage {
            original_name: original_name.to_string(),
            storage_path: existing.storage_path.clone(),
            bucket_name: existing.bucket_name.clone(),
            file_size: fp.size as i64,
            width: existing.width,
            height: existing.height,
            format: existing.format.clone(),
            mime_type: existing.mime_type.clone(),
            color_space: existing.color_space.clone(),
            has_alpha: existing.has_alpha,
            sha256: fp.sha256.clone(),
            md5: fp.md5.clone(),
        },
    )
    .await?;

    ingest::incr_ref(&state.db, &fp.sha256).await?;
    ingest::enqueue_task(
        &state.db,
        crate::entity::async_task::AsyncTaskType::ExifExtract,
        model.id,
        None,
    )
    .await?;

    state.caches.invalidate_images();
    state.caches.invalidate_fingerprints();
    oplog::record(&state.db, "upload", "image", model.id, Some("dedup".into()));

    let download_url = presign_best_effort(state, &model.storage_path).await;
    Ok(ImageUpload::from_model(&model, download_url).duplicate())
}

async fn lookup_fingerprint_cached(
    state: &AppState,
    sha256: &str,
) -> Result<Option<crate::entity::file_fingerprint::Model>, AppError> {
    if let Some(cached) = state.caches.fingerprint.get(sha256) {
        return Ok(Some(cached));
    }
    let row = ingest::find_fingerprint(&state.db, sha256).await?;
    if let Some(row) = &row {
        state.caches.fingerprint.insert(sha256, row.clone());
    }
    Ok(row)
}

async fn find_visible_image(state: &AppState, id: i64) -> Result<image::Model, AppError> {
    image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .filter(|m| m.status != ImageStatus::Deleted)
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {id}")))
}

async fn signed_process_url(
    state: &AppState,
    id: i64,
    query: &ProcessQuery,
) -> Result<String, AppError> {
    let model = find_visible_image(state, id).await?;
    state
        .signer
        .processed_url(
            &model.storage_path,
            query.width,
            query.height,
            query.format.as_deref(),
            query.quality,
            query.smart_crop,
        )
        .ok_or_else(|| AppError::Internal("imgproxy signing is not configured".into()))
}

/// Presigned GET for responses. Signing failures warn and yield `None`;
/// they never fail the primary operation.
pub async fn presign_best_effort(state: &AppState, storage_path: &str) -> Option<String> {
    match state
        .store
        .presign_get(storage_path, state.config.storage.presign_expiry_secs)
        .await
    {
        Ok(url) => Some(url),
        Err(e) => {
            warn!(path = %storage_path, error = %e, "presign for response failed");
            None
        }
    }
}

/// Image detail with best-effort URL enrichment.
pub async fn build_detail(state: &AppState, model: &image::Model) -> ImageDetail {
    let mut detail = ImageDetail::from_model(model);
    detail.download_url = presign_best_effort(state, &model.storage_path).await;

    if state.signer.enabled() {
        detail.thumbnails = state.signer.thumbnail_urls(&model.storage_path);
        detail.variants = match (
            state.signer.webp_url(&model.storage_path, 85),
            state.signer.avif_url(&model.storage_path, 80),
        ) {
            (Some(webp), Some(avif)) => Some(VariantUrls { webp, avif }),
            _ => None,
        };
    }

    detail
}
