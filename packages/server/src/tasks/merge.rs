//! Chunk merge: the background tail of the resumable upload state machine.

use chrono::Utc;
use common::storage::chunk_key;
use common::{fingerprint, magic};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use tracing::{debug, error, info};

use crate::entity::upload_task::{self, UploadTaskStatus};
use crate::error::AppError;
use crate::ingest::{self, NewImage};
use crate::state::AppState;
use crate::utils::oplog;

/// Run the merge for a fully received upload: `uploading → merging`, then
/// `completed` on success or `failed` on any error (temp chunks are left
/// for the expiry sweep in that case).
pub async fn merge_chunks(state: AppState, task: upload_task::Model) {
    let upload_id = task.upload_id.clone();

    if let Err(e) = set_status(&state.db, &upload_id, UploadTaskStatus::Merging).await {
        error!(%upload_id, error = %e, "could not enter merging state");
        return;
    }

    match do_merge(&state, &task).await {
        Ok(image_id) => {
            if let Err(e) = set_status(&state.db, &upload_id, UploadTaskStatus::Completed).await {
                error!(%upload_id, error = %e, "merge committed but status update failed");
            }
            info!(%upload_id, image_id, "chunk merge completed");

            // Temp chunks are dead weight now; removal is best effort.
            let store = state.store.clone();
            let cleanup_id = upload_id.clone();
            let total = task.total_chunks as u32;
            tokio::spawn(async move {
                cleanup_chunks(&*store, &cleanup_id, total).await;
            });
        }
        Err(e) => {
            error!(%upload_id, error = ?e, "chunk merge failed");
            if let Err(e) = mark_failed(&state.db, &upload_id).await {
                error!(%upload_id, error = %e, "could not mark merge as failed");
            }
        }
    }

    state.upload_locks.remove(&upload_id).await;
}

async fn do_merge(state: &AppState, task: &upload_task::Model) -> Result<i64, AppError> {
    // Stream chunks 1..N in order into the merge buffer.
    let mut merged = Vec::with_capacity(task.file_size.max(0) as usize);
    for k in 1..=task.total_chunks as u32 {
        let bytes = state
            .store
            .get_bytes(&chunk_key(&task.upload_id, k))
            .await?;
        merged.extend_from_slice(&bytes);
    }

    // Cheap clients may concatenate garbage; the merged head must still be
    // a real image.
    let header = &merged[..merged.len().min(16)];
    let format = magic::detect_format(header).ok_or_else(|| {
        AppError::BadRequest("Merged content is not a valid image".to_string())
    })?;
    let mime = format.mime();

    let fp = fingerprint::of_bytes(&merged);
    state
        .store
        .put_bytes(&task.storage_path, &merged, mime)
        .await?;

    let pixels = ingest::read_pixel_info(&merged);
    let model = ingest::commit_image(
        &state.db,
        NewImage {
            original_name: task.file_name.clone(),
            storage_path: task.storage_path.clone(),
            bucket_name: state.store.bucket_name().to_string(),
            file_size: fp.size as i64,
            width: pixels.width,
            height: pixels.height,
            format: Some(format.as_str().to_string()),
            mime_type: Some(mime.to_string()),
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
        Some(format!("chunked:{}", task.upload_id)),
    );

    Ok(model.id)
}

/// Transition a non-terminal upload task to `failed`.
pub async fn mark_failed(db: &DatabaseConnection, upload_id: &str) -> Result<(), DbErr> {
    upload_task::Entity::update_many()
        .col_expr(
            upload_task::Column::Status,
            Expr::value(UploadTaskStatus::Failed).into(),
        )
        .col_expr(upload_task::Column::UpdatedAt, Expr::value(Utc::now()).into())
        .filter(upload_task::Column::UploadId.eq(upload_id))
        .filter(upload_task::Column::Status.is_in([
            UploadTaskStatus::Uploading,
            UploadTaskStatus::Merging,
        ]))
        .exec(db)
        .await?;
    Ok(())
}

async fn set_status(
    db: &DatabaseConnection,
    upload_id: &str,
    status: UploadTaskStatus,
) -> Result<(), DbErr> {
    upload_task::Entity::update_many()
        .col_expr(upload_task::Column::Status, Expr::value(status).into())
        .col_expr(upload_task::Column::UpdatedAt, Expr::value(Utc::now()).into())
        .filter(upload_task::Column::UploadId.eq(upload_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Delete the temporary chunk objects of an upload, best effort.
pub async fn cleanup_chunks(store: &dyn common::storage::ObjectStore, upload_id: &str, total: u32) {
    for k in 1..=total {
        let key = chunk_key(upload_id, k);
        if let Err(e) = store.delete(&key).await {
            debug!(%key, error = %e, "chunk cleanup failed");
        }
    }
    debug!(%upload_id, total, "chunk cleanup finished");
}
