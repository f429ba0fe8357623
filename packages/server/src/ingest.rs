//! Ingestion commit tail and fingerprint index operations.
//!
//! All three upload paths (direct, presigned-confirm, chunk merge) converge
//! here: insert the image record, converge the fingerprint row, enqueue the
//! EXIF extraction task. No multi-statement transaction spans the object
//! store and the database; an object orphaned by a failed image insert is
//! accepted and left for out-of-band cleanup.

use chrono::Utc;
use common::fingerprint::Fingerprint;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ExprTrait, QueryFilter, Set,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::entity::async_task::{self, AsyncTaskStatus, AsyncTaskType};
use crate::entity::{file_fingerprint, image};
use crate::error::AppError;

/// Fingerprint index lookup by SHA-256.
pub async fn find_fingerprint(
    db: &DatabaseConnection,
    sha256: &str,
) -> Result<Option<file_fingerprint::Model>, DbErr> {
    file_fingerprint::Entity::find()
        .filter(file_fingerprint::Column::FileHash.eq(sha256))
        .one(db)
        .await
}

/// Converge the fingerprint row for one new image record.
///
/// First reference inserts the row with `ref_count = 1`; every later
/// reference lands on the unique-hash conflict and increments instead.
/// Concurrent identical uploads race to insert and the losers observe the
/// conflict — that is the intended convergence, never an error.
pub async fn upsert_fingerprint(
    db: &DatabaseConnection,
    fingerprint: &Fingerprint,
    storage_path: &str,
) -> Result<(), DbErr> {
    let row = file_fingerprint::ActiveModel {
        file_hash: Set(fingerprint.sha256.clone()),
        file_md5: Set(fingerprint.md5.clone()),
        storage_path: Set(storage_path.to_string()),
        file_size: Set(fingerprint.size as i64),
        ref_count: Set(1),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let inserted = file_fingerprint::Entity::insert(row)
        .on_conflict(
            OnConflict::column(file_fingerprint::Column::FileHash)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted == 0 {
        debug!(sha256 = %fingerprint.sha256, "fingerprint already present, incrementing refcount");
        incr_ref(db, &fingerprint.sha256).await?;
    }

    Ok(())
}

/// Atomically increment the refcount of a fingerprint.
pub async fn incr_ref(db: &DatabaseConnection, sha256: &str) -> Result<(), DbErr> {
    file_fingerprint::Entity::update_many()
        .col_expr(
            file_fingerprint::Column::RefCount,
            Expr::col(file_fingerprint::Column::RefCount).add(1).into(),
        )
        .filter(file_fingerprint::Column::FileHash.eq(sha256))
        .exec(db)
        .await?;
    Ok(())
}

/// Atomically decrement the refcount of a fingerprint, floored at zero.
pub async fn decr_ref(db: &DatabaseConnection, sha256: &str) -> Result<(), DbErr> {
    file_fingerprint::Entity::update_many()
        .col_expr(
            file_fingerprint::Column::RefCount,
            Expr::col(file_fingerprint::Column::RefCount).sub(1).into(),
        )
        .filter(file_fingerprint::Column::FileHash.eq(sha256))
        .filter(file_fingerprint::Column::RefCount.gt(0))
        .exec(db)
        .await?;
    Ok(())
}

/// Best-effort pixel probe results.
#[derive(Debug, Default, Clone)]
pub struct PixelInfo {
    pub width: i32,
    pub height: i32,
    pub color_space: Option<String>,
    pub has_alpha: bool,
}

/// Decode the image far enough to read dimensions, colour model and alpha.
///
/// Failure is non-fatal: the record keeps zero dimensions and the upload
/// proceeds.
pub fn read_pixel_info(bytes: &[u8]) -> PixelInfo {
    use ::image::ColorType;

    match ::image::load_from_memory(bytes) {
        Ok(decoded) => {
            let color = decoded.color();
            let color_space = match color {
                ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => "GRAY",
                ColorType::Rgb8
                | ColorType::Rgb16
                | ColorType::Rgb32F
                | ColorType::Rgba8
                | ColorType::Rgba16
                | ColorType::Rgba32F => "RGB",
                _ => "OTHER",
            };
            PixelInfo {
                width: decoded.width() as i32,
                height: decoded.height() as i32,
                color_space: Some(color_space.to_string()),
                has_alpha: color.has_alpha(),
            }
        }
        Err(e) => {
            warn!(error = %e, "pixel dimension extraction failed");
            PixelInfo::default()
        }
    }
}

/// Descriptive columns of a new image record.
pub struct NewImage {
    pub original_name: String,
    pub storage_path: String,
    pub bucket_name: String,
    pub file_size: i64,
    pub width: i32,
    pub height: i32,
    pub format: Option<String>,
    pub mime_type: Option<String>,
    pub color_space: Option<String>,
    pub has_alpha: bool,
    pub sha256: String,
    pub md5: String,
}

/// Insert an image record in status `normal` and return it.
pub async fn insert_image(
    db: &DatabaseConnection,
    new_image: NewImage,
) -> Result<image::Model, AppError> {
    let now = Utc::now();
    let row = image::ActiveModel {
        image_uuid: Set(Uuid::new_v4().to_string()),
        file_hash: Set(new_image.sha256),
        file_md5: Set(new_image.md5),
        original_name: Set(new_image.original_name),
        storage_path: Set(new_image.storage_path),
        bucket_name: Set(new_image.bucket_name),
        file_size: Set(new_image.file_size),
        width: Set(new_image.width),
        height: Set(new_image.height),
        format: Set(new_image.format),
        mime_type: Set(new_image.mime_type),
        color_space: Set(new_image.color_space),
        has_alpha: Set(new_image.has_alpha),
        status: Set(image::ImageStatus::Normal),
        access_level: Set(image::AccessLevel::Public),
        view_count: Set(0),
        description: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    };

    let result = image::Entity::insert(row).exec(db).await?;
    image::Entity::find_by_id(result.last_insert_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::Internal("image record missing after insert".into()))
}

/// The commit tail: image record + fingerprint convergence + EXIF enqueue.
pub async fn commit_image(
    db: &DatabaseConnection,
    new_image: NewImage,
) -> Result<image::Model, AppError> {
    let fingerprint = Fingerprint {
        sha256: new_image.sha256.clone(),
        md5: new_image.md5.clone(),
        size: new_image.file_size as u64,
    };
    let storage_path = new_image.storage_path.clone();

    let model = insert_image(db, new_image).await?;
    upsert_fingerprint(db, &fingerprint, &storage_path).await?;
    enqueue_task(db, AsyncTaskType::ExifExtract, model.id, None).await?;

    Ok(model)
}

/// Append a background task row in status `pending`.
pub async fn enqueue_task(
    db: &DatabaseConnection,
    task_type: AsyncTaskType,
    image_id: i64,
    params: Option<String>,
) -> Result<(), DbErr> {
    let now = Utc::now();
    let row = async_task::ActiveModel {
        task_type: Set(task_type),
        image_id: Set(image_id),
        params: Set(params),
        status: Set(AsyncTaskStatus::Pending),
        retry_count: Set(0),
        max_retry: Set(3),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        executed_at: Set(None),
        ..Default::default()
    };
    async_task::Entity::insert(row)
        .exec_without_returning(db)
        .await?;
    debug!(task = ?task_type, image_id, "background task enqueued");
    Ok(())
}
