use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};
use tracing::{info, instrument, warn};

use crate::entity::async_task::{self, AsyncTaskStatus};
use crate::entity::image::{self, ImageStatus};
use crate::entity::operation_log;
use crate::error::AppError;
use crate::extractors::auth::AdminUser;
use crate::handlers::tag::{attach_tag, find_or_create_tag};
use crate::models::admin::{
    BatchDeleteRequest, BatchTagRequest, LoginRequest, LoginResponse, StatsResponse,
    TaskStatsResponse,
};
use crate::models::image::ImageDetail;
use crate::models::shared::{Envelope, PageQuery, PageResult};
use crate::state::AppState;
use crate::utils::{admin_token, oplog};

#[utoipa::path(
    post,
    path = "/login",
    tag = "Admin",
    operation_id = "adminLogin",
    summary = "Exchange the admin password for a bearer token",
    responses(
        (status = 200, description = "Envelope with the token"),
        (status = 401, description = "Wrong password"),
    ),
)]
#[instrument(skip(state, request))]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, AppError> {
    let admin = &state.config.admin;
    if admin.password.is_empty() || admin.token_secret.is_empty() {
        warn!("admin login attempted but admin credentials are not configured");
        return Err(AppError::Unauthorized);
    }
    if request.password != admin.password {
        return Err(AppError::Unauthorized);
    }

    let token = admin_token::generate(&admin.token_secret, admin.token_expiry_hours);
    info!("admin login succeeded");
    Ok(Json(Envelope::success(LoginResponse {
        token,
        expires_in_hours: admin.token_expiry_hours,
    })))
}

#[utoipa::path(
    get,
    path = "/stats",
    tag = "Admin",
    operation_id = "adminStats",
    responses((status = 200, description = "Envelope with system statistics")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<StatsResponse>>, AppError> {
    let count_status = |status: ImageStatus| {
        image::Entity::find()
            .filter(image::Column::Status.eq(status))
            .count(&state.db)
    };
    let total_images = count_status(ImageStatus::Normal).await?;
    let deleted_images = count_status(ImageStatus::Deleted).await?;
    let reviewing_images = count_status(ImageStatus::Reviewing).await?;

    let total_storage: Option<i64> = image::Entity::find()
        .select_only()
        .column_as(image::Column::FileSize.sum(), "total")
        .filter(image::Column::Status.ne(ImageStatus::Deleted))
        .into_tuple()
        .one(&state.db)
        .await?
        .flatten();

    let today_start = Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight exists")
        .and_utc();
    let today_uploads = image::Entity::find()
        .filter(image::Column::CreatedAt.gte(today_start))
        .count(&state.db)
        .await?;

    let format_rows: Vec<(Option<String>, i64)> = image::Entity::find()
        .select_only()
        .column(image::Column::Format)
        .column_as(image::Column::Id.count(), "cnt")
        .filter(image::Column::Status.eq(ImageStatus::Normal))
        .group_by(image::Column::Format)
        .into_tuple()
        .all(&state.db)
        .await?;
    let format_distribution: BTreeMap<String, u64> = format_rows
        .into_iter()
        .map(|(format, count)| (format.unwrap_or_else(|| "unknown".into()), count as u64))
        .collect();

    Ok(Json(Envelope::success(StatsResponse {
        total_images,
        deleted_images,
        reviewing_images,
        total_storage: total_storage.unwrap_or(0),
        today_uploads,
        format_distribution,
    })))
}

#[utoipa::path(
    get,
    path = "/trash",
    tag = "Admin",
    operation_id = "adminListTrash",
    params(PageQuery),
    responses((status = 200, description = "Envelope with a page of soft-deleted images")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn list_trash(
    _admin: AdminUser,
    State(state): State<AppState>,
    Query(page_query): Query<PageQuery>,
) -> Result<Json<Envelope<PageResult<ImageDetail>>>, AppError> {
    let (page, size) = page_query.normalized();

    let base = image::Entity::find().filter(image::Column::Status.eq(ImageStatus::Deleted));
    let total = base.clone().count(&state.db).await?;
    let records: Vec<ImageDetail> = base
        .order_by_desc(image::Column::UpdatedAt)
        .offset(page_query.offset())
        .limit(size)
        .all(&state.db)
        .await?
        .iter()
        .map(ImageDetail::from_model)
        .collect();

    Ok(Json(Envelope::success(PageResult::of(
        records, total, page, size,
    ))))
}

#[utoipa::path(
    post,
    path = "/trash/{id}/restore",
    tag = "Admin",
    operation_id = "adminRestoreImage",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Empty success envelope")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn restore_image(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, AppError> {
    let model = image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {id}")))?;

    if model.status != ImageStatus::Deleted {
        return Err(AppError::BadRequest("Image is not in the trash".into()));
    }

    let mut active: image::ActiveModel = model.into();
    active.status = Set(ImageStatus::Normal);
    active.deleted_at = Set(None);
    active.updated_at = Set(Utc::now());
    image::Entity::update(active).exec(&state.db).await?;

    state.caches.invalidate_images();
    oplog::record(&state.db, "restore", "image", id, None);
    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    post,
    path = "/batch-delete",
    tag = "Admin",
    operation_id = "adminBatchDelete",
    summary = "Soft-delete a set of images",
    responses((status = 200, description = "Envelope with the number of images deleted")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn batch_delete(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(request): Json<BatchDeleteRequest>,
) -> Result<Json<Envelope<u64>>, AppError> {
    if request.ids.is_empty() {
        return Err(AppError::BadRequest("ids must not be empty".into()));
    }

    let now = Utc::now();
    let result = image::Entity::update_many()
        .col_expr(image::Column::Status, Expr::value(ImageStatus::Deleted).into())
        .col_expr(image::Column::DeletedAt, Expr::value(Some(now)).into())
        .col_expr(image::Column::UpdatedAt, Expr::value(now).into())
        .filter(image::Column::Id.is_in(request.ids.clone()))
        .filter(image::Column::Status.ne(ImageStatus::Deleted))
        .exec(&state.db)
        .await?;

    state.caches.invalidate_images();
    for id in request.ids {
        oplog::record(&state.db, "soft_delete", "image", id, Some("batch".into()));
    }
    Ok(Json(Envelope::success(result.rows_affected)))
}

#[utoipa::path(
    post,
    path = "/batch-tag",
    tag = "Admin",
    operation_id = "adminBatchTag",
    summary = "Attach tags to a set of images",
    responses((status = 200, description = "Empty success envelope")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn batch_tag(
    _admin: AdminUser,
    State(state): State<AppState>,
    Json(request): Json<BatchTagRequest>,
) -> Result<Json<Envelope<()>>, AppError> {
    if request.image_ids.is_empty() || request.tag_names.is_empty() {
        return Err(AppError::BadRequest(
            "imageIds and tagNames must not be empty".into(),
        ));
    }

    let mut tag_ids = Vec::with_capacity(request.tag_names.len());
    for name in &request.tag_names {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        tag_ids.push(find_or_create_tag(&state, name).await?);
    }

    let images = image::Entity::find()
        .filter(image::Column::Id.is_in(request.image_ids))
        .filter(image::Column::Status.ne(ImageStatus::Deleted))
        .all(&state.db)
        .await?;

    for img in &images {
        for &tag_id in &tag_ids {
            attach_tag(&state, img.id, tag_id).await?;
        }
    }

    state.caches.invalidate_tags();
    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    get,
    path = "/tasks/stats",
    tag = "Admin",
    operation_id = "adminTaskStats",
    responses((status = 200, description = "Envelope with per-status task counts")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn task_stats(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<TaskStatsResponse>>, AppError> {
    let mut counts = BTreeMap::new();
    for status in AsyncTaskStatus::ALL {
        let count = async_task::Entity::find()
            .filter(async_task::Column::Status.eq(*status))
            .count(&state.db)
            .await?;
        counts.insert(status.as_str().to_string(), count);
    }
    Ok(Json(Envelope::success(TaskStatsResponse { counts })))
}

#[utoipa::path(
    post,
    path = "/tasks/{id}/cancel",
    tag = "Admin",
    operation_id = "adminCancelTask",
    summary = "Cancel a pending or failed background task",
    params(("id" = i64, Path, description = "Task ID")),
    responses((status = 200, description = "Empty success envelope")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn cancel_task(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, AppError> {
    let task = async_task::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Task not found: {id}")))?;

    if !matches!(
        task.status,
        AsyncTaskStatus::Pending | AsyncTaskStatus::Failed
    ) {
        return Err(AppError::BadRequest(format!(
            "Task cannot be cancelled in status {:?}",
            task.status
        )));
    }

    let mut active: async_task::ActiveModel = task.into();
    active.status = Set(AsyncTaskStatus::Cancelled);
    active.updated_at = Set(Utc::now());
    async_task::Entity::update(active).exec(&state.db).await?;

    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    get,
    path = "/logs",
    tag = "Admin",
    operation_id = "adminRecentLogs",
    responses((status = 200, description = "Envelope with recent operation logs")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn recent_logs(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<operation_log::Model>>>, AppError> {
    let logs = operation_log::Entity::find()
        .order_by_desc(operation_log::Column::Id)
        .limit(50)
        .all(&state.db)
        .await?;
    Ok(Json(Envelope::success(logs)))
}

#[utoipa::path(
    get,
    path = "/logs/{target_type}/{target_id}",
    tag = "Admin",
    operation_id = "adminTargetLogs",
    params(
        ("target_type" = String, Path, description = "Target aggregate"),
        ("target_id" = i64, Path, description = "Target ID"),
        PageQuery,
    ),
    responses((status = 200, description = "Envelope with the target's operation logs")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn target_logs(
    _admin: AdminUser,
    State(state): State<AppState>,
    Path((target_type, target_id)): Path<(String, i64)>,
    Query(page_query): Query<PageQuery>,
) -> Result<Json<Envelope<PageResult<operation_log::Model>>>, AppError> {
    let (page, size) = page_query.normalized();

    let base = operation_log::Entity::find()
        .filter(operation_log::Column::TargetType.eq(&target_type))
        .filter(operation_log::Column::TargetId.eq(target_id));
    let total = base.clone().count(&state.db).await?;
    let records = base
        .order_by_desc(operation_log::Column::Id)
        .offset(page_query.offset())
        .limit(size)
        .all(&state.db)
        .await?;

    Ok(Json(Envelope::success(PageResult::of(
        records, total, page, size,
    ))))
}

/// Expired uploads are also visible to admins for debugging; this is the
/// manual trigger for the sweep the scheduler runs periodically.
#[utoipa::path(
    post,
    path = "/uploads/expire",
    tag = "Admin",
    operation_id = "adminExpireUploads",
    responses((status = 200, description = "Envelope with the number of uploads expired")),
    security(("admin_token" = [])),
)]
#[instrument(skip(state, _admin))]
pub async fn expire_uploads(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Envelope<usize>>, AppError> {
    let expired = crate::tasks::runner::expire_stale_uploads(&state).await?;
    Ok(Json(Envelope::success(expired)))
}
