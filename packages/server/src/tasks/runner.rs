//! Periodic sweeps driving the background task table.
//!
//! Claiming is a quick status-update; execution is fire-and-forget on the
//! bounded worker pool so a slow task never stalls a sweep. Tests call the
//! batch functions directly instead of waiting on the timers.

use std::time::Duration;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, ExprTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tokio::time::{Instant, interval_at};
use tracing::{error, info, warn};

use crate::entity::async_task::{self, AsyncTaskStatus, AsyncTaskType};
use crate::entity::upload_task::{self, UploadTaskStatus};
use crate::state::AppState;
use crate::tasks::{exif, merge};

const ERROR_MESSAGE_LIMIT: usize = 500;

/// Spawn the pending, retry and upload-expiry sweeps.
pub fn spawn_sweeps(state: AppState) {
    let cfg = &state.config.tasks;
    info!(
        pending_secs = cfg.pending_sweep_secs,
        retry_secs = cfg.retry_sweep_secs,
        expiry_secs = cfg.expiry_sweep_secs,
        batch = cfg.batch_size,
        "starting background task sweeps"
    );

    {
        let state = state.clone();
        let initial = Duration::from_secs(state.config.tasks.pending_sweep_initial_secs);
        let period = Duration::from_secs(state.config.tasks.pending_sweep_secs);
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + initial, period);
            loop {
                interval.tick().await;
                if let Err(e) = process_pending_batch(&state).await {
                    error!(error = %e, "pending sweep failed");
                }
            }
        });
    }

    {
        let state = state.clone();
        let initial = Duration::from_secs(state.config.tasks.retry_sweep_initial_secs);
        let period = Duration::from_secs(state.config.tasks.retry_sweep_secs);
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + initial, period);
            loop {
                interval.tick().await;
                if let Err(e) = retry_failed_batch(&state).await {
                    error!(error = %e, "retry sweep failed");
                }
            }
        });
    }

    {
        let period = Duration::from_secs(state.config.tasks.expiry_sweep_secs);
        tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            loop {
                interval.tick().await;
                if let Err(e) = expire_stale_uploads(&state).await {
                    error!(error = %e, "upload expiry sweep failed");
                }
            }
        });
    }
}

/// Claim up to one batch of `pending` tasks and dispatch them.
pub async fn process_pending_batch(state: &AppState) -> Result<usize, DbErr> {
    let tasks = async_task::Entity::find()
        .filter(async_task::Column::Status.eq(AsyncTaskStatus::Pending))
        .order_by_asc(async_task::Column::Id)
        .limit(state.config.tasks.batch_size)
        .all(&state.db)
        .await?;

    if tasks.is_empty() {
        return Ok(0);
    }

    info!(count = tasks.len(), "processing pending background tasks");
    let n = tasks.len();
    for task in tasks {
        claim_and_dispatch(state, task).await?;
    }
    Ok(n)
}

/// Re-queue up to one batch of retryable `failed` tasks and dispatch them.
///
/// The selection filter excludes rows at the retry cap, making the cap a
/// terminal state: a task is attempted at most `max_retry + 1` times.
pub async fn retry_failed_batch(state: &AppState) -> Result<usize, DbErr> {
    let tasks = async_task::Entity::find()
        .filter(async_task::Column::Status.eq(AsyncTaskStatus::Failed))
        .filter(
            Expr::col(async_task::Column::RetryCount).lt(Expr::col(async_task::Column::MaxRetry)),
        )
        .order_by_asc(async_task::Column::Id)
        .limit(state.config.tasks.batch_size)
        .all(&state.db)
        .await?;

    if tasks.is_empty() {
        return Ok(0);
    }

    info!(count = tasks.len(), "retrying failed background tasks");
    let n = tasks.len();
    for task in tasks {
        let retry_count = task.retry_count + 1;
        let mut active: async_task::ActiveModel = task.clone().into();
        active.retry_count = Set(retry_count);
        active.status = Set(AsyncTaskStatus::Pending);
        active.updated_at = Set(Utc::now());
        let task = async_task::Entity::update(active).exec(&state.db).await?;

        claim_and_dispatch(state, task).await?;
    }
    Ok(n)
}

/// Mark `uploading` tasks past their deadline as `expired` and reclaim
/// their temp chunks.
pub async fn expire_stale_uploads(state: &AppState) -> Result<usize, DbErr> {
    let stale = upload_task::Entity::find()
        .filter(upload_task::Column::Status.eq(UploadTaskStatus::Uploading))
        .filter(upload_task::Column::ExpiresAt.lt(Utc::now()))
        .all(&state.db)
        .await?;

    if stale.is_empty() {
        return Ok(0);
    }

    info!(count = stale.len(), "expiring stale chunked uploads");
    let n = stale.len();
    for task in stale {
        let upload_id = task.upload_id.clone();
        let mut active: upload_task::ActiveModel = task.clone().into();
        active.status = Set(UploadTaskStatus::Expired);
        active.updated_at = Set(Utc::now());
        upload_task::Entity::update(active).exec(&state.db).await?;

        state.upload_locks.remove(&upload_id).await;

        let store = state.store.clone();
        let total = task.total_chunks as u32;
        tokio::spawn(async move {
            merge::cleanup_chunks(&*store, &upload_id, total).await;
        });
    }
    Ok(n)
}

/// Quick claim transaction, then fire-and-forget execution on the pool.
async fn claim_and_dispatch(state: &AppState, task: async_task::Model) -> Result<(), DbErr> {
    let now = Utc::now();
    let mut active: async_task::ActiveModel = task.clone().into();
    active.status = Set(AsyncTaskStatus::Processing);
    active.executed_at = Set(Some(now));
    active.updated_at = Set(now);
    async_task::Entity::update(active).exec(&state.db).await?;

    let job_state = state.clone();
    let (task_id, task_type, image_id) = (task.id, task.task_type, task.image_id);

    if state
        .pool
        .try_submit(async move {
            execute(job_state, task_id, task_type, image_id).await;
        })
        .is_err()
    {
        // Logged and returned to the queue, never silently dropped.
        warn!(task_id, "worker pool saturated, returning task to pending");
        finish(&state.db, task_id, AsyncTaskStatus::Pending, None).await;
    }

    Ok(())
}

async fn execute(state: AppState, task_id: i64, task_type: AsyncTaskType, image_id: i64) {
    let result = match task_type {
        AsyncTaskType::ExifExtract => exif::run_exif_extract(&state, image_id).await,
        AsyncTaskType::ThumbnailGenerate => {
            info!(image_id, "thumbnails are rendered by imgproxy on demand, skipping");
            Ok(())
        }
        AsyncTaskType::FormatConvert => {
            info!(image_id, "format conversion is handled by imgproxy on demand, skipping");
            Ok(())
        }
        AsyncTaskType::ImageHash => {
            info!(image_id, "perceptual hashing not implemented, skipping");
            Ok(())
        }
    };

    match result {
        Ok(()) => finish(&state.db, task_id, AsyncTaskStatus::Success, None).await,
        Err(message) => {
            error!(task_id, image_id, error = %message, "background task failed");
            let message = truncate(&message, ERROR_MESSAGE_LIMIT);
            finish(&state.db, task_id, AsyncTaskStatus::Failed, Some(message)).await;
        }
    }
}

async fn finish(
    db: &DatabaseConnection,
    task_id: i64,
    status: AsyncTaskStatus,
    error_message: Option<String>,
) {
    let result = async_task::Entity::update_many()
        .col_expr(async_task::Column::Status, Expr::value(status).into())
        .col_expr(
            async_task::Column::ErrorMessage,
            Expr::value(error_message).into(),
        )
        .col_expr(async_task::Column::UpdatedAt, Expr::value(Utc::now()).into())
        .filter(async_task::Column::Id.eq(task_id))
        .exec(db)
        .await;

    if let Err(e) = result {
        error!(task_id, error = %e, "task status update failed");
    }
}

fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        s.to_string()
    } else {
        let mut end = limit;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}
