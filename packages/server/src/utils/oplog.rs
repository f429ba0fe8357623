//! Fire-and-forget operation audit logging.

use chrono::Utc;
use sea_orm::{DatabaseConnection, EntityTrait, Set};
use tracing::warn;

use crate::entity::operation_log;

/// Append an operation log row without blocking the request path.
///
/// Failures are logged and swallowed; the audit channel must never fail the
/// primary operation.
pub fn record(
    db: &DatabaseConnection,
    operation_type: &str,
    target_type: &str,
    target_id: i64,
    detail: Option<String>,
) {
    let db = db.clone();
    let operation_type = operation_type.to_string();
    let target_type = target_type.to_string();

    tokio::spawn(async move {
        let row = operation_log::ActiveModel {
            operation_type: Set(operation_type.clone()),
            target_type: Set(target_type),
            target_id: Set(target_id),
            detail: Set(detail),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = operation_log::Entity::insert(row).exec(&db).await {
            warn!(operation = %operation_type, target_id, error = %e, "operation log append failed");
        }
    });
}
