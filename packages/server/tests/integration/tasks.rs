use server::entity::async_task::{AsyncTaskStatus, AsyncTaskType};
use server::ingest;
use server::tasks::runner;

use crate::common::{JPEG_STUB, TestApp};

mod exif_pipeline {
    use super::*;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    use server::entity::image_metadata;

    #[tokio::test]
    async fn pending_sweep_extracts_exif_for_uploads() {
        let app = TestApp::spawn().await;
        let uploaded = app.upload("t.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
        let image_id = uploaded.data()["id"].as_i64().unwrap();

        let task_id = app.tasks_for_image(image_id).await[0].id;
        let claimed = runner::process_pending_batch(&app.state).await.unwrap();
        assert_eq!(claimed, 1);

        let task = app.wait_for_task_settled(task_id).await;
        // The stub has no EXIF payload; that is success with an empty
        // metadata row, not a failure.
        assert_eq!(task.status, AsyncTaskStatus::Success);
        assert!(task.executed_at.is_some());

        let metadata = image_metadata::Entity::find()
            .filter(image_metadata::Column::ImageId.eq(image_id))
            .one(&app.state.db)
            .await
            .unwrap()
            .expect("metadata row");
        assert_eq!(metadata.raw_exif.as_deref(), Some("{}"));
        assert!(metadata.camera_make.is_none());
    }

    #[tokio::test]
    async fn recognised_noop_kinds_succeed() {
        let app = TestApp::spawn().await;
        let uploaded = app.upload("t.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
        let image_id = uploaded.data()["id"].as_i64().unwrap();

        ingest::enqueue_task(
            &app.state.db,
            AsyncTaskType::ThumbnailGenerate,
            image_id,
            None,
        )
        .await
        .unwrap();
        ingest::enqueue_task(&app.state.db, AsyncTaskType::ImageHash, image_id, None)
            .await
            .unwrap();

        runner::process_pending_batch(&app.state).await.unwrap();

        for task in app.tasks_for_image(image_id).await {
            let settled = app.wait_for_task_settled(task.id).await;
            assert_eq!(settled.status, AsyncTaskStatus::Success);
        }
    }
}

mod retry_ceiling {
    use super::*;

    /// Scenario: an EXIF task whose execution always fails (missing image).
    /// Initial attempt plus three retries, then the retry sweep must stop
    /// selecting it.
    #[tokio::test]
    async fn failed_task_is_retried_to_the_cap_and_no_further() {
        let app = TestApp::spawn().await;

        // No image 999999 exists, so execution errors every time.
        ingest::enqueue_task(&app.state.db, AsyncTaskType::ExifExtract, 999_999, None)
            .await
            .unwrap();
        let task_id = {
            let tasks = app.tasks_for_image(999_999).await;
            assert_eq!(tasks.len(), 1);
            tasks[0].id
        };

        // Initial attempt.
        runner::process_pending_batch(&app.state).await.unwrap();
        let task = app.wait_for_task_settled(task_id).await;
        assert_eq!(task.status, AsyncTaskStatus::Failed);
        assert_eq!(task.retry_count, 0);
        assert!(task.error_message.as_deref().unwrap().contains("not found"));

        // Three retry sweeps, each incrementing the count and failing again.
        for expected_retry in 1..=3 {
            let retried = runner::retry_failed_batch(&app.state).await.unwrap();
            assert_eq!(retried, 1, "retry sweep {expected_retry} must claim the task");

            let task = app.wait_for_task_settled(task_id).await;
            assert_eq!(task.status, AsyncTaskStatus::Failed);
            assert_eq!(task.retry_count, expected_retry);
        }

        // At the cap the selection filter excludes the row for good.
        let retried = runner::retry_failed_batch(&app.state).await.unwrap();
        assert_eq!(retried, 0);

        let task = app.task(task_id).await;
        assert_eq!(task.status, AsyncTaskStatus::Failed);
        assert_eq!(task.retry_count, 3);
    }

    #[tokio::test]
    async fn pending_sweep_ignores_failed_tasks() {
        let app = TestApp::spawn().await;

        ingest::enqueue_task(&app.state.db, AsyncTaskType::ExifExtract, 999_999, None)
            .await
            .unwrap();
        runner::process_pending_batch(&app.state).await.unwrap();
        let task_id = app.tasks_for_image(999_999).await[0].id;
        app.wait_for_task_settled(task_id).await;

        // A failed task belongs to the retry sweep, not the pending sweep.
        let claimed = runner::process_pending_batch(&app.state).await.unwrap();
        assert_eq!(claimed, 0);
    }

    #[tokio::test]
    async fn cancelled_tasks_are_never_selected() {
        let app = TestApp::spawn().await;

        ingest::enqueue_task(&app.state.db, AsyncTaskType::ExifExtract, 999_999, None)
            .await
            .unwrap();
        let task_id = app.tasks_for_image(999_999).await[0].id;

        let res = app
            .post_admin(
                &format!("/api/v1/admin/tasks/{task_id}/cancel"),
                serde_json::json!({}),
            )
            .await;
        assert_eq!(res.code(), 200);

        assert_eq!(runner::process_pending_batch(&app.state).await.unwrap(), 0);
        assert_eq!(runner::retry_failed_batch(&app.state).await.unwrap(), 0);
        assert_eq!(app.task(task_id).await.status, AsyncTaskStatus::Cancelled);
    }
}

mod upload_expiry {
    use super::*;
    use chrono::{Duration, Utc};
    use sea_orm::{ActiveModelTrait, Set};
    use serde_json::json;
    use server::entity::upload_task::{self, UploadTaskStatus};

    #[tokio::test]
    async fn stale_uploading_tasks_expire_and_chunks_are_reclaimed() {
        let app = TestApp::spawn().await;

        let res = app
            .post_json(
                "/api/v1/images/chunk-upload/init",
                json!({"fileName": "slow.jpg", "fileSize": 8, "chunkSize": 4}),
            )
            .await;
        let upload_id = res.data()["uploadId"].as_str().unwrap().to_string();
        app.put_chunk(&upload_id, 1, b"AAAA".to_vec()).await;

        // Backdate the deadline.
        let task = app.upload_task(&upload_id).await;
        let mut active: upload_task::ActiveModel = task.into();
        active.expires_at = Set(Utc::now() - Duration::hours(1));
        active.update(&app.state.db).await.unwrap();

        let expired = runner::expire_stale_uploads(&app.state).await.unwrap();
        assert_eq!(expired, 1);
        assert_eq!(
            app.upload_task(&upload_id).await.status,
            UploadTaskStatus::Expired
        );

        // Chunk deletion is async and best-effort; poll briefly.
        let key = common::storage::chunk_key(&upload_id, 1);
        for _ in 0..100 {
            if app.state.store.get(&key).await.is_err() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(app.state.store.get(&key).await.is_err());

        // Expired tasks accept no further chunks.
        let late = app.put_chunk(&upload_id, 2, b"BBBB".to_vec()).await;
        assert_eq!(late.code(), 400);
    }

    #[tokio::test]
    async fn fresh_uploads_are_not_expired() {
        let app = TestApp::spawn().await;
        let res = app
            .post_json(
                "/api/v1/images/chunk-upload/init",
                json!({"fileName": "fresh.jpg", "fileSize": 8, "chunkSize": 4}),
            )
            .await;
        let upload_id = res.data()["uploadId"].as_str().unwrap().to_string();

        assert_eq!(runner::expire_stale_uploads(&app.state).await.unwrap(), 0);
        assert_eq!(
            app.upload_task(&upload_id).await.status,
            UploadTaskStatus::Uploading
        );
    }
}
