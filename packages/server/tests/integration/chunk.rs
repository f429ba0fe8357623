use serde_json::json;

use server::entity::upload_task::UploadTaskStatus;

use crate::common::{JPEG_STUB, TestApp};

/// The three 4-byte chunks of the scenario file: a JPEG header followed by
/// opaque payload. Merged content must start with valid magic bytes.
fn chunks() -> [Vec<u8>; 3] {
    [JPEG_STUB.to_vec(), b"ABCD".to_vec(), b"EFGH".to_vec()]
}

fn merged() -> Vec<u8> {
    chunks().concat()
}

async fn init_upload(app: &TestApp) -> (String, u32) {
    let res = app
        .post_json(
            "/api/v1/images/chunk-upload/init",
            json!({
                "fileName": "big.jpg",
                "fileSize": 12,
                "chunkSize": 4,
            }),
        )
        .await;
    assert_eq!(res.code(), 200);
    let upload_id = res.data()["uploadId"].as_str().unwrap().to_string();
    let total = res.data()["totalChunks"].as_u64().unwrap() as u32;
    assert_eq!(total, 3);
    assert_eq!(res.data()["chunkSize"].as_u64().unwrap(), 4);
    assert!(res.data()["uploadedChunks"].as_array().unwrap().is_empty());
    (upload_id, total)
}

#[tokio::test]
async fn out_of_order_with_duplicate_merges_once() {
    let app = TestApp::spawn().await;
    let (upload_id, _) = init_upload(&app).await;
    let parts = chunks();

    // Chunk 2, then 3, then 2 again (idempotent no-op), then 1.
    let r2 = app.put_chunk(&upload_id, 2, parts[1].clone()).await;
    assert_eq!(r2.code(), 200);
    assert_eq!(r2.data()["allUploaded"].as_bool().unwrap(), false);

    let r3 = app.put_chunk(&upload_id, 3, parts[2].clone()).await;
    assert_eq!(r3.data()["allUploaded"].as_bool().unwrap(), false);

    let progress = app
        .get(&format!("/api/v1/images/chunk-upload/{upload_id}/progress"))
        .await;
    let received: Vec<u64> = progress.data()["uploadedChunks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_u64().unwrap())
        .collect();
    assert_eq!(received, vec![2, 3]);

    let dup = app.put_chunk(&upload_id, 2, parts[1].clone()).await;
    assert_eq!(dup.code(), 200);
    assert_eq!(dup.data()["success"].as_bool().unwrap(), true);
    assert_eq!(dup.data()["allUploaded"].as_bool().unwrap(), false);

    let r1 = app.put_chunk(&upload_id, 1, parts[0].clone()).await;
    assert_eq!(r1.data()["allUploaded"].as_bool().unwrap(), true);

    let task = app
        .wait_for_upload_status(&upload_id, UploadTaskStatus::Completed)
        .await;

    // The committed object equals chunks 1||2||3.
    let stored = app.state.store.get_bytes(&task.storage_path).await.unwrap();
    assert_eq!(stored, merged());

    // Exactly one image record was produced by the merge. SHA-256 of the
    // 12 merged bytes, pinned.
    let merged_sha = "ff0b57a64ee543dae13602da83d5b639a32d60aaba637f1c40ffb2cf82930371";
    assert_eq!(app.image_count_by_hash(merged_sha).await, 1);
    let row = app.fingerprint(merged_sha).await.unwrap();
    assert_eq!(row.ref_count, 1);
    assert_eq!(row.storage_path, task.storage_path);
}

#[tokio::test]
async fn sequential_upload_commits_identical_record() {
    let app = TestApp::spawn().await;
    let (upload_id, total) = init_upload(&app).await;
    let parts = chunks();

    for k in 1..=total {
        let res = app.put_chunk(&upload_id, k, parts[(k - 1) as usize].clone()).await;
        assert_eq!(res.code(), 200);
        assert_eq!(
            res.data()["allUploaded"].as_bool().unwrap(),
            k == total,
            "allUploaded must flip on the final chunk only"
        );
    }

    let task = app
        .wait_for_upload_status(&upload_id, UploadTaskStatus::Completed)
        .await;
    let stored = app.state.store.get_bytes(&task.storage_path).await.unwrap();
    assert_eq!(stored, merged());
}

#[tokio::test]
async fn chunk_index_bounds_are_enforced() {
    let app = TestApp::spawn().await;
    let (upload_id, total) = init_upload(&app).await;

    let zero = app.put_chunk(&upload_id, 0, b"XXXX".to_vec()).await;
    assert_eq!(zero.code(), 400);

    let over = app.put_chunk(&upload_id, total + 1, b"XXXX".to_vec()).await;
    assert_eq!(over.code(), 400);
}

#[tokio::test]
async fn unknown_upload_id_is_not_found() {
    let app = TestApp::spawn().await;
    let res = app.put_chunk("nope", 1, b"XXXX".to_vec()).await;
    assert_eq!(res.code(), 404);

    let progress = app.get("/api/v1/images/chunk-upload/nope/progress").await;
    assert_eq!(progress.code(), 404);
}

#[tokio::test]
async fn garbage_merge_fails_the_task() {
    let app = TestApp::spawn().await;

    let res = app
        .post_json(
            "/api/v1/images/chunk-upload/init",
            json!({
                "fileName": "junk.jpg",
                "fileSize": 8,
                "chunkSize": 4,
            }),
        )
        .await;
    let upload_id = res.data()["uploadId"].as_str().unwrap().to_string();

    // Neither chunk starts with image magic; the merged head fails
    // validation and the task lands in `failed`.
    app.put_chunk(&upload_id, 1, b"JUNK".to_vec()).await;
    app.put_chunk(&upload_id, 2, b"DATA".to_vec()).await;

    let task = app
        .wait_for_upload_status(&upload_id, UploadTaskStatus::Failed)
        .await;
    // The final key was never written.
    assert!(app.state.store.get(&task.storage_path).await.is_err());
}

#[tokio::test]
async fn init_validates_size() {
    let app = TestApp::spawn().await;

    let zero = app
        .post_json(
            "/api/v1/images/chunk-upload/init",
            json!({"fileName": "x.jpg", "fileSize": 0}),
        )
        .await;
    assert_eq!(zero.code(), 400);

    let over = app
        .post_json(
            "/api/v1/images/chunk-upload/init",
            json!({"fileName": "x.jpg", "fileSize": 60 * 1024 * 1024 * 1024u64}),
        )
        .await;
    assert_eq!(over.code(), 400);
}

#[tokio::test]
async fn chunks_after_completion_are_rejected() {
    let app = TestApp::spawn().await;
    let (upload_id, total) = init_upload(&app).await;
    let parts = chunks();

    for k in 1..=total {
        app.put_chunk(&upload_id, k, parts[(k - 1) as usize].clone())
            .await;
    }
    app.wait_for_upload_status(&upload_id, UploadTaskStatus::Completed)
        .await;

    let late = app.put_chunk(&upload_id, 1, parts[0].clone()).await;
    assert_eq!(late.code(), 400);
}
