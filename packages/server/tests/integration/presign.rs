use serde_json::json;

use server::entity::async_task::AsyncTaskStatus;

use crate::common::TestApp;

#[tokio::test]
async fn mint_reserves_key_and_signs_put() {
    let app = TestApp::spawn().await;

    let res = app
        .post_json(
            "/api/v1/images/presigned-upload",
            json!({"fileName": "photo.png", "contentType": "image/png"}),
        )
        .await;

    assert_eq!(res.code(), 200);
    let data = res.data();
    let path = data["storagePath"].as_str().unwrap();
    assert!(path.starts_with("originals/"));
    assert!(path.ends_with(".png"));
    assert_eq!(data["expirySeconds"].as_u64().unwrap(), 3600);

    let url = data["uploadUrl"].as_str().unwrap();
    assert!(url.contains(path));
    assert!(url.contains("X-Amz-Expires=3600"));
}

#[tokio::test]
async fn mint_rejects_unsupported_extension() {
    let app = TestApp::spawn().await;

    let res = app
        .post_json(
            "/api/v1/images/presigned-upload",
            json!({"fileName": "document.pdf", "contentType": "application/pdf"}),
        )
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.code(), 400);
    assert!(res.body["message"]
        .as_str()
        .unwrap()
        .contains("Unsupported file format"));
}

#[tokio::test]
async fn confirm_commits_declared_metadata() {
    let app = TestApp::spawn().await;

    let minted = app
        .post_json(
            "/api/v1/images/presigned-upload",
            json!({"fileName": "photo.png", "contentType": "image/png"}),
        )
        .await;
    let path = minted.data()["storagePath"].as_str().unwrap().to_string();

    // The client PUT to the presigned URL happens outside the service;
    // simulate it by writing the object directly.
    app.state
        .store
        .put_bytes(&path, &[0x89], "image/png")
        .await
        .unwrap();

    let sha = "9b2c4b7a2eb0a1b6e6a9ad25a269c664d92b3b1d85e3fae7b1e35e1e53cbe3cb";
    let md5 = "0cc175b9c0f1b6a831c399e269772661";
    let res = app
        .post_json(
            "/api/v1/images/presigned-upload/confirm",
            json!({
                "storagePath": path,
                "originalName": "photo.png",
                "fileSize": 1,
                "contentType": "image/png",
                "fileHash": sha,
                "fileMd5": md5,
            }),
        )
        .await;

    assert_eq!(res.code(), 200);
    let data = res.data();
    assert_eq!(data["fileSize"].as_i64().unwrap(), 1);
    assert_eq!(data["fileHash"].as_str().unwrap(), sha);
    assert_eq!(data["storagePath"].as_str().unwrap(), path);
    assert_eq!(data["format"].as_str().unwrap(), "png");

    // Fingerprint is exactly the declared triple; nothing re-read the
    // object to second-guess the client.
    let fp = app.fingerprint(sha).await.unwrap();
    assert_eq!(fp.file_md5, md5);
    assert_eq!(fp.file_size, 1);
    assert_eq!(fp.ref_count, 1);

    // The commit tail enqueued an EXIF task in `pending`.
    let image_id = data["id"].as_i64().unwrap();
    let tasks = app.tasks_for_image(image_id).await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, AsyncTaskStatus::Pending);
}

#[tokio::test]
async fn confirm_requires_hashes() {
    let app = TestApp::spawn().await;

    let res = app
        .post_json(
            "/api/v1/images/presigned-upload/confirm",
            json!({
                "storagePath": "originals/2026/08/06/aa.png",
                "originalName": "photo.png",
                "fileSize": 1,
                "contentType": "image/png",
                "fileHash": "",
                "fileMd5": "",
            }),
        )
        .await;

    assert_eq!(res.code(), 400);
}
