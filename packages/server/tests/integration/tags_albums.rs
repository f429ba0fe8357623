use serde_json::json;

use crate::common::{JPEG_STUB, TestApp};

async fn upload_image(app: &TestApp) -> i64 {
    let res = app.upload("t.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
    res.data()["id"].as_i64().unwrap()
}

mod tags {
    use super::*;

    #[tokio::test]
    async fn crud_round_trip() {
        let app = TestApp::spawn().await;

        let created = app
            .post_json("/api/v1/tags/", json!({"name": "vacation"}))
            .await;
        assert_eq!(created.code(), 200);
        let id = created.data()["id"].as_i64().unwrap();
        assert_eq!(created.data()["name"].as_str().unwrap(), "vacation");

        let listed = app.get("/api/v1/tags/").await;
        assert_eq!(listed.data().as_array().unwrap().len(), 1);

        let fetched = app.get(&format!("/api/v1/tags/{id}")).await;
        assert_eq!(fetched.data()["name"].as_str().unwrap(), "vacation");

        let client = &app.client;
        let renamed = client
            .patch(format!("{}/api/v1/tags/{id}", app.base_url))
            .json(&json!({"name": "travel"}))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        assert_eq!(renamed["data"]["name"].as_str().unwrap(), "travel");

        let deleted = app.delete(&format!("/api/v1/tags/{id}")).await;
        assert_eq!(deleted.code(), 200);
        let missing = app.get(&format!("/api/v1/tags/{id}")).await;
        assert_eq!(missing.code(), 404);
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let app = TestApp::spawn().await;
        app.post_json("/api/v1/tags/", json!({"name": "dup"})).await;

        let res = app.post_json("/api/v1/tags/", json!({"name": "dup"})).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.code(), 409);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let app = TestApp::spawn().await;
        let res = app.post_json("/api/v1/tags/", json!({"name": "   "})).await;
        assert_eq!(res.code(), 400);
    }

    #[tokio::test]
    async fn attach_by_name_creates_missing_tags() {
        let app = TestApp::spawn().await;
        let image_id = upload_image(&app).await;

        let res = app
            .post_json(
                &format!("/api/v1/images/{image_id}/tags"),
                json!({"tagNames": ["sunset", "beach"]}),
            )
            .await;
        assert_eq!(res.code(), 200);
        let names: Vec<&str> = res
            .data()
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["beach", "sunset"]);

        // Attaching again is a no-op, not an error.
        let again = app
            .post_json(
                &format!("/api/v1/images/{image_id}/tags"),
                json!({"tagNames": ["sunset"]}),
            )
            .await;
        assert_eq!(again.code(), 200);
        assert_eq!(again.data().as_array().unwrap().len(), 2);

        // Paged image ids by tag.
        let tag_id = res.data()[0]["id"].as_i64().unwrap();
        let by_tag = app.get(&format!("/api/v1/tags/{tag_id}/images")).await;
        assert_eq!(by_tag.data()["total"].as_u64().unwrap(), 1);
        assert_eq!(by_tag.data()["records"][0].as_i64().unwrap(), image_id);
    }

    #[tokio::test]
    async fn detach_removes_the_association() {
        let app = TestApp::spawn().await;
        let image_id = upload_image(&app).await;
        let attached = app
            .post_json(
                &format!("/api/v1/images/{image_id}/tags"),
                json!({"tagNames": ["only"]}),
            )
            .await;
        let tag_id = attached.data()[0]["id"].as_i64().unwrap();

        let res = app
            .delete(&format!("/api/v1/images/{image_id}/tags/{tag_id}"))
            .await;
        assert_eq!(res.code(), 200);

        let tags = app.get(&format!("/api/v1/images/{image_id}/tags")).await;
        assert!(tags.data().as_array().unwrap().is_empty());
    }
}

mod albums {
    use super::*;

    #[tokio::test]
    async fn crud_and_membership() {
        let app = TestApp::spawn().await;
        let image_id = upload_image(&app).await;

        let created = app
            .post_json(
                "/api/v1/albums/",
                json!({"name": "Summer", "description": "2026"}),
            )
            .await;
        assert_eq!(created.code(), 200);
        let album_id = created.data()["id"].as_i64().unwrap();

        let added = app
            .post_json(
                &format!("/api/v1/albums/{album_id}/images/{image_id}"),
                json!({}),
            )
            .await;
        assert_eq!(added.code(), 200);

        let images = app.get(&format!("/api/v1/albums/{album_id}/images")).await;
        assert_eq!(images.data()["total"].as_u64().unwrap(), 1);
        assert_eq!(images.data()["records"][0].as_i64().unwrap(), image_id);

        let listed = app.get("/api/v1/albums/").await;
        assert_eq!(listed.data()["total"].as_u64().unwrap(), 1);
    }

    #[tokio::test]
    async fn cover_must_be_a_member_and_clears_on_removal() {
        let app = TestApp::spawn().await;
        let image_id = upload_image(&app).await;
        let album = app
            .post_json("/api/v1/albums/", json!({"name": "Covers"}))
            .await;
        let album_id = album.data()["id"].as_i64().unwrap();

        // Not a member yet.
        let premature = app
            .client
            .put(format!("{}/api/v1/albums/{album_id}/cover", app.base_url))
            .json(&json!({"imageId": image_id}))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        assert_eq!(premature["code"].as_i64().unwrap(), 400);

        app.post_json(
            &format!("/api/v1/albums/{album_id}/images/{image_id}"),
            json!({}),
        )
        .await;

        let set = app
            .client
            .put(format!("{}/api/v1/albums/{album_id}/cover", app.base_url))
            .json(&json!({"imageId": image_id}))
            .send()
            .await
            .unwrap()
            .json::<serde_json::Value>()
            .await
            .unwrap();
        assert_eq!(set["data"]["coverImageId"].as_i64().unwrap(), image_id);

        // Removing the cover image from the album clears the cover.
        app.delete(&format!("/api/v1/albums/{album_id}/images/{image_id}"))
            .await;
        let fetched = app.get(&format!("/api/v1/albums/{album_id}")).await;
        assert!(fetched.data()["coverImageId"].is_null());
    }

    #[tokio::test]
    async fn delete_album_keeps_images() {
        let app = TestApp::spawn().await;
        let image_id = upload_image(&app).await;
        let album = app
            .post_json("/api/v1/albums/", json!({"name": "Doomed"}))
            .await;
        let album_id = album.data()["id"].as_i64().unwrap();
        app.post_json(
            &format!("/api/v1/albums/{album_id}/images/{image_id}"),
            json!({}),
        )
        .await;

        let deleted = app.delete(&format!("/api/v1/albums/{album_id}")).await;
        assert_eq!(deleted.code(), 200);

        let missing = app.get(&format!("/api/v1/albums/{album_id}")).await;
        assert_eq!(missing.code(), 404);

        // The image itself is untouched.
        let detail = app.get(&format!("/api/v1/images/{image_id}")).await;
        assert_eq!(detail.code(), 200);
    }
}
