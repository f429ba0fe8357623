use serde_json::json;

use crate::common::{ADMIN_PASSWORD, JPEG_STUB, TestApp};

mod auth {
    use super::*;

    #[tokio::test]
    async fn login_issues_a_working_token() {
        let app = TestApp::spawn().await;

        let res = app
            .post_json("/api/v1/admin/login", json!({"password": ADMIN_PASSWORD}))
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.code(), 200);
        let token = res.data()["token"].as_str().unwrap().to_string();
        assert_eq!(res.data()["expiresInHours"].as_u64().unwrap(), 24);

        let stats = app
            .client
            .get(format!("{}/api/v1/admin/stats", app.base_url))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(stats.status().as_u16(), 200);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let app = TestApp::spawn().await;
        let res = app
            .post_json("/api/v1/admin/login", json!({"password": "nope"}))
            .await;
        assert_eq!(res.status, 401);
        assert_eq!(res.code(), 401);
    }

    #[tokio::test]
    async fn admin_routes_reject_missing_and_bad_tokens() {
        let app = TestApp::spawn().await;

        let missing = app
            .client
            .get(format!("{}/api/v1/admin/stats", app.base_url))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 401);

        let forged = app
            .client
            .get(format!("{}/api/v1/admin/stats", app.base_url))
            .bearer_auth("aaaa.bbbb")
            .send()
            .await
            .unwrap();
        assert_eq!(forged.status().as_u16(), 403);
    }
}

mod stats_and_trash {
    use super::*;

    #[tokio::test]
    async fn stats_count_by_status_and_format() {
        let app = TestApp::spawn().await;
        app.upload("a.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
        let second = app.upload("b.png", png.to_vec(), "image/png").await;
        let second_id = second.data()["id"].as_i64().unwrap();
        app.delete(&format!("/api/v1/images/{second_id}")).await;

        let res = app.get_admin("/api/v1/admin/stats").await;
        assert_eq!(res.code(), 200);
        let data = res.data();
        assert_eq!(data["totalImages"].as_u64().unwrap(), 1);
        assert_eq!(data["deletedImages"].as_u64().unwrap(), 1);
        assert_eq!(data["todayUploads"].as_u64().unwrap(), 2);
        assert_eq!(data["totalStorage"].as_i64().unwrap(), 4);
        assert_eq!(data["formatDistribution"]["jpeg"].as_u64().unwrap(), 1);
    }

    #[tokio::test]
    async fn trash_lists_and_restores() {
        let app = TestApp::spawn().await;
        let uploaded = app.upload("t.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
        let id = uploaded.data()["id"].as_i64().unwrap();
        app.delete(&format!("/api/v1/images/{id}")).await;

        let trash = app.get_admin("/api/v1/admin/trash").await;
        assert_eq!(trash.data()["total"].as_u64().unwrap(), 1);
        assert_eq!(
            trash.data()["records"][0]["id"].as_i64().unwrap(),
            id
        );

        let restored = app
            .post_admin(&format!("/api/v1/admin/trash/{id}/restore"), json!({}))
            .await;
        assert_eq!(restored.code(), 200);

        // Back to visible.
        let detail = app.get(&format!("/api/v1/images/{id}")).await;
        assert_eq!(detail.code(), 200);
        assert_eq!(detail.data()["status"].as_i64().unwrap(), 1);

        // Restoring a non-deleted image is a bad request.
        let again = app
            .post_admin(&format!("/api/v1/admin/trash/{id}/restore"), json!({}))
            .await;
        assert_eq!(again.code(), 400);
    }

    #[tokio::test]
    async fn batch_delete_soft_deletes_all_given() {
        let app = TestApp::spawn().await;
        let a = app.upload("a.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
        let b = app.upload("b.png", png.to_vec(), "image/png").await;
        let ids = vec![
            a.data()["id"].as_i64().unwrap(),
            b.data()["id"].as_i64().unwrap(),
        ];

        let res = app
            .post_admin("/api/v1/admin/batch-delete", json!({"ids": ids}))
            .await;
        assert_eq!(res.code(), 200);
        assert_eq!(res.data().as_u64().unwrap(), 2);

        let listed = app.get("/api/v1/images/").await;
        assert_eq!(listed.data()["total"].as_u64().unwrap(), 0);
    }
}

mod task_admin {
    use super::*;

    #[tokio::test]
    async fn task_stats_expose_all_states() {
        let app = TestApp::spawn().await;
        app.upload("t.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;

        let res = app.get_admin("/api/v1/admin/tasks/stats").await;
        assert_eq!(res.code(), 200);
        let counts = &res.data()["counts"];
        assert_eq!(counts["pending"].as_u64().unwrap(), 1);
        assert_eq!(counts["success"].as_u64().unwrap(), 0);
        assert_eq!(counts["cancelled"].as_u64().unwrap(), 0);
    }
}

mod logs_and_health {
    use super::*;

    #[tokio::test]
    async fn operations_show_up_in_logs() {
        let app = TestApp::spawn().await;
        let uploaded = app.upload("t.jpg", JPEG_STUB.to_vec(), "image/jpeg").await;
        let id = uploaded.data()["id"].as_i64().unwrap();
        app.delete(&format!("/api/v1/images/{id}")).await;

        // The append is fire-and-forget; give it a beat.
        let mut operations: Vec<String> = Vec::new();
        for _ in 0..100 {
            let res = app.get_admin("/api/v1/admin/logs").await;
            operations = res
                .data()
                .as_array()
                .unwrap()
                .iter()
                .map(|log| log["operation_type"].as_str().unwrap().to_string())
                .collect();
            if operations.len() >= 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(operations.contains(&"upload".to_string()));
        assert!(operations.contains(&"soft_delete".to_string()));

        let target = app
            .get_admin(&format!("/api/v1/admin/logs/image/{id}"))
            .await;
        assert!(target.data()["total"].as_u64().unwrap() >= 2);
    }

    #[tokio::test]
    async fn health_reports_dependencies() {
        let app = TestApp::spawn().await;
        let res = app.get("/health").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["status"].as_str().unwrap(), "ok");
        assert_eq!(res.body["database"].as_bool().unwrap(), true);
        assert_eq!(res.body["storage"].as_bool().unwrap(), true);
    }
}
