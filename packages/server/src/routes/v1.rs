use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::handlers;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/images", image_routes())
        .nest("/tags", tag_routes())
        .nest("/albums", album_routes())
        .nest("/admin", admin_routes())
}

fn image_routes() -> Router<AppState> {
    let uploads = Router::new()
        .route("/upload", post(handlers::image::upload))
        .route("/batch-upload", post(handlers::image::batch_upload))
        .route(
            "/chunk-upload/{upload_id}/{chunk_number}",
            post(handlers::upload::chunk_put),
        )
        .layer(handlers::image::upload_body_limit());

    let rest = Router::new()
        .route("/", get(handlers::image::list))
        .route(
            "/{id}",
            get(handlers::image::get_by_id).delete(handlers::image::soft_delete),
        )
        .route("/uuid/{uuid}", get(handlers::image::get_by_uuid))
        .route("/{id}/download-url", get(handlers::image::download_url))
        .route("/{id}/process-url", get(handlers::image::process_url))
        .route("/{id}/process", get(handlers::image::process_redirect))
        .route("/{id}/permanent", delete(handlers::image::hard_delete))
        .route(
            "/{id}/tags",
            get(handlers::tag::list_image_tags).post(handlers::tag::add_tags_to_image),
        )
        .route(
            "/{id}/tags/{tag_id}",
            delete(handlers::tag::remove_tag_from_image),
        )
        .route("/instant-upload", post(handlers::upload::instant_upload))
        .route("/presigned-upload", post(handlers::upload::presign_upload))
        .route(
            "/presigned-upload/confirm",
            post(handlers::upload::confirm_presigned_upload),
        )
        .route("/chunk-upload/init", post(handlers::upload::chunk_init))
        .route(
            "/chunk-upload/{upload_id}/progress",
            get(handlers::upload::chunk_progress),
        );

    uploads.merge(rest)
}

fn tag_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::tag::list_tags).post(handlers::tag::create_tag),
        )
        .route(
            "/{id}",
            get(handlers::tag::get_tag)
                .patch(handlers::tag::update_tag)
                .delete(handlers::tag::delete_tag),
        )
        .route("/{id}/images", get(handlers::tag::images_by_tag))
}

fn album_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::album::list_albums).post(handlers::album::create_album),
        )
        .route(
            "/{id}",
            get(handlers::album::get_album)
                .patch(handlers::album::update_album)
                .delete(handlers::album::delete_album),
        )
        .route("/{id}/images", get(handlers::album::album_images))
        .route(
            "/{id}/images/{image_id}",
            post(handlers::album::add_image).delete(handlers::album::remove_image),
        )
        .route("/{id}/cover", put(handlers::album::set_cover))
}

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(handlers::admin::login))
        .route("/stats", get(handlers::admin::stats))
        .route("/trash", get(handlers::admin::list_trash))
        .route("/trash/{id}/restore", post(handlers::admin::restore_image))
        .route("/batch-delete", post(handlers::admin::batch_delete))
        .route("/batch-tag", post(handlers::admin::batch_tag))
        .route("/tasks/stats", get(handlers::admin::task_stats))
        .route("/tasks/{id}/cancel", post(handlers::admin::cancel_task))
        .route("/uploads/expire", post(handlers::admin::expire_uploads))
        .route("/logs", get(handlers::admin::recent_logs))
        .route(
            "/logs/{target_type}/{target_id}",
            get(handlers::admin::target_logs),
        )
}