use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::instrument;

use crate::entity::image::{self, ImageStatus};
use crate::entity::{album, album_image};
use crate::error::AppError;
use crate::models::album::{
    AlbumResponse, CreateAlbumRequest, SetCoverRequest, UpdateAlbumRequest,
};
use crate::models::shared::{Envelope, PageQuery, PageResult};
use crate::state::AppState;
use crate::utils::oplog;

#[utoipa::path(
    post,
    path = "/",
    tag = "Albums",
    operation_id = "createAlbum",
    responses((status = 200, description = "Envelope with the created album")),
)]
#[instrument(skip(state))]
pub async fn create_album(
    State(state): State<AppState>,
    Json(request): Json<CreateAlbumRequest>,
) -> Result<Json<Envelope<AlbumResponse>>, AppError> {
    let name = normalize_album_name(&request.name)?;

    let now = Utc::now();
    let row = album::ActiveModel {
        name: Set(name),
        description: Set(request.description),
        cover_image_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let result = album::Entity::insert(row).exec(&state.db).await?;
    let model = album::Entity::find_by_id(result.last_insert_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal("album missing after insert".into()))?;

    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Albums",
    operation_id = "listAlbums",
    params(PageQuery),
    responses((status = 200, description = "Envelope with a page of albums")),
)]
#[instrument(skip(state))]
pub async fn list_albums(
    State(state): State<AppState>,
    Query(page_query): Query<PageQuery>,
) -> Result<Json<Envelope<PageResult<AlbumResponse>>>, AppError> {
    let (page, size) = page_query.normalized();

    let total = album::Entity::find().count(&state.db).await?;
    if total == 0 {
        return Ok(Json(Envelope::success(PageResult::empty(page, size))));
    }

    let records: Vec<AlbumResponse> = album::Entity::find()
        .order_by_desc(album::Column::CreatedAt)
        .offset(page_query.offset())
        .limit(size)
        .all(&state.db)
        .await?
        .into_iter()
        .map(AlbumResponse::from)
        .collect();

    Ok(Json(Envelope::success(PageResult::of(
        records, total, page, size,
    ))))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Albums",
    operation_id = "getAlbum",
    params(("id" = i64, Path, description = "Album ID")),
    responses((status = 200, description = "Envelope with the album")),
)]
#[instrument(skip(state))]
pub async fn get_album(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<AlbumResponse>>, AppError> {
    let model = find_album(&state, id).await?;
    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Albums",
    operation_id = "updateAlbum",
    params(("id" = i64, Path, description = "Album ID")),
    responses((status = 200, description = "Envelope with the updated album")),
)]
#[instrument(skip(state))]
pub async fn update_album(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAlbumRequest>,
) -> Result<Json<Envelope<AlbumResponse>>, AppError> {
    let model = find_album(&state, id).await?;

    let mut active: album::ActiveModel = model.into();
    if let Some(name) = request.name {
        active.name = Set(normalize_album_name(&name)?);
    }
    if let Some(description) = request.description {
        active.description = Set(Some(description));
    }
    active.updated_at = Set(Utc::now());
    let model = album::Entity::update(active).exec(&state.db).await?;

    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Albums",
    operation_id = "deleteAlbum",
    description = "Deletes the album and its memberships; images themselves are untouched.",
    params(("id" = i64, Path, description = "Album ID")),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn delete_album(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, AppError> {
    find_album(&state, id).await?;

    album_image::Entity::delete_many()
        .filter(album_image::Column::AlbumId.eq(id))
        .exec(&state.db)
        .await?;
    album::Entity::delete_by_id(id).exec(&state.db).await?;

    oplog::record(&state.db, "delete", "album", id, None);
    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    post,
    path = "/{id}/images/{image_id}",
    tag = "Albums",
    operation_id = "addImageToAlbum",
    params(
        ("id" = i64, Path, description = "Album ID"),
        ("image_id" = i64, Path, description = "Image ID"),
    ),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn add_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i64, i64)>,
) -> Result<Json<Envelope<()>>, AppError> {
    find_album(&state, id).await?;
    find_visible_image(&state, image_id).await?;

    let row = album_image::ActiveModel {
        album_id: Set(id),
        image_id: Set(image_id),
        added_at: Set(Utc::now()),
    };
    album_image::Entity::insert(row)
        .on_conflict(
            sea_orm::sea_query::OnConflict::columns([
                album_image::Column::AlbumId,
                album_image::Column::ImageId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await?;

    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    delete,
    path = "/{id}/images/{image_id}",
    tag = "Albums",
    operation_id = "removeImageFromAlbum",
    description = "Removes the membership; an image that was the cover clears the cover.",
    params(
        ("id" = i64, Path, description = "Album ID"),
        ("image_id" = i64, Path, description = "Image ID"),
    ),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn remove_image(
    State(state): State<AppState>,
    Path((id, image_id)): Path<(i64, i64)>,
) -> Result<Json<Envelope<()>>, AppError> {
    let album = find_album(&state, id).await?;

    album_image::Entity::delete_many()
        .filter(album_image::Column::AlbumId.eq(id))
        .filter(album_image::Column::ImageId.eq(image_id))
        .exec(&state.db)
        .await?;

    if album.cover_image_id == Some(image_id) {
        let mut active: album::ActiveModel = album.into();
        active.cover_image_id = Set(None);
        active.updated_at = Set(Utc::now());
        album::Entity::update(active).exec(&state.db).await?;
    }

    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    put,
    path = "/{id}/cover",
    tag = "Albums",
    operation_id = "setAlbumCover",
    params(("id" = i64, Path, description = "Album ID")),
    responses((status = 200, description = "Envelope with the updated album")),
)]
#[instrument(skip(state))]
pub async fn set_cover(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<SetCoverRequest>,
) -> Result<Json<Envelope<AlbumResponse>>, AppError> {
    let album = find_album(&state, id).await?;

    let is_member = album_image::Entity::find()
        .filter(album_image::Column::AlbumId.eq(id))
        .filter(album_image::Column::ImageId.eq(request.image_id))
        .one(&state.db)
        .await?
        .is_some();
    if !is_member {
        return Err(AppError::BadRequest(
            "Cover image must be a member of the album".into(),
        ));
    }

    let mut active: album::ActiveModel = album.into();
    active.cover_image_id = Set(Some(request.image_id));
    active.updated_at = Set(Utc::now());
    let model = album::Entity::update(active).exec(&state.db).await?;

    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    get,
    path = "/{id}/images",
    tag = "Albums",
    operation_id = "listAlbumImages",
    params(("id" = i64, Path, description = "Album ID"), PageQuery),
    responses((status = 200, description = "Envelope with a page of image IDs")),
)]
#[instrument(skip(state))]
pub async fn album_images(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page_query): Query<PageQuery>,
) -> Result<Json<Envelope<PageResult<i64>>>, AppError> {
    find_album(&state, id).await?;
    let (page, size) = page_query.normalized();

    let base = album_image::Entity::find().filter(album_image::Column::AlbumId.eq(id));
    let total = base.clone().count(&state.db).await?;
    let ids: Vec<i64> = base
        .order_by_asc(album_image::Column::AddedAt)
        .offset(page_query.offset())
        .limit(size)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|row| row.image_id)
        .collect();

    Ok(Json(Envelope::success(PageResult::of(
        ids, total, page, size,
    ))))
}

async fn find_album(state: &AppState, id: i64) -> Result<album::Model, AppError> {
    album::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Album not found: {id}")))
}

async fn find_visible_image(state: &AppState, id: i64) -> Result<image::Model, AppError> {
    image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .filter(|m| m.status != ImageStatus::Deleted)
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {id}")))
}

fn normalize_album_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 128 {
        return Err(AppError::BadRequest(
            "Album name must be 1-128 characters".into(),
        ));
    }
    Ok(name.to_string())
}
