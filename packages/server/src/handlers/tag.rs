use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr,
};
use tracing::instrument;

use crate::entity::image::{self, ImageStatus};
use crate::entity::{image_tag, tag};
use crate::error::AppError;
use crate::models::shared::{Envelope, PageQuery, PageResult};
use crate::models::tag::{AddTagsRequest, CreateTagRequest, TagResponse, UpdateTagRequest};
use crate::state::AppState;
use crate::utils::oplog;

#[utoipa::path(
    post,
    path = "/",
    tag = "Tags",
    operation_id = "createTag",
    responses((status = 200, description = "Envelope with the created tag")),
)]
#[instrument(skip(state))]
pub async fn create_tag(
    State(state): State<AppState>,
    Json(request): Json<CreateTagRequest>,
) -> Result<Json<Envelope<TagResponse>>, AppError> {
    let name = normalize_tag_name(&request.name)?;

    let row = tag::ActiveModel {
        name: Set(name.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let result = tag::Entity::insert(row)
        .exec(&state.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict(format!("Tag already exists: {name}"))
            }
            _ => AppError::from(e),
        })?;

    let model = tag::Entity::find_by_id(result.last_insert_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal("tag missing after insert".into()))?;

    state.caches.invalidate_tags();
    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    get,
    path = "/",
    tag = "Tags",
    operation_id = "listTags",
    responses((status = 200, description = "Envelope with all tags")),
)]
#[instrument(skip(state))]
pub async fn list_tags(
    State(state): State<AppState>,
) -> Result<Json<Envelope<Vec<TagResponse>>>, AppError> {
    if let Some(cached) = state.caches.tag_list.get("all") {
        return Ok(Json(Envelope::success(cached)));
    }

    let tags: Vec<TagResponse> = tag::Entity::find()
        .order_by_asc(tag::Column::Name)
        .all(&state.db)
        .await?
        .into_iter()
        .map(TagResponse::from)
        .collect();

    state.caches.tag_list.insert("all", tags.clone());
    Ok(Json(Envelope::success(tags)))
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Tags",
    operation_id = "getTag",
    params(("id" = i64, Path, description = "Tag ID")),
    responses((status = 200, description = "Envelope with the tag")),
)]
#[instrument(skip(state))]
pub async fn get_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<TagResponse>>, AppError> {
    let model = find_tag(&state, id).await?;
    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "Tags",
    operation_id = "updateTag",
    params(("id" = i64, Path, description = "Tag ID")),
    responses((status = 200, description = "Envelope with the renamed tag")),
)]
#[instrument(skip(state))]
pub async fn update_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateTagRequest>,
) -> Result<Json<Envelope<TagResponse>>, AppError> {
    let name = normalize_tag_name(&request.name)?;
    let model = find_tag(&state, id).await?;

    let mut active: tag::ActiveModel = model.into();
    active.name = Set(name.clone());
    let model = tag::Entity::update(active)
        .exec(&state.db)
        .await
        .map_err(|e| match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                AppError::Conflict(format!("Tag already exists: {name}"))
            }
            _ => AppError::from(e),
        })?;

    state.caches.invalidate_tags();
    Ok(Json(Envelope::success(model.into())))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Tags",
    operation_id = "deleteTag",
    params(("id" = i64, Path, description = "Tag ID")),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn delete_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Envelope<()>>, AppError> {
    find_tag(&state, id).await?;

    image_tag::Entity::delete_many()
        .filter(image_tag::Column::TagId.eq(id))
        .exec(&state.db)
        .await?;
    tag::Entity::delete_by_id(id).exec(&state.db).await?;

    state.caches.invalidate_tags();
    oplog::record(&state.db, "delete", "tag", id, None);
    Ok(Json(Envelope::success_empty()))
}

#[utoipa::path(
    get,
    path = "/{id}/images",
    tag = "Tags",
    operation_id = "listImagesByTag",
    params(("id" = i64, Path, description = "Tag ID"), PageQuery),
    responses((status = 200, description = "Envelope with a page of image IDs")),
)]
#[instrument(skip(state))]
pub async fn images_by_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(page_query): Query<PageQuery>,
) -> Result<Json<Envelope<PageResult<i64>>>, AppError> {
    find_tag(&state, id).await?;
    let (page, size) = page_query.normalized();

    let base = image_tag::Entity::find().filter(image_tag::Column::TagId.eq(id));
    let total = base.clone().count(&state.db).await?;
    let ids: Vec<i64> = base
        .order_by_asc(image_tag::Column::ImageId)
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

#[utoipa::path(
    post,
    path = "/{id}/tags",
    tag = "Tags",
    operation_id = "addTagsToImage",
    summary = "Attach tags to an image by name",
    description = "Missing tags are created on the fly; already-attached tags are no-ops.",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Envelope with the image's tags")),
)]
#[instrument(skip(state))]
pub async fn add_tags_to_image(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
    Json(request): Json<AddTagsRequest>,
) -> Result<Json<Envelope<Vec<TagResponse>>>, AppError> {
    find_visible_image(&state, image_id).await?;

    for name in &request.tag_names {
        let name = normalize_tag_name(name)?;
        let tag_id = find_or_create_tag(&state, &name).await?;
        attach_tag(&state, image_id, tag_id).await?;
    }

    state.caches.invalidate_tags();
    let tags = image_tags(&state, image_id).await?;
    Ok(Json(Envelope::success(tags)))
}

#[utoipa::path(
    get,
    path = "/{id}/tags",
    tag = "Tags",
    operation_id = "listImageTags",
    params(("id" = i64, Path, description = "Image ID")),
    responses((status = 200, description = "Envelope with the image's tags")),
)]
#[instrument(skip(state))]
pub async fn list_image_tags(
    State(state): State<AppState>,
    Path(image_id): Path<i64>,
) -> Result<Json<Envelope<Vec<TagResponse>>>, AppError> {
    find_visible_image(&state, image_id).await?;
    let tags = image_tags(&state, image_id).await?;
    Ok(Json(Envelope::success(tags)))
}

#[utoipa::path(
    delete,
    path = "/{id}/tags/{tag_id}",
    tag = "Tags",
    operation_id = "removeTagFromImage",
    params(
        ("id" = i64, Path, description = "Image ID"),
        ("tag_id" = i64, Path, description = "Tag ID"),
    ),
    responses((status = 200, description = "Empty success envelope")),
)]
#[instrument(skip(state))]
pub async fn remove_tag_from_image(
    State(state): State<AppState>,
    Path((image_id, tag_id)): Path<(i64, i64)>,
) -> Result<Json<Envelope<()>>, AppError> {
    image_tag::Entity::delete_many()
        .filter(image_tag::Column::ImageId.eq(image_id))
        .filter(image_tag::Column::TagId.eq(tag_id))
        .exec(&state.db)
        .await?;

    state.caches.invalidate_tags();
    Ok(Json(Envelope::success_empty()))
}

pub(crate) async fn find_or_create_tag(state: &AppState, name: &str) -> Result<i64, AppError> {
    if let Some(existing) = tag::Entity::find()
        .filter(tag::Column::Name.eq(name))
        .one(&state.db)
        .await?
    {
        return Ok(existing.id);
    }

    let row = tag::ActiveModel {
        name: Set(name.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    match tag::Entity::insert(row).exec(&state.db).await {
        Ok(result) => Ok(result.last_insert_id),
        // Lost the creation race; the winner's row is what we want.
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            tag::Entity::find()
                .filter(tag::Column::Name.eq(name))
                .one(&state.db)
                .await?
                .map(|t| t.id)
                .ok_or_else(|| AppError::Internal("tag vanished after conflict".into()))
        }
        Err(e) => Err(e.into()),
    }
}

pub(crate) async fn attach_tag(
    state: &AppState,
    image_id: i64,
    tag_id: i64,
) -> Result<(), AppError> {
    let row = image_tag::ActiveModel {
        image_id: Set(image_id),
        tag_id: Set(tag_id),
        created_at: Set(Utc::now()),
    };
    image_tag::Entity::insert(row)
        .on_conflict(
            sea_orm::sea_query::OnConflict::columns([
                image_tag::Column::ImageId,
                image_tag::Column::TagId,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec_without_returning(&state.db)
        .await?;
    Ok(())
}

async fn image_tags(state: &AppState, image_id: i64) -> Result<Vec<TagResponse>, AppError> {
    let tag_ids: Vec<i64> = image_tag::Entity::find()
        .filter(image_tag::Column::ImageId.eq(image_id))
        .all(&state.db)
        .await?
        .into_iter()
        .map(|row| row.tag_id)
        .collect();

    if tag_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(tag::Entity::find()
        .filter(tag::Column::Id.is_in(tag_ids))
        .order_by_asc(tag::Column::Name)
        .all(&state.db)
        .await?
        .into_iter()
        .map(TagResponse::from)
        .collect())
}

async fn find_tag(state: &AppState, id: i64) -> Result<tag::Model, AppError> {
    tag::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag not found: {id}")))
}

async fn find_visible_image(state: &AppState, id: i64) -> Result<image::Model, AppError> {
    image::Entity::find_by_id(id)
        .one(&state.db)
        .await?
        .filter(|m| m.status != ImageStatus::Deleted)
        .ok_or_else(|| AppError::NotFound(format!("Image not found: {id}")))
}

fn normalize_tag_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 64 {
        return Err(AppError::BadRequest(
            "Tag name must be 1-64 characters".into(),
        ));
    }
    Ok(name.to_string())
}
