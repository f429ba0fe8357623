use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tag")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    #[sea_orm(unique)]
    pub name: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub image_tags: HasMany<super::image_tag::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
