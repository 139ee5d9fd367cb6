use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tmdb_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub user_id: String,
    pub session: String,
    pub include_adult: bool,
    #[sea_orm(column_name = "iso_3166_1")]
    pub iso_3166_1: String,
    #[sea_orm(column_name = "iso_639_1")]
    pub iso_639_1: String,
    pub username: String,
    pub name: String,
    pub updated_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
