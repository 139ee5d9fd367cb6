use sea_orm::entity::prelude::*;

/// A movie node. All detail columns are nullable so a row can survive as a
/// bare-id stub after the retention sweep strips it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub title: Option<String>,
    pub overview: Option<String>,
    pub duration: Option<i32>,
    pub poster_path: Option<String>,
    pub official_trailer: Option<String>,
    pub original_language: Option<String>,
    pub release_date: Option<String>,
    pub status: Option<String>,
    pub updated_at: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
