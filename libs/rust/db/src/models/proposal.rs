use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "proposal")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub protocol: String,
    pub kind: String,
    pub vote_type: String,
    pub options: Json,
    pub date_added: DateTime,
    pub date_expiry: Option<DateTime>,
    pub date_executed: Option<DateTime>,
    pub vote_url: String,
    pub forum_url: String,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
