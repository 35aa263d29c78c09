use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display profile of a user who has recorded movements
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub nome: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movimentacao::Entity")]
    Movimentacoes,
}

impl Related<super::movimentacao::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movimentacoes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
