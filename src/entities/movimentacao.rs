use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Direction of a stock movement
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    Display,
    EnumString,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MovementKind {
    /// Inbound: adds to stock
    #[default]
    #[sea_orm(string_value = "entrada")]
    Entrada,
    /// Outbound: subtracts from stock
    #[sea_orm(string_value = "saida")]
    Saida,
}

/// One immutable ledger line
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "movimentacoes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub produto_id: Uuid,
    pub usuario_id: Uuid,
    pub tipo: MovementKind,
    pub quantidade: i32,
    pub observacao: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::produto::Entity",
        from = "Column::ProdutoId",
        to = "super::produto::Column::Id"
    )]
    Produto,
    #[sea_orm(
        belongs_to = "super::profile::Entity",
        from = "Column::UsuarioId",
        to = "super::profile::Column::Id"
    )]
    Profile,
}

impl Related<super::produto::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Produto.def()
    }
}

impl Related<super::profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Profile.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
