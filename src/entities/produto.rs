use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Catalog item with its current stock level and reorder threshold
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "produtos")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub nome: String,

    pub descricao: Option<String>,

    pub categoria: String,

    pub material: String,

    pub tamanho: Option<String>,

    /// Weight, free unit
    pub peso: Option<Decimal>,

    /// Current stock. Only movements change it after creation.
    pub quantidade_estoque: i32,

    /// Threshold below which the product is flagged on the dashboard
    pub estoque_minimo: i32,

    pub created_at: DateTime<Utc>,

    pub updated_at: Option<DateTime<Utc>>,
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

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if active_model.created_at.is_not_set() {
                active_model.created_at = Set(Utc::now());
            }
        } else {
            active_model.updated_at = Set(Some(Utc::now()));
        }

        Ok(active_model)
    }
}
