use crate::{
    auth::{Session, SessionUser},
    entities::{movimentacao, produto, profile, MovementKind},
    errors::ServiceError,
    forms::normalize_optional_string,
    services::product_catalog::{self, ProductCatalogService, ProductOption},
    stock,
};
use chrono::{DateTime, FixedOffset, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

pub const MOVEMENT_RECORDED: &str = "Movimentação registrada com sucesso!";

pub const MAX_LEDGER_LIMIT: u64 = 200;

/// A new ledger line as submitted by the movement form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct MovementPayload {
    pub produto_id: Uuid,
    #[serde(default)]
    pub tipo: MovementKind,
    #[validate(range(min = 1, message = "quantidade deve ser um inteiro positivo"))]
    #[schema(example = 5)]
    pub quantidade: i32,
    #[schema(example = "Reposição do fornecedor")]
    pub observacao: Option<String>,
}

impl MovementPayload {
    pub fn into_valid(self) -> Result<Self, ServiceError> {
        let payload = Self {
            observacao: normalize_optional_string(self.observacao),
            ..self
        };
        payload.validate()?;
        Ok(payload)
    }
}

/// Ledger line joined with product and user names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MovementView {
    pub id: Uuid,
    pub produto_id: Uuid,
    pub produto_nome: String,
    pub usuario_id: Uuid,
    pub usuario_nome: String,
    pub tipo: MovementKind,
    pub quantidade: i32,
    pub observacao: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `dd/mm/aaaa hh:mm:ss` in the reporting offset
    #[schema(example = "05/03/2024 10:07:09")]
    pub criado_em_formatado: String,
}

/// Result of recording a movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecordedMovement {
    pub movimentacao: MovementView,
    /// Product stock after the movement
    pub quantidade_estoque: i32,
}

/// Everything the movements screen needs in one response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LedgerScreen {
    pub produtos: Vec<ProductOption>,
    pub movimentacoes: Vec<MovementView>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MovementQuery {
    /// Number of movements (default 50, at most 200)
    pub limit: Option<u64>,
    /// Only movements created at or after this instant (RFC 3339). An
    /// unescaped `+` in the offset decodes to a space and is accepted as `+`.
    #[serde(default, deserialize_with = "deserialize_desde")]
    pub desde: Option<DateTime<Utc>>,
}

fn deserialize_desde<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    // A space past `yyyy-mm-ddThh:mm:ss` can only be a decoded `+` offset sign
    let mut value = raw.trim().to_string();
    if let Some(idx) = value.rfind(' ').filter(|idx| *idx >= 19) {
        value.replace_range(idx..=idx, "+");
    }

    DateTime::parse_from_rfc3339(&value)
        .map(|at| Some(at.with_timezone(&Utc)))
        .map_err(|err| serde::de::Error::custom(format!("desde: {err}")))
}

/// Append-only movement ledger and the stock adjustment that goes with it
#[derive(Clone)]
pub struct MovementLedgerService {
    db: Arc<DatabaseConnection>,
    catalog: ProductCatalogService,
    default_limit: u64,
    reporting_offset: FixedOffset,
}

impl MovementLedgerService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        catalog: ProductCatalogService,
        default_limit: u64,
        reporting_offset: FixedOffset,
    ) -> Self {
        Self {
            db,
            catalog,
            default_limit: default_limit.clamp(1, MAX_LEDGER_LIMIT),
            reporting_offset,
        }
    }

    pub fn effective_limit(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_LEDGER_LIMIT)
    }

    /// Product options and recent movements, fetched concurrently
    #[instrument(skip(self))]
    pub async fn ledger_screen(&self, query: MovementQuery) -> Result<LedgerScreen, ServiceError> {
        let (produtos, movimentacoes) =
            futures::try_join!(self.catalog.list_options(), self.list_movements(query))?;
        Ok(LedgerScreen {
            produtos,
            movimentacoes,
        })
    }

    /// Newest first, joined with product and user names
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        query: MovementQuery,
    ) -> Result<Vec<MovementView>, ServiceError> {
        let mut select =
            movimentacao::Entity::find().order_by_desc(movimentacao::Column::CreatedAt);
        if let Some(desde) = query.desde {
            select = select.filter(movimentacao::Column::CreatedAt.gte(desde));
        }

        let rows = select
            .limit(self.effective_limit(query.limit))
            .find_also_related(produto::Entity)
            .all(&*self.db)
            .await?;

        let user_ids: Vec<Uuid> = rows.iter().map(|(m, _)| m.usuario_id).collect();
        let names: HashMap<Uuid, String> = if user_ids.is_empty() {
            HashMap::new()
        } else {
            profile::Entity::find()
                .filter(profile::Column::Id.is_in(user_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| (p.id, p.nome))
                .collect()
        };

        Ok(rows
            .into_iter()
            .map(|(movement, product)| {
                let produto_nome = product.map(|p| p.nome).unwrap_or_default();
                let usuario_nome = names
                    .get(&movement.usuario_id)
                    .cloned()
                    .unwrap_or_else(|| crate::auth::FALLBACK_DISPLAY_NAME.to_string());
                self.view(movement, produto_nome, usuario_nome)
            })
            .collect())
    }

    /// Every movement created in `[since, until]`, unjoined
    #[instrument(skip(self))]
    pub async fn movements_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<movimentacao::Model>, ServiceError> {
        let movements = movimentacao::Entity::find()
            .filter(movimentacao::Column::CreatedAt.gte(since))
            .filter(movimentacao::Column::CreatedAt.lte(until))
            .all(&*self.db)
            .await?;
        Ok(movements)
    }

    /// Records a movement for the session user and adjusts stock in the same transaction.
    ///
    /// An outbound movement larger than the stock on hand is rejected and nothing is written.
    #[instrument(skip(self, session, payload))]
    pub async fn record_movement(
        &self,
        session: &Session,
        payload: MovementPayload,
    ) -> Result<RecordedMovement, ServiceError> {
        let user = session.require_user()?;
        let payload = payload.into_valid()?;

        let result = crate::tracing::with_metrics("movement.record", || {
            self.record_in_transaction(user, &payload)
        })
        .await;

        match &result {
            Ok(recorded) => {
                counter!("estoque.movements.recorded", 1, "tipo" => payload.tipo.to_string());
                info!(
                    movement_id = %recorded.movimentacao.id,
                    produto_id = %payload.produto_id,
                    tipo = %payload.tipo,
                    quantidade = payload.quantidade,
                    estoque = recorded.quantidade_estoque,
                    "movement recorded"
                );
            }
            Err(_) => {
                counter!("estoque.movements.rejected", 1, "tipo" => payload.tipo.to_string());
            }
        }

        result
    }

    async fn record_in_transaction(
        &self,
        user: &SessionUser,
        payload: &MovementPayload,
    ) -> Result<RecordedMovement, ServiceError> {
        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let product = produto::Entity::find_by_id(payload.produto_id)
            .one(&txn)
            .await?
            .ok_or_else(|| product_catalog::not_found(payload.produto_id))?;

        if stock::apply_movement(product.quantidade_estoque, payload.tipo, payload.quantidade)
            .is_none()
        {
            return Err(rejection(&product, payload));
        }

        let usuario_nome = upsert_profile(&txn, user).await?;
        adjust_stock(&txn, &product, payload).await?;

        let movement = movimentacao::ActiveModel {
            id: Set(Uuid::new_v4()),
            produto_id: Set(product.id),
            usuario_id: Set(user.user_id),
            tipo: Set(payload.tipo),
            quantidade: Set(payload.quantidade),
            observacao: Set(payload.observacao.clone()),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await?;

        let quantidade_estoque = produto::Entity::find_by_id(product.id)
            .one(&txn)
            .await?
            .map(|p| p.quantidade_estoque)
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "produto {} sumiu durante o registro da movimentação",
                    product.id
                ))
            })?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        Ok(RecordedMovement {
            movimentacao: self.view(movement, product.nome, usuario_nome),
            quantidade_estoque,
        })
    }

    fn view(
        &self,
        movement: movimentacao::Model,
        produto_nome: String,
        usuario_nome: String,
    ) -> MovementView {
        MovementView {
            id: movement.id,
            produto_id: movement.produto_id,
            produto_nome,
            usuario_id: movement.usuario_id,
            usuario_nome,
            tipo: movement.tipo,
            quantidade: movement.quantidade,
            observacao: movement.observacao,
            criado_em_formatado: stock::format_timestamp(movement.created_at, self.reporting_offset),
            created_at: movement.created_at,
        }
    }
}

/// Keeps the ledger join resolvable: the acting user always has a profile row
async fn upsert_profile(txn: &DatabaseTransaction, user: &SessionUser) -> Result<String, ServiceError> {
    let nome = user.display_name();
    profile::Entity::insert(profile::ActiveModel {
        id: Set(user.user_id),
        nome: Set(nome.clone()),
        created_at: Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::column(profile::Column::Id)
            .update_column(profile::Column::Nome)
            .to_owned(),
    )
    .exec_without_returning(txn)
    .await?;
    Ok(nome)
}

/// Conditional stock update: an outbound movement only applies while enough stock remains
async fn adjust_stock(
    txn: &DatabaseTransaction,
    product: &produto::Model,
    payload: &MovementPayload,
) -> Result<(), ServiceError> {
    let column = produto::Column::QuantidadeEstoque;
    let mut update = produto::Entity::update_many().filter(produto::Column::Id.eq(product.id));
    update = match payload.tipo {
        MovementKind::Entrada => update.col_expr(column, Expr::col(column).add(payload.quantidade)),
        MovementKind::Saida => update
            .col_expr(column, Expr::col(column).sub(payload.quantidade))
            .filter(column.gte(payload.quantidade)),
    };

    let result = update.exec(txn).await?;
    if result.rows_affected == 0 {
        return Err(rejection(product, payload));
    }
    Ok(())
}

fn rejection(product: &produto::Model, payload: &MovementPayload) -> ServiceError {
    match payload.tipo {
        MovementKind::Saida => {
            warn!(
                produto_id = %product.id,
                disponivel = product.quantidade_estoque,
                solicitado = payload.quantidade,
                "outbound movement exceeds stock"
            );
            ServiceError::InsufficientStock(format!(
                "Estoque insuficiente para \"{}\": disponível {}, solicitado {}",
                product.nome, product.quantidade_estoque, payload.quantidade
            ))
        }
        MovementKind::Entrada => ServiceError::ValidationError(format!(
            "quantidade excede o limite de estoque para \"{}\"",
            product.nome
        )),
    }
}
