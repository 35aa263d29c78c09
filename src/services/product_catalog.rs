use crate::{
    auth::Session,
    entities::{movimentacao, produto},
    errors::ServiceError,
    forms::{normalize_optional_string, normalize_string},
    stock,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

pub const PRODUCT_CREATED: &str = "Produto cadastrado com sucesso!";
pub const PRODUCT_UPDATED: &str = "Produto atualizado com sucesso!";
pub const PRODUCT_DELETED: &str = "Produto excluído com sucesso!";
pub const DELETE_PROMPT: &str = "Deseja realmente excluir este produto?";

/// Default reorder threshold offered by the product form
pub const DEFAULT_ESTOQUE_MINIMO: i32 = 10;

fn validate_non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("peso não pode ser negativo".into());
        return Err(err);
    }
    Ok(())
}

/// Editable product fields, shared by create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductPayload {
    #[validate(length(min = 1, max = 255, message = "nome é obrigatório (até 255 caracteres)"))]
    #[schema(example = "Furadeira de impacto")]
    pub nome: String,
    #[schema(example = "Furadeira 650W com maleta")]
    pub descricao: Option<String>,
    #[validate(length(min = 1, max = 120, message = "categoria é obrigatória"))]
    #[schema(example = "Ferramentas elétricas")]
    pub categoria: String,
    #[validate(length(min = 1, max = 120, message = "material é obrigatório"))]
    #[schema(example = "Plástico ABS")]
    pub material: String,
    #[schema(example = "M")]
    pub tamanho: Option<String>,
    #[validate(custom = "validate_non_negative_decimal")]
    #[schema(value_type = Option<String>, example = "1.8")]
    pub peso: Option<Decimal>,
    #[validate(range(min = 0, message = "estoque_minimo não pode ser negativo"))]
    #[schema(example = 10)]
    pub estoque_minimo: i32,
}

impl ProductPayload {
    /// Trims text; empty optional text becomes `None`
    pub fn normalized(self) -> Self {
        Self {
            nome: normalize_string(self.nome),
            descricao: normalize_optional_string(self.descricao),
            categoria: normalize_string(self.categoria),
            material: normalize_string(self.material),
            tamanho: normalize_optional_string(self.tamanho),
            peso: self.peso,
            estoque_minimo: self.estoque_minimo,
        }
    }

    /// Normalizes then validates; the value every write path stores
    pub fn into_valid(self) -> Result<Self, ServiceError> {
        let payload = self.normalized();
        payload.validate()?;
        Ok(payload)
    }
}

/// Product as rendered by the catalog screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: Uuid,
    pub nome: String,
    pub descricao: Option<String>,
    pub categoria: String,
    pub material: String,
    pub tamanho: Option<String>,
    #[schema(value_type = Option<String>)]
    pub peso: Option<Decimal>,
    pub quantidade_estoque: i32,
    pub estoque_minimo: i32,
    /// `quantidade_estoque < estoque_minimo`
    pub abaixo_minimo: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<produto::Model> for ProductView {
    fn from(model: produto::Model) -> Self {
        let abaixo_minimo = stock::is_below_minimum(&model);
        Self {
            id: model.id,
            nome: model.nome,
            descricao: model.descricao,
            categoria: model.categoria,
            material: model.material,
            tamanho: model.tamanho,
            peso: model.peso,
            quantidade_estoque: model.quantidade_estoque,
            estoque_minimo: model.estoque_minimo,
            abaixo_minimo,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Selection-control shape of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct ProductOption {
    pub id: Uuid,
    pub nome: String,
}

/// Second step of an irreversible delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Pending,
}

impl From<bool> for Confirmation {
    fn from(confirmed: bool) -> Self {
        if confirmed {
            Confirmation::Confirmed
        } else {
            Confirmation::Pending
        }
    }
}

/// Product catalog: list, create, update and confirmed delete
#[derive(Clone)]
pub struct ProductCatalogService {
    db: Arc<DatabaseConnection>,
}

impl ProductCatalogService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// All products ordered by name
    #[instrument(skip(self))]
    pub async fn list_products(&self) -> Result<Vec<produto::Model>, ServiceError> {
        let products = produto::Entity::find()
            .order_by_asc(produto::Column::Nome)
            .all(&*self.db)
            .await?;
        Ok(products)
    }

    /// `id` and `nome` only, ordered by name
    #[instrument(skip(self))]
    pub async fn list_options(&self) -> Result<Vec<ProductOption>, ServiceError> {
        let options = produto::Entity::find()
            .select_only()
            .column(produto::Column::Id)
            .column(produto::Column::Nome)
            .order_by_asc(produto::Column::Nome)
            .into_model::<ProductOption>()
            .all(&*self.db)
            .await?;
        Ok(options)
    }

    #[instrument(skip(self, session, payload))]
    pub async fn create_product(
        &self,
        session: &Session,
        payload: ProductPayload,
    ) -> Result<produto::Model, ServiceError> {
        let user = session.require_user()?;
        let payload = payload.into_valid()?;

        let product = produto::ActiveModel {
            id: Set(Uuid::new_v4()),
            nome: Set(payload.nome),
            descricao: Set(payload.descricao),
            categoria: Set(payload.categoria),
            material: Set(payload.material),
            tamanho: Set(payload.tamanho),
            peso: Set(payload.peso),
            quantidade_estoque: Set(0),
            estoque_minimo: Set(payload.estoque_minimo),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        let product = product.insert(&*self.db).await.map_err(|e| {
            error!("Failed to insert product: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product.id, user_id = %user.user_id, "product created");
        Ok(product)
    }

    /// Replaces every editable field. Stock is left as is.
    #[instrument(skip(self, session, payload))]
    pub async fn update_product(
        &self,
        session: &Session,
        id: Uuid,
        payload: ProductPayload,
    ) -> Result<produto::Model, ServiceError> {
        let user = session.require_user()?;
        let payload = payload.into_valid()?;

        let existing = produto::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found(id))?;

        let mut active: produto::ActiveModel = existing.into();
        active.nome = Set(payload.nome);
        active.descricao = Set(payload.descricao);
        active.categoria = Set(payload.categoria);
        active.material = Set(payload.material);
        active.tamanho = Set(payload.tamanho);
        active.peso = Set(payload.peso);
        active.estoque_minimo = Set(payload.estoque_minimo);

        let product = active.update(&*self.db).await?;

        info!(product_id = %id, user_id = %user.user_id, "product updated");
        Ok(product)
    }

    /// Deletes a product once the caller has confirmed.
    ///
    /// Products with ledger history are kept: the ledger is append-only.
    #[instrument(skip(self, session))]
    pub async fn delete_product(
        &self,
        session: &Session,
        id: Uuid,
        confirmation: Confirmation,
    ) -> Result<(), ServiceError> {
        let user = session.require_user()?;
        if confirmation != Confirmation::Confirmed {
            return Err(ServiceError::ConfirmationRequired(DELETE_PROMPT.to_string()));
        }

        let txn = self.db.begin().await.map_err(|e| {
            error!("Failed to begin transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        let product = produto::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found(id))?;

        let history = movimentacao::Entity::find()
            .filter(movimentacao::Column::ProdutoId.eq(id))
            .count(&txn)
            .await?;
        if history > 0 {
            warn!(product_id = %id, movements = history, "refusing to delete product with movements");
            return Err(ServiceError::Conflict(format!(
                "Produto \"{}\" possui {} movimentação(ões) registrada(s) e não pode ser excluído",
                product.nome, history
            )));
        }

        produto::Entity::delete_by_id(id).exec(&txn).await?;

        txn.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            ServiceError::DatabaseError(e)
        })?;

        counter!("estoque.products.deleted", 1);
        info!(product_id = %id, user_id = %user.user_id, "product deleted");
        Ok(())
    }
}

pub(crate) fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Produto {id} não encontrado"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn payload() -> ProductPayload {
        ProductPayload {
            nome: "  Martelo  ".into(),
            descricao: Some("   ".into()),
            categoria: " Ferramentas ".into(),
            material: "Aço".into(),
            tamanho: Some("".into()),
            peso: Some(dec!(0.5)),
            estoque_minimo: 10,
        }
    }

    #[test]
    fn normalization_trims_and_clears_empty_optionals() {
        let normalized = payload().normalized();
        assert_eq!(normalized.nome, "Martelo");
        assert_eq!(normalized.categoria, "Ferramentas");
        assert_eq!(normalized.descricao, None);
        assert_eq!(normalized.tamanho, None);
        assert_eq!(normalized.peso, Some(dec!(0.5)));
    }

    #[test]
    fn blank_required_text_is_rejected_after_trimming() {
        let mut p = payload();
        p.nome = "    ".into();
        assert_matches!(p.into_valid(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn negative_numbers_are_rejected() {
        let mut p = payload();
        p.peso = Some(dec!(-1));
        assert_matches!(p.into_valid(), Err(ServiceError::ValidationError(_)));

        let mut p = payload();
        p.estoque_minimo = -1;
        assert_matches!(p.into_valid(), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn confirmation_from_flag() {
        assert_eq!(Confirmation::from(true), Confirmation::Confirmed);
        assert_eq!(Confirmation::from(false), Confirmation::Pending);
    }

    #[tokio::test]
    async fn anonymous_writes_fail_before_touching_the_store() {
        let db = Arc::new(crate::test_support::memory_db().await);
        let service = ProductCatalogService::new(db);

        assert_matches!(
            service.create_product(&Session::Anonymous, payload()).await,
            Err(ServiceError::Unauthenticated(_))
        );
        assert_matches!(
            service
                .delete_product(&Session::Anonymous, Uuid::new_v4(), Confirmation::Confirmed)
                .await,
            Err(ServiceError::Unauthenticated(_))
        );
        assert!(service.list_products().await.unwrap().is_empty());
    }
}
