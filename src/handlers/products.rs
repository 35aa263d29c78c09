use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::common::{created_response, map_service_error, success_message_response, success_response};
use crate::auth::Session;
use crate::errors::{ApiError, ServiceError};
use crate::services::product_catalog::{
    Confirmation, ProductOption, ProductPayload, ProductView, PRODUCT_CREATED, PRODUCT_DELETED,
    PRODUCT_UPDATED,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    /// `id,nome` projects each product to its selection-control shape
    pub fields: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeleteProductQuery {
    /// Must be `true` for the delete to run
    #[serde(default)]
    pub confirm: bool,
}

/// Full products, or only `{id, nome}` when projected
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ProductListing {
    Full(Vec<ProductView>),
    Options(Vec<ProductOption>),
}

fn wants_options(fields: Option<&str>) -> Result<bool, ServiceError> {
    let Some(raw) = fields.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(false);
    };

    let requested: BTreeSet<&str> = raw.split(',').map(str::trim).collect();
    let projection: BTreeSet<&str> = ["id", "nome"].into_iter().collect();
    if requested == projection {
        Ok(true)
    } else {
        Err(ServiceError::ValidationError(format!(
            "fields: projeção não suportada \"{raw}\"; use \"id,nome\""
        )))
    }
}

/// List products ordered by name
#[utoipa::path(
    get,
    path = "/api/v1/produtos",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products listed", body = crate::ApiResponse<ProductListing>),
        (status = 400, description = "Unsupported projection", body = crate::errors::ErrorResponse)
    ),
    tag = "Produtos"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let catalog = &state.services.product_catalog;

    let listing = if wants_options(query.fields.as_deref())? {
        ProductListing::Options(catalog.list_options().await.map_err(map_service_error)?)
    } else {
        let products = catalog.list_products().await.map_err(map_service_error)?;
        ProductListing::Full(products.into_iter().map(ProductView::from).collect())
    };

    Ok(success_response(listing))
}

/// Create a product; stock starts at zero
#[utoipa::path(
    post,
    path = "/api/v1/produtos",
    request_body = ProductPayload,
    responses(
        (status = 201, description = "Product created", body = crate::ApiResponse<ProductView>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Produtos"
)]
pub async fn create_product(
    session: Session,
    State(state): State<AppState>,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .product_catalog
        .create_product(&session, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(ProductView::from(product), PRODUCT_CREATED))
}

/// Replace a product's editable fields
#[utoipa::path(
    put,
    path = "/api/v1/produtos/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = ProductPayload,
    responses(
        (status = 200, description = "Product updated", body = crate::ApiResponse<ProductView>),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Produtos"
)]
pub async fn update_product(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ProductPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state
        .services
        .product_catalog
        .update_product(&session, id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_message_response(ProductView::from(product), PRODUCT_UPDATED))
}

/// Delete a product. Requires `confirm=true`.
#[utoipa::path(
    delete,
    path = "/api/v1/produtos/{id}",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        DeleteProductQuery
    ),
    responses(
        (status = 200, description = "Product deleted", body = crate::ApiResponse<serde_json::Value>),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product has movements", body = crate::errors::ErrorResponse),
        (status = 428, description = "Confirmation missing", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Produtos"
)]
pub async fn delete_product(
    session: Session,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteProductQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .services
        .product_catalog
        .delete_product(&session, id, Confirmation::from(query.confirm))
        .await
        .map_err(map_service_error)?;

    Ok(success_message_response(
        serde_json::json!({ "id": id }),
        PRODUCT_DELETED,
    ))
}
