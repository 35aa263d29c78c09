use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Estoque API",
        version = "0.1.0",
        description = r#"
# Sistema de Estoque

Product catalog with minimum-stock thresholds, an append-only movement ledger
and a dashboard summary.

## Authentication

Reads accept anonymous callers. Every write needs a bearer token issued by the
identity provider:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

```json
{
  "error": "Unprocessable Entity",
  "message": "Insufficient stock: ...",
  "request_id": "…",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Produtos", description = "Product catalog"),
        (name = "Movimentações", description = "Stock movement ledger"),
        (name = "Dashboard", description = "Stock alerts and monthly totals"),
        (name = "Auth", description = "Current session and sign-out")
    ),
    paths(
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,
        crate::handlers::movements::ledger_screen,
        crate::handlers::movements::record_movement,
        crate::handlers::dashboard::dashboard_summary,
        crate::handlers::auth::current_session,
        crate::handlers::auth::sign_out,
    ),
    components(
        schemas(
            crate::entities::MovementKind,
            crate::services::product_catalog::ProductPayload,
            crate::services::product_catalog::ProductView,
            crate::services::product_catalog::ProductOption,
            crate::handlers::products::ProductListing,
            crate::services::movement_ledger::MovementPayload,
            crate::services::movement_ledger::MovementView,
            crate::services::movement_ledger::RecordedMovement,
            crate::services::movement_ledger::LedgerScreen,
            crate::services::dashboard::DashboardSummary,
            crate::services::dashboard::StockAlert,
            crate::auth::SessionUser,
            crate::handlers::auth::SessionInfo,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDocV1;

/// Registers the `Bearer` scheme referenced by the write endpoints
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Estoque API"));
        assert!(json.contains("/api/v1/produtos/{id}"));
        assert!(json.contains("/api/v1/movimentacoes"));
        assert!(json.contains("/api/v1/dashboard"));
        assert!(json.contains("/api/v1/auth/sign-out"));
        assert!(json.contains("\"Bearer\""));
    }
}
