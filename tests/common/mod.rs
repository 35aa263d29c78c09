#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use estoque_api::{
    auth::{AuthService, TokenSubject},
    config::AppConfig,
    db,
    AppState,
};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str =
    "kR8vQ2mZ7xW4pL9nT6yB3cF1hJ5gD0sA-estoque-integration-secret-value-42";

/// Helper harness for spinning up the full router over a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub user_id: Uuid,
    token: String,
    _dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let db_path = dir.path().join("estoque_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.cors_allow_any_origin = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);
        let user_id = Uuid::new_v4();
        let token = mint_token(&state.auth, user_id, Some("Operadora Ana"), Some("ana@example.com"));
        let router = estoque_api::build_router(state.clone());

        Self {
            router,
            state,
            user_id,
            token,
            _dir: dir,
        }
    }

    pub fn auth_service(&self) -> Arc<AuthService> {
        self.state.auth.clone()
    }

    /// Bearer token for the default operator.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for authenticated JSON requests.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request(method, uri, body, Some(self.token())).await
    }

    /// Creates a product through the API and returns its id
    pub async fn seed_product(&self, nome: &str, estoque_minimo: i32) -> Uuid {
        let response = self
            .request_authenticated(Method::POST, "/api/v1/produtos", Some(product_body(nome, estoque_minimo)))
            .await;
        assert_eq!(response.status(), 201, "seeding product {nome}");
        let body = response_json(response).await;
        body["data"]["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .expect("created product id")
    }

    /// Records a movement through the API and returns the response
    pub async fn move_stock(&self, produto_id: Uuid, tipo: &str, quantidade: i32) -> Response {
        self.request_authenticated(
            Method::POST,
            "/api/v1/movimentacoes",
            Some(json!({
                "produto_id": produto_id,
                "tipo": tipo,
                "quantidade": quantidade,
            })),
        )
        .await
    }
}

pub fn mint_token(
    auth: &AuthService,
    user_id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> String {
    auth.generate_token(&TokenSubject {
        id: user_id,
        name: name.map(str::to_string),
        email: email.map(str::to_string),
    })
    .expect("token generation")
}

pub fn product_body(nome: &str, estoque_minimo: i32) -> Value {
    json!({
        "nome": nome,
        "descricao": "",
        "categoria": "Ferramentas manuais",
        "material": "Aço carbono",
        "tamanho": null,
        "peso": "1.2",
        "estoque_minimo": estoque_minimo,
    })
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
