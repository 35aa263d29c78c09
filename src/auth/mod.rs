/*!
 * # Session and token handling
 *
 * Tokens are issued by an external identity provider and signed with a shared
 * HS256 secret. This module validates them, derives a [`Session`] for every
 * request, and revokes them on sign-out through the `revoked_tokens` table.
 */

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{sea_query::OnConflict, ActiveValue::Set, DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::revoked_token;

mod session;

pub use session::{Session, SessionUser, FALLBACK_DISPLAY_NAME, UNAUTHENTICATED_MESSAGE};

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID)
    pub name: Option<String>,  // User's display name
    pub email: Option<String>, // User's email
    pub jti: String,           // JWT ID (unique identifier for this token)
    pub iat: i64,              // Issued at time
    pub exp: i64,              // Expiration time
    pub nbf: i64,              // Not valid before time
    pub iss: String,           // Issuer
    pub aud: String,           // Audience
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration),
        )
    }
}

/// Identity a token is minted for
#[derive(Debug, Clone)]
pub struct TokenSubject {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Validates and revokes session tokens
#[derive(Debug, Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    pub db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Builds the claims for a fresh token using the configured issuer, audience and lifetime
    pub fn issue_claims(&self, subject: &TokenSubject) -> Result<Claims, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        Ok(Claims {
            sub: subject.id.to_string(),
            name: subject.name.clone(),
            email: subject.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        })
    }

    pub fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Mint a signed token for a user
    pub fn generate_token(&self, subject: &TokenSubject) -> Result<String, AuthError> {
        let claims = self.issue_claims(subject)?;
        self.encode_claims(&claims)
    }

    /// Validate a JWT token and extract the claims
    pub async fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        if self.is_revoked(&claims.jti).await? {
            return Err(AuthError::RevokedToken);
        }

        Ok(claims)
    }

    /// Validates a bearer token and turns it into the session user
    pub async fn session_from_token(&self, token: &str) -> Result<SessionUser, AuthError> {
        let claims = self.validate_token(token).await?;
        SessionUser::try_from(claims)
    }

    /// Revoke the session's token so every later request presenting it is rejected
    pub async fn revoke(&self, user: &SessionUser) -> Result<(), AuthError> {
        let entry = revoked_token::ActiveModel {
            jti: Set(user.token_id.clone()),
            usuario_id: Set(user.user_id.to_string()),
            expires_at: Set(user.expires_at),
            revoked_at: Set(Utc::now()),
        };

        revoked_token::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(revoked_token::Column::Jti)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!(user_id = %user.user_id, jti = %user.token_id, "session token revoked");
        Ok(())
    }

    pub async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        let found = revoked_token::Entity::find_by_id(token_id.to_string())
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;
        Ok(found.is_some())
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token has been revoked")]
    RevokedToken,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message): (StatusCode, &str, String) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Usuário não autenticado".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "Invalid authentication token".to_string(),
            ),
            Self::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "AUTH_TOKEN_EXPIRED",
                "Token has expired".to_string(),
            ),
            Self::RevokedToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REVOKED_TOKEN",
                "Authentication token has been revoked".to_string(),
            ),
            Self::TokenCreation(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_TOKEN_CREATION_FAILED",
                "Token creation failed".to_string(),
            ),
            Self::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_DATABASE_ERROR",
                "Database error".to_string(),
            ),
            Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "authentication failure");
        }

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Pulls the bearer token out of the `Authorization` header.
///
/// `Ok(None)` means no header at all; a header that is not a bearer token is an error.
pub fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AuthError::InvalidToken),
    }
}

/// Attaches a [`Session`] to every request.
///
/// No `Authorization` header yields `Session::Anonymous`. A token that is present
/// but invalid, expired or revoked rejects the request with 401.
pub async fn session_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let session = match bearer_token(request.headers())? {
        None => Session::Anonymous,
        Some(token) => match auth_service.session_from_token(token).await {
            Ok(user) => {
                debug!(user_id = %user.user_id, "session authenticated");
                Session::Authenticated(user)
            }
            Err(err) => {
                warn!(error = %err, "rejected session token");
                return Err(err);
            }
        },
    };

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "kR8vQ2mZ7xW4pL9nT6yB3cF1hJ5gD0sA-estoque-auth-test-secret-value-abc";

    async fn service() -> AuthService {
        let db = crate::test_support::memory_db().await;
        AuthService::new(
            AuthConfig::new(
                SECRET.into(),
                "estoque-api".into(),
                "estoque-auth".into(),
                Duration::from_secs(600),
            ),
            Arc::new(db),
        )
    }

    fn subject() -> TokenSubject {
        TokenSubject {
            id: Uuid::new_v4(),
            name: Some("Maria Souza".into()),
            email: Some("maria@empresa.com.br".into()),
        }
    }

    #[tokio::test]
    async fn generated_token_yields_session_user() {
        let auth = service().await;
        let subject = subject();
        let token = auth.generate_token(&subject).unwrap();

        let user = auth.session_from_token(&token).await.unwrap();
        assert_eq!(user.user_id, subject.id);
        assert_eq!(user.display_name(), "Maria Souza");
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let auth = service().await;
        let mut claims = auth.issue_claims(&subject()).unwrap();
        claims.aud = "another-api".into();
        let token = auth.encode_claims(&claims).unwrap();

        assert_matches!(
            auth.validate_token(&token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let auth = service().await;
        let mut claims = auth.issue_claims(&subject()).unwrap();
        let past = Utc::now().timestamp() - 3_600;
        claims.iat = past - 60;
        claims.nbf = past - 60;
        claims.exp = past;
        let token = auth.encode_claims(&claims).unwrap();

        assert_matches!(
            auth.validate_token(&token).await,
            Err(AuthError::TokenExpired)
        );
    }

    #[tokio::test]
    async fn non_uuid_subject_is_invalid() {
        let auth = service().await;
        let mut claims = auth.issue_claims(&subject()).unwrap();
        claims.sub = "not-a-uuid".into();
        let token = auth.encode_claims(&claims).unwrap();

        assert_matches!(
            auth.session_from_token(&token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn revoked_token_is_rejected_and_revoke_is_idempotent() {
        let auth = service().await;
        let token = auth.generate_token(&subject()).unwrap();
        let user = auth.session_from_token(&token).await.unwrap();

        auth.revoke(&user).await.unwrap();
        auth.revoke(&user).await.unwrap();

        assert_matches!(
            auth.validate_token(&token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_matches!(bearer_token(&headers), Ok(None));

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_matches!(bearer_token(&headers), Ok(Some("abc.def")));

        headers.insert(header::AUTHORIZATION, "Basic Zm9vOmJhcg==".parse().unwrap());
        assert_matches!(bearer_token(&headers), Err(AuthError::InvalidToken));

        headers.insert(header::AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_matches!(bearer_token(&headers), Err(AuthError::InvalidToken));
    }
}
