use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common::{map_service_error, success_message_response, success_response};
use crate::auth::{Session, SessionUser};
use crate::errors::ApiError;
use crate::AppState;

pub const SIGNED_OUT: &str = "Sessão encerrada";

/// Current-session accessor body. `usuario` is absent for anonymous callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionInfo {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usuario: Option<SessionUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome_exibicao: Option<String>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        match session.user() {
            Some(user) => Self {
                authenticated: true,
                nome_exibicao: Some(user.display_name()),
                usuario: Some(user.clone()),
            },
            None => Self {
                authenticated: false,
                usuario: None,
                nome_exibicao: None,
            },
        }
    }
}

/// Who the presented token belongs to, if anyone
#[utoipa::path(
    get,
    path = "/api/v1/auth/session",
    responses(
        (status = 200, description = "Current session", body = crate::ApiResponse<SessionInfo>),
        (status = 401, description = "Token invalid, expired or revoked")
    ),
    tag = "Auth"
)]
pub async fn current_session(session: Session) -> impl IntoResponse {
    success_response(SessionInfo::from(&session))
}

/// Sign out ("Sair"): revoke the presented token
#[utoipa::path(
    post,
    path = "/api/v1/auth/sign-out",
    responses(
        (status = 200, description = "Token revoked", body = crate::ApiResponse<SessionInfo>),
        (status = 401, description = "No session", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = [])),
    tag = "Auth"
)]
pub async fn sign_out(
    session: Session,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let user = session.require_user().map_err(map_service_error)?;
    state.auth.revoke(user).await?;

    Ok(success_message_response(
        SessionInfo::from(&Session::Anonymous),
        SIGNED_OUT,
    ))
}
