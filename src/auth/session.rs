use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AuthError, Claims};
use crate::errors::ServiceError;

/// Name shown when the token carries neither a name nor an email
pub const FALLBACK_DISPLAY_NAME: &str = "Usuário";

pub const UNAUTHENTICATED_MESSAGE: &str = "Usuário não autenticado";

/// The signed-in user behind a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub nome: Option<String>,
    pub email: Option<String>,
    /// `jti` of the presented token
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionUser {
    /// Name recorded on the user's profile: token name, then email, then a generic label
    pub fn display_name(&self) -> String {
        self.nome
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
            })
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string()
    }
}

impl TryFrom<Claims> for SessionUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let expires_at =
            DateTime::<Utc>::from_timestamp(claims.exp, 0).ok_or(AuthError::InvalidToken)?;

        Ok(Self {
            user_id,
            nome: claims.name,
            email: claims.email,
            token_id: claims.jti,
            expires_at,
        })
    }
}

/// Who is making the request. Reads accept either variant; writes call
/// [`Session::require_user`] before touching the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Session {
    Authenticated(SessionUser),
    #[default]
    Anonymous,
}

impl Session {
    pub fn require_user(&self) -> Result<&SessionUser, ServiceError> {
        match self {
            Session::Authenticated(user) => Ok(user),
            Session::Anonymous => Err(ServiceError::Unauthenticated(
                UNAUTHENTICATED_MESSAGE.to_string(),
            )),
        }
    }

    pub fn user(&self) -> Option<&SessionUser> {
        match self {
            Session::Authenticated(user) => Some(user),
            Session::Anonymous => None,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Session>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;
    use rstest::rstest;

    fn user(nome: Option<&str>, email: Option<&str>) -> SessionUser {
        SessionUser {
            user_id: Uuid::new_v4(),
            nome: nome.map(String::from),
            email: email.map(String::from),
            token_id: "jti-1".into(),
            expires_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(Some("João"), Some("joao@x.com"), "João")]
    #[case(Some("   "), Some("joao@x.com"), "joao@x.com")]
    #[case(None, Some("joao@x.com"), "joao@x.com")]
    #[case(None, None, "Usuário")]
    #[case(Some(""), Some(""), "Usuário")]
    fn display_name_falls_back(
        #[case] nome: Option<&str>,
        #[case] email: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(user(nome, email).display_name(), expected);
    }

    #[test]
    fn anonymous_session_cannot_write() {
        assert_matches!(
            Session::Anonymous.require_user(),
            Err(ServiceError::Unauthenticated(msg)) if msg == "Usuário não autenticado"
        );

        let session = Session::Authenticated(user(Some("Ana"), None));
        assert_eq!(session.require_user().unwrap().display_name(), "Ana");
    }

    #[tokio::test]
    async fn extractor_defaults_to_anonymous() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let session = Session::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(session, Session::Anonymous);

        let signed_in = Session::Authenticated(user(Some("Ana"), None));
        parts.extensions.insert(signed_in.clone());
        let session = Session::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(session, signed_in);
    }

    #[test]
    fn claims_with_bad_subject_are_rejected() {
        let claims = Claims {
            sub: "42".into(),
            name: None,
            email: None,
            jti: "j".into(),
            iat: 0,
            exp: 10,
            nbf: 0,
            iss: "i".into(),
            aud: "a".into(),
        };
        assert_matches!(SessionUser::try_from(claims), Err(AuthError::InvalidToken));
    }
}
