pub mod session;

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Role, User};
use crate::AppState;
use session::{decode_token, Claims, SESSION_COOKIE};

/// Текущий пользователь запроса
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    /// Есть, если вход выполнен по токену (нужно для logout)
    pub session: Option<Claims>,
}

impl AuthUser {
    pub fn require_event_manager(&self) -> Result<(), AppError> {
        if self.role.can_manage_events() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::AuditoriumAdmin {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::AuditoriumAdmin
    }
}

enum Credentials {
    Token(String),
    Basic(String, String),
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

fn session_cookie(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

// Basic Auth: email:password в base64
fn basic(parts: &Parts) -> Result<Option<(String, String)>, AppError> {
    let Some(encoded) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
    else {
        return Ok(None);
    };

    let decoded = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AppError::Unauthorized)?;
    let credentials = String::from_utf8(decoded).map_err(|_| AppError::Unauthorized)?;
    let (email, password) = credentials.split_once(':').ok_or(AppError::Unauthorized)?;
    Ok(Some((email.to_string(), password.to_string())))
}

fn credentials(parts: &Parts) -> Result<Option<Credentials>, AppError> {
    if let Some(token) = bearer(parts) {
        return Ok(Some(Credentials::Token(token.to_string())));
    }
    if let Some((email, password)) = basic(parts)? {
        return Ok(Some(Credentials::Basic(email, password)));
    }
    Ok(session_cookie(parts).map(|t| Credentials::Token(t.to_string())))
}

async fn authenticate(creds: Credentials, state: &Arc<AppState>) -> Result<AuthUser, AppError> {
    match creds {
        Credentials::Token(token) => {
            let claims = decode_token(&token, &state.config.jwt.secret).map_err(|e| {
                tracing::debug!("rejected session token: {}", e);
                AppError::Unauthorized
            })?;
            if state.cache.is_session_revoked(&claims.jti).await? {
                return Err(AppError::Unauthorized);
            }
            Ok(AuthUser {
                id: claims.sub,
                email: claims.email.clone(),
                name: claims.name.clone(),
                role: claims.role,
                session: Some(claims),
            })
        }
        Credentials::Basic(email, password) => {
            let user = User::find_by_email(&email, &state.db)
                .await?
                .ok_or(AppError::Unauthorized)?;
            if !user.verify_password(&password) {
                return Err(AppError::Unauthorized);
            }
            Ok(AuthUser {
                id: user.id,
                email: user.email,
                name: user.name,
                role: user.role,
                session: None,
            })
        }
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let creds = credentials(parts)?.ok_or(AppError::Unauthorized)?;
        authenticate(creds, state).await
    }
}

/// Устаревшие или битые учётные данные на открытом маршруте означают гостя
fn or_guest(result: Result<AuthUser, AppError>) -> Result<Option<AuthUser>, AppError> {
    match result {
        Ok(user) => Ok(Some(user)),
        Err(AppError::Unauthorized) => Ok(None),
        Err(e) => Err(e),
    }
}

// Для маршрутов, доступных и гостям (лист ожидания)
impl OptionalFromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Option<Self>, Self::Rejection> {
        let creds = match credentials(parts) {
            Ok(Some(creds)) => creds,
            Ok(None) => return Ok(None),
            Err(e) => return or_guest(Err(e)),
        };
        or_guest(authenticate(creds, state).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(headers: &[(header::HeaderName, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_wins_over_cookie() {
        let p = parts(&[
            (header::AUTHORIZATION, "Bearer abc"),
            (header::COOKIE, "theme=dark; session=xyz"),
        ]);
        assert!(matches!(credentials(&p).unwrap(), Some(Credentials::Token(t)) if t == "abc"));
    }

    #[test]
    fn session_cookie_is_found_among_others() {
        let p = parts(&[(header::COOKIE, "theme=dark; session=xyz; lang=en")]);
        assert_eq!(session_cookie(&p), Some("xyz"));
        let empty = parts(&[(header::COOKIE, "session=")]);
        assert_eq!(session_cookie(&empty), None);
    }

    #[test]
    fn basic_credentials_are_decoded() {
        let encoded = general_purpose::STANDARD.encode("ada@example.com:secret:with:colons");
        let value = format!("Basic {encoded}");
        let p = parts(&[(header::AUTHORIZATION, value.as_str())]);
        match credentials(&p).unwrap() {
            Some(Credentials::Basic(email, password)) => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(password, "secret:with:colons");
            }
            _ => panic!("expected basic credentials"),
        }
    }

    fn user() -> AuthUser {
        AuthUser {
            id: 7,
            email: "ada@example.com".into(),
            name: "Ada".into(),
            role: Role::Attendee,
            session: None,
        }
    }

    #[test]
    fn stale_credentials_fall_back_to_guest() {
        assert!(matches!(or_guest(Err(AppError::Unauthorized)), Ok(None)));
        assert!(matches!(or_guest(Ok(user())), Ok(Some(u)) if u.id == 7));
        assert!(matches!(
            or_guest(Err(AppError::Internal(anyhow::anyhow!("redis down")))),
            Err(AppError::Internal(_))
        ));
    }

    #[test]
    fn garbage_basic_is_unauthorized_and_nothing_is_none() {
        let p = parts(&[(header::AUTHORIZATION, "Basic !!!")]);
        assert!(matches!(credentials(&p), Err(AppError::Unauthorized)));
        assert!(credentials(&parts(&[])).unwrap().is_none());
    }
}
