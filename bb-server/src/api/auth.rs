//! Authentication middleware for bb-server
//!
//! Every protected request carries `Authorization: Bearer <token>` where the
//! token was issued with the shared secret. When the secret is 0 the caller
//! names itself with the `X-User-Id` header instead (development mode).

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bb_common::api::auth::{now_millis, validate_token, validate_user_id, AuthTokenError};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::AppState;

/// Header naming the caller when authentication is disabled
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller, inserted into request extensions by [`auth_middleware`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Authentication middleware
///
/// Resolves the caller and stores it as a [`CurrentUser`] extension.
/// Returns 401 Unauthorized if no valid identity is present.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user_id = if state.shared_secret == 0 {
        development_user(request.headers())?
    } else {
        let token = bearer_token(request.headers())?;
        validate_token(token, state.shared_secret, now_millis()).map_err(|e| {
            warn!(path = %request.uri().path(), "Token rejected: {}", e);
            AuthError::InvalidToken(e)
        })?
    };

    debug!(user_id = %user_id, "Authenticated request");
    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingCredentials("Authorization header required"))?
        .to_str()
        .map_err(|_| AuthError::MissingCredentials("Authorization header is not ASCII"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(AuthError::MissingCredentials("expected 'Bearer <token>'")),
    }
}

fn development_user(headers: &HeaderMap) -> Result<String, AuthError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .ok_or(AuthError::MissingCredentials("X-User-Id header required"))?
        .to_str()
        .map_err(|_| AuthError::MissingCredentials("X-User-Id header is not ASCII"))?
        .trim();

    validate_user_id(user_id).map_err(AuthError::InvalidToken)?;
    Ok(user_id.to_string())
}

/// Authentication error types for HTTP responses
#[derive(Debug)]
pub enum AuthError {
    MissingCredentials(&'static str),
    InvalidToken(AuthTokenError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingCredentials(msg) => msg.to_string(),
            AuthError::InvalidToken(AuthTokenError::DatabaseError(_)) => {
                return ApiError::Internal("authentication unavailable".to_string()).into_response()
            }
            AuthError::InvalidToken(e) => e.to_string(),
        };
        ApiError::Unauthorized(message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer bb1.abc.1.ff"));
        assert_eq!(bearer_token(&headers).unwrap(), "bb1.abc.1.ff");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer  tok "));
        assert_eq!(bearer_token(&headers).unwrap(), "tok");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn test_development_user_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            development_user(&headers),
            Err(AuthError::MissingCredentials(_))
        ));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static(" alice "));
        assert_eq!(development_user(&headers).unwrap(), "alice");

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("   "));
        assert!(matches!(development_user(&headers), Err(AuthError::InvalidToken(_))));
    }
}
