use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode, header::AUTHORIZATION, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::future::Future;
use tower_cookies::Cookies;

use crate::app::AppState;
use crate::auth::session;

pub const ANONYMOUS_USER_ID: &str = "00000000-0000-0000-0000-000000000000";
pub const ANONYMOUS_EMAIL: &str = "default@example.com";

/// How the caller's identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthSource {
    Bearer,
    Session,
    Anonymous,
}

/// Resolved caller identity for business endpoints.
///
/// Resolution order:
/// 1. Bearer token (Authorization: Bearer <access_token>)
/// 2. Session cookie (sid)
/// 3. Anonymous identity, only when `AUTH_ALLOW_ANONYMOUS` is set
///
/// Usage:
/// ```ignore
/// async fn handler(AuthUser { user_id, .. }: AuthUser) -> impl IntoResponse {
///     format!("User: {}", user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub source: AuthSource,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            if let Some(token) = bearer_token(&parts.headers) {
                if let Some(identity) = state.tokens.verify(token) {
                    return Ok(AuthUser {
                        user_id: identity.user_id,
                        email: identity.email,
                        source: AuthSource::Bearer,
                    });
                }
                tracing::debug!("bearer token rejected; trying session cookie");
            }

            // Fall back to session cookie
            let cookies = Cookies::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    tracing::error!(error = ?e, "Failed to extract cookies");
                    not_authenticated()
                })?;

            if let Some(sess) = session::get_session(&cookies, &state.cookie_key) {
                return Ok(AuthUser {
                    user_id: sess.user_id,
                    email: sess.email,
                    source: AuthSource::Session,
                });
            }

            if state.config.auth.allow_anonymous {
                return Ok(AuthUser {
                    user_id: ANONYMOUS_USER_ID.to_string(),
                    email: ANONYMOUS_EMAIL.to_string(),
                    source: AuthSource::Anonymous,
                });
            }

            tracing::warn!("request carried no usable credential");
            Err(not_authenticated())
        }
    }
}

/// Session-only extractor for endpoints that must not accept bearer tokens
/// (minting a code or a CLI token from a token would let tokens extend themselves).
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: String,
    pub email: String,
}

impl FromRequestParts<AppState> for SessionUser {
    type Rejection = Response;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            let cookies = Cookies::from_request_parts(parts, state)
                .await
                .map_err(|e| {
                    tracing::error!(error = ?e, "Failed to extract cookies");
                    unauthorized_api()
                })?;
            match session::get_session(&cookies, &state.cookie_key) {
                Some(s) => Ok(SessionUser { user_id: s.user_id, email: s.email }),
                None => Err(unauthorized_api()),
            }
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>`. Anything else yields `None`.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

fn not_authenticated() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"error": "Not authenticated"}))).into_response()
}

fn unauthorized_api() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({"success": false, "error": "Unauthorized"}))).into_response()
}
