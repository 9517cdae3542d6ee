use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::{
    app::AppState,
    auth::{
        codes::RedeemError,
        token::{ACCESS_TOKEN_TTL, CLI_TOKEN_TTL},
    },
    web::session::SessionUser,
};

const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(alias = "redirectUri")]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(alias = "grantType")]
    pub grant_type: Option<String>,
    pub code: Option<String>,
    #[serde(alias = "redirectUri")]
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user_id: String,
    pub email: String,
}

/// Errors of the `{success, error}` endpoints used by the browser.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

/// Token endpoint errors. Every redemption failure is reported as `invalid_grant`.
#[derive(Debug)]
pub enum TokenError {
    InvalidRequest,
    UnsupportedGrantType,
    InvalidGrant,
    ServerError,
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        let (status, error, description) = match self {
            TokenError::InvalidRequest => (StatusCode::BAD_REQUEST, "invalid_request", "Missing required parameters"),
            TokenError::UnsupportedGrantType => (
                StatusCode::BAD_REQUEST,
                "unsupported_grant_type",
                "Only authorization_code grant type is supported",
            ),
            TokenError::InvalidGrant => (StatusCode::BAD_REQUEST, "invalid_grant", "Invalid or expired authorization code"),
            TokenError::ServerError => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", "Token exchange failed"),
        };
        (status, Json(json!({ "error": error, "error_description": description }))).into_response()
    }
}

/// POST /api/auth/oauth/authorize
///
/// Mints a one-time code for the logged-in user. The caller follows the redirect itself.
pub async fn authorize(
    State(state): State<AppState>,
    SessionUser { user_id, email }: SessionUser,
    body: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "malformed authorize body");
        ApiError::BadRequest("Missing required parameters")
    })?;
    let redirect_uri = req
        .redirect_uri
        .filter(|u| !u.is_empty())
        .ok_or(ApiError::BadRequest("Missing required parameters"))?;
    if !is_absolute_uri(&redirect_uri) {
        return Err(ApiError::BadRequest("redirect_uri must be an absolute URI"));
    }

    let code = state
        .codes
        .issue(&user_id, &email, &redirect_uri)
        .await
        .map_err(|e| {
            tracing::error!(error = ?e, user_id = %user_id, "failed to issue authorization code");
            ApiError::Internal("Authorization failed")
        })?;

    Ok(Json(json!({ "success": true, "code": code })))
}

/// POST /api/auth/oauth/token
pub async fn token(
    State(state): State<AppState>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, TokenError> {
    let Json(req) = body.map_err(|e| {
        tracing::debug!(error = %e, "malformed token body");
        TokenError::InvalidRequest
    })?;

    if req.grant_type.as_deref() != Some(GRANT_AUTHORIZATION_CODE) {
        return Err(TokenError::UnsupportedGrantType);
    }
    let (Some(code), Some(redirect_uri)) = (
        req.code.filter(|c| !c.is_empty()),
        req.redirect_uri.filter(|u| !u.is_empty()),
    ) else {
        return Err(TokenError::InvalidRequest);
    };

    let grant = match state.codes.redeem(&code, &redirect_uri).await {
        Ok(grant) => grant,
        Err(RedeemError::Store(e)) => {
            tracing::error!(error = ?e, "failed to redeem authorization code");
            return Err(TokenError::ServerError);
        }
        Err(reason) => {
            // reason stays in the log; callers only ever see invalid_grant
            tracing::warn!(reason = %reason, "authorization code rejected");
            return Err(TokenError::InvalidGrant);
        }
    };

    let access_token = state
        .tokens
        .issue(&grant.user_id, &grant.email, ACCESS_TOKEN_TTL)
        .map_err(|e| {
            tracing::error!(error = ?e, user_id = %grant.user_id, "failed to sign access token");
            TokenError::ServerError
        })?;

    tracing::info!(user_id = %grant.user_id, "authorization code exchanged");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: ACCESS_TOKEN_TTL.whole_seconds(),
        user_id: grant.user_id,
        email: grant.email,
    }))
}

/// POST /api/auth/token/generate
///
/// Long-lived token for CLI configuration, minted straight from the session.
pub async fn generate_cli_token(
    State(state): State<AppState>,
    SessionUser { user_id, email }: SessionUser,
) -> Result<impl IntoResponse, ApiError> {
    let token = state
        .tokens
        .issue(&user_id, &email, CLI_TOKEN_TTL)
        .map_err(|e| {
            tracing::error!(error = ?e, user_id = %user_id, "failed to sign cli token");
            ApiError::Internal("Failed to generate token")
        })?;
    Ok(Json(json!({
        "success": true,
        "token": token,
        "expires_in": CLI_TOKEN_TTL.whole_seconds(),
    })))
}

fn is_absolute_uri(value: &str) -> bool {
    // Url::parse rejects relative references
    Url::parse(value).is_ok()
}
