use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tower_cookies::Cookies;

use crate::{app::AppState, auth::session, web::session::AuthUser};

pub async fn me(user: AuthUser) -> impl IntoResponse {
    Json(json!({
        "user_id": user.user_id,
        "email": user.email,
        "source": user.source,
    }))
}

pub async fn logout(State(state): State<AppState>, cookies: Cookies) -> impl IntoResponse {
    session::clear_session(&cookies, &state.cookie_key);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
pub struct DevLoginRequest {
    pub user_id: Option<String>,
    pub email: String,
}

// Stand-in for the hosted login flow; the route is only mounted when AUTH_DEV_LOGIN is set.
pub async fn dev_login(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(req): Json<DevLoginRequest>,
) -> impl IntoResponse {
    if req.email.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(json!({"success": false, "error": "email is required"}))).into_response();
    }
    let user_id = req
        .user_id
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let secure = state.config.server.public_url.starts_with("https://");
    if let Err(e) = session::set_session(&cookies, &state.cookie_key, &user_id, &req.email, session::SESSION_TTL, secure) {
        tracing::error!(error = ?e, user_id = %user_id, "failed to write session cookie");
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"success": false, "error": "Login failed"}))).into_response();
    }
    tracing::info!(user_id = %user_id, "dev login established session");
    (StatusCode::OK, Json(json!({"success": true, "user_id": user_id, "email": req.email}))).into_response()
}
