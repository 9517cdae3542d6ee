use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::json;

#[path = "common.rs"]
mod common;

use common::{json_request, login, send, body_json};

const CB: &str = "https://client/cb";

async fn authorize(app: &axum::Router, cookie: &str, redirect_uri: &str) -> String {
    let res = send(app, json_request("/api/auth/oauth/authorize", json!({"redirect_uri": redirect_uri}), Some(cookie), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["success"], true);
    v["code"].as_str().expect("code").to_string()
}

async fn exchange(app: &axum::Router, code: &str, redirect_uri: &str) -> (StatusCode, serde_json::Value) {
    let res = send(
        app,
        json_request(
            "/api/auth/oauth/token",
            json!({"grant_type": "authorization_code", "code": code, "redirect_uri": redirect_uri}),
            None,
            None,
        ),
    )
    .await;
    let status = res.status();
    (status, body_json(res).await)
}

#[tokio::test]
async fn code_exchange_end_to_end() {
    let state = common::test_state();
    let app = loopmemory::app::build_router(state.clone());
    let cookie = login(&app, "u1", "u1@x.com").await;

    let c1 = authorize(&app, &cookie, CB).await;
    let (status, body) = exchange(&app, &c1, CB).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 86400);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["email"], "u1@x.com");

    let token = body["access_token"].as_str().unwrap();
    let identity = state.tokens.verify(token).expect("token verifies");
    assert_eq!(identity.user_id, "u1");
    assert_eq!(identity.email, "u1@x.com");

    // the code is spent
    let (status, body) = exchange(&app, &c1, CB).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn camel_case_fields_accepted() {
    let app = common::test_app();
    let cookie = login(&app, "u1", "u1@x.com").await;
    let res = send(&app, json_request("/api/auth/oauth/authorize", json!({"redirectUri": CB}), Some(&cookie), None)).await;
    let code = body_json(res).await["code"].as_str().unwrap().to_string();

    let res = send(
        &app,
        json_request("/api/auth/oauth/token", json!({"grantType": "authorization_code", "code": code, "redirectUri": CB}), None, None),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn redirect_mismatch_is_opaque_invalid_grant() {
    let app = common::test_app();
    let cookie = login(&app, "u1", "u1@x.com").await;
    let code = authorize(&app, &cookie, CB).await;

    let (status, mismatch) = exchange(&app, &code, "https://attacker/cb").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, unknown) = exchange(&app, "no-such-code", CB).await;
    // same body whether the code exists or not
    assert_eq!(mismatch, unknown);
    assert_eq!(mismatch["error"], "invalid_grant");

    // mismatch did not burn the code
    let (status, _) = exchange(&app, &code, CB).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn token_endpoint_validation() {
    let app = common::test_app();

    let res = send(&app, json_request("/api/auth/oauth/token", json!({"grant_type": "password", "code": "x", "redirect_uri": CB}), None, None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "unsupported_grant_type");

    let res = send(&app, json_request("/api/auth/oauth/token", json!({"grant_type": "authorization_code", "redirect_uri": CB}), None, None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["error"], "invalid_request");

    let res = send(&app, json_request("/api/auth/oauth/token", json!({"grant_type": "authorization_code", "code": "x"}), None, None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert_eq!(v["error"], "invalid_request");
    assert!(v["error_description"].is_string());
}

#[tokio::test]
async fn token_endpoint_answers_cors_preflight() {
    let app = common::test_app();
    let req = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/oauth/token")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type,authorization")
        .body(Body::empty())
        .unwrap();
    let res = send(&app, req).await;
    assert!(res.status().is_success());
    assert_eq!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
}

#[tokio::test]
async fn authorize_requires_session() {
    let app = common::test_app();
    let res = send(&app, json_request("/api/auth/oauth/authorize", json!({"redirect_uri": CB}), None, None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let v = body_json(res).await;
    assert_eq!(v["success"], false);
}

#[tokio::test]
async fn authorize_rejects_bearer_only_callers() {
    let state = common::test_state();
    let app = loopmemory::app::build_router(state.clone());
    let token = state.tokens.issue("u1", "u1@x.com", time::Duration::hours(1)).unwrap();
    let res = send(&app, json_request("/api/auth/oauth/authorize", json!({"redirect_uri": CB}), None, Some(&token))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn authorize_validates_redirect_uri() {
    let app = common::test_app();
    let cookie = login(&app, "u1", "u1@x.com").await;

    let res = send(&app, json_request("/api/auth/oauth/authorize", json!({}), Some(&cookie), None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(&app, json_request("/api/auth/oauth/authorize", json!({"redirect_uri": "/relative"}), Some(&cookie), None)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(res).await["success"], false);
}

#[tokio::test]
async fn cli_token_is_long_lived_and_verifies() {
    let state = common::test_state();
    let app = loopmemory::app::build_router(state.clone());

    let res = send(&app, json_request("/api/auth/token/generate", json!({}), None, None)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let cookie = login(&app, "u7", "u7@x.com").await;
    let res = send(&app, json_request("/api/auth/token/generate", json!({}), Some(&cookie), None)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["success"], true);
    assert_eq!(v["expires_in"], 365 * 24 * 3600);
    let identity = state.tokens.verify(v["token"].as_str().unwrap()).unwrap();
    assert_eq!(identity.user_id, "u7");
}

#[tokio::test]
async fn sqlite_backed_exchange() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = common::test_config(false);
    config.db.url = dir.path().join("codes.sqlite").display().to_string();
    config.db.code_store = loopmemory::config::CodeStoreKind::Database;

    let store = loopmemory::app::build_code_store(&config).await.expect("sqlite store");
    let app = loopmemory::app::build_router(common::test_state_with(config, store));
    let cookie = login(&app, "u1", "u1@x.com").await;

    let code = authorize(&app, &cookie, CB).await;
    let (status, _) = exchange(&app, &code, CB).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = exchange(&app, &code, CB).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_grant");
}
