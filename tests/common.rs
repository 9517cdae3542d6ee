#![allow(dead_code)]

use std::sync::Arc;

use axum::{body::{Body, to_bytes}, http::{Request, Response, header}, Router};
use base64::Engine as _;
use loopmemory::{
    app::{build_router, AppState},
    config::{AppConfig, AuthCfg, CodeStoreKind, DbCfg, Environment, ServerCfg},
    repos::{memory::MemoryCodeStore, CodeStore},
};
use serde_json::Value;
use tower::ServiceExt; // for oneshot

pub const JWT_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn test_config(allow_anonymous: bool) -> AppConfig {
    AppConfig {
        server: ServerCfg {
            bind_addr: "127.0.0.1:0".to_string(),
            public_url: "http://127.0.0.1:8080".to_string(),
            cookie_key_base64: base64::engine::general_purpose::STANDARD.encode([42u8; 64]),
        },
        db: DbCfg { url: ":memory:".to_string(), code_store: CodeStoreKind::Memory },
        auth: AuthCfg {
            environment: Environment::Development,
            jwt_secret: JWT_SECRET.to_string(),
            allow_anonymous,
            dev_login: true,
            sweep_interval_secs: 300,
        },
    }
}

pub fn test_state_with(config: AppConfig, store: Arc<dyn CodeStore>) -> AppState {
    AppState::new(config, store).expect("app state")
}

pub fn test_state() -> AppState {
    test_state_with(test_config(false), MemoryCodeStore::new())
}

pub fn test_app() -> Router {
    build_router(test_state())
}

pub async fn send(app: &Router, req: Request<Body>) -> Response<Body> {
    app.clone().oneshot(req).await.expect("router call")
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = to_bytes(res.into_body(), 1024 * 1024).await.expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn json_request(uri: &str, body: Value, cookie: Option<&str>, bearer: Option<&str>) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    if let Some(t) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
    }
    builder.body(Body::from(serde_json::to_vec(&body).unwrap())).unwrap()
}

/// Logs in through /auth/dev-login and returns the `sid=...` pair for a Cookie header.
pub async fn login(app: &Router, user_id: &str, email: &str) -> String {
    let res = send(
        app,
        json_request("/auth/dev-login", serde_json::json!({"user_id": user_id, "email": email}), None, None),
    )
    .await;
    assert!(res.status().is_success(), "dev login failed: {}", res.status());
    let set_cookie = res
        .headers()
        .get(header::SET_COOKIE)
        .expect("expected set-cookie header")
        .to_str()
        .unwrap()
        .to_string();
    set_cookie.split(';').next().unwrap().to_string()
}
