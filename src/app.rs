use axum::{routing::{get, post}, Router};
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use tracing_subscriber::EnvFilter;
use crate::auth::{cleanup::CodeSweeper, codes::AuthCodes, token::TokenService};
use crate::config::{AppConfig, CodeStoreKind, decode_cookie_key};
use crate::repos::{memory::MemoryCodeStore, CodeStore};
use crate::web::handlers::{account, mcp, oauth};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub cookie_key: Key,
    pub codes: AuthCodes,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn CodeStore>) -> anyhow::Result<Self> {
        let key_bytes = decode_cookie_key(&config.server.cookie_key_base64)?;
        let tokens = TokenService::new(config.auth.jwt_secret.as_bytes())?;
        Ok(Self {
            cookie_key: Key::from(&key_bytes),
            codes: AuthCodes::new(store),
            tokens,
            config,
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    // logging
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!(?config.db, ?config.auth, "loaded config");

    let store = build_code_store(&config).await?;
    let state = AppState::new(config.clone(), store)?;

    // expiry sweep lives for the whole process, not for any one request
    CodeSweeper::new(state.codes.clone(), config.auth.sweep_interval_secs).spawn();

    let app = build_router(state);

    let addr = config.server.bind_addr.clone();
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Chooses the code store backend. `database` uses whichever driver feature was compiled in.
pub async fn build_code_store(config: &AppConfig) -> anyhow::Result<Arc<dyn CodeStore>> {
    match config.db.code_store {
        CodeStoreKind::Memory => {
            tracing::warn!("using in-memory authorization code store; codes are not shared between instances");
            Ok(MemoryCodeStore::new())
        }
        CodeStoreKind::Database => database_code_store(&config.db.url).await,
    }
}

/// With both drivers compiled in, a `postgres://` URL selects pg and anything else sqlite.
#[allow(unreachable_code)]
async fn database_code_store(url: &str) -> anyhow::Result<Arc<dyn CodeStore>> {
    #[cfg(feature = "pg")]
    if is_postgres_url(url) {
        crate::db::migrations::run_pg_migrations(url).await?;
        let pool = crate::db::pg::make_pool(url).await?;
        return Ok(crate::repos::pg::PgCodeStore::new(pool));
    }

    #[cfg(feature = "sqlite")]
    {
        let pool = crate::db::sqlite::make_pool(url)?;
        // Run migrations eagerly on startup
        {
            let mut conn = pool.get()?;
            crate::db::migrations::run_sqlite_migrations(&mut conn)?;
        }
        return Ok(crate::repos::sqlite::SqliteCodeStore::new(pool));
    }

    anyhow::bail!("CODE_STORE=database has no driver compiled in for '{}'", url.split(':').next().unwrap_or(url))
}

pub fn is_postgres_url(url: &str) -> bool {
    url.starts_with("postgres://") || url.starts_with("postgresql://")
}

pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/.well-known/mcp.json", get(mcp::discovery))
        .route("/api/auth/oauth/authorize", post(oauth::authorize))
        .route("/api/auth/oauth/token", post(oauth::token))
        .route("/api/auth/token/generate", post(oauth::generate_cli_token))
        .route("/api/mcp", post(mcp::rpc))
        .route("/me", get(account::me))
        .route("/logout", post(account::logout));

    if state.config.auth.dev_login {
        tracing::warn!("AUTH_DEV_LOGIN enabled; /auth/dev-login issues sessions without a password");
        router = router.route("/auth/dev-login", post(account::dev_login));
    }

    // Clients are CLI and desktop tools, not same-origin pages
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .with_state(state)
        .layer(CookieManagerLayer::new())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
