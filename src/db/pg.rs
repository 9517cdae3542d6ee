use std::time::Duration;

use anyhow::Context;
use diesel_async::{pooled_connection::bb8::Pool, pooled_connection::AsyncDieselConnectionManager, AsyncPgConnection};

pub type PgPool = Pool<AsyncPgConnection>;

// A token exchange waiting on a saturated pool should fail as server_error, not hang.
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn make_pool(database_url: &str) -> anyhow::Result<PgPool> {
    if !crate::app::is_postgres_url(database_url) {
        anyhow::bail!("DATABASE_URL must be a postgres:// url when built with the pg feature");
    }
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
    Pool::builder()
        .max_size(10)
        .connection_timeout(CHECKOUT_TIMEOUT)
        .build(manager)
        .await
        .context("building postgres pool")
}
