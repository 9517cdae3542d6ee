use diesel_migrations::{embed_migrations, EmbeddedMigrations};

// Embed all files under migrations/ (path is relative to crate root)
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[cfg(feature = "sqlite")]
pub fn run_sqlite_migrations(conn: &mut diesel::sqlite::SqliteConnection) -> anyhow::Result<()> {
    use diesel_migrations::MigrationHarness;
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!(e.to_string()))
}

/// diesel's migration harness is sync, so pg migrations run on a plain
/// `PgConnection` inside a blocking task.
#[cfg(feature = "pg")]
pub async fn run_pg_migrations(database_url: &str) -> anyhow::Result<()> {
    use diesel::Connection;
    use diesel_migrations::MigrationHarness;
    let url = database_url.to_string();
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        let mut conn = diesel::pg::PgConnection::establish(&url)?;
        conn.run_pending_migrations(MIGRATIONS)
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!(e.to_string()))
    })
    .await?
}
