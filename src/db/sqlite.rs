use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool};
use diesel::sqlite::SqliteConnection;

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;

// Concurrent redemptions take the write lock; make them wait instead of failing with SQLITE_BUSY.
#[derive(Debug)]
struct BusyTimeout(u32);

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for BusyTimeout {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!("PRAGMA busy_timeout = {};", self.0))
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub fn make_pool(database_url: &str) -> anyhow::Result<SqlitePool> {
    let manager = ConnectionManager::<SqliteConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(8)
        .connection_customizer(Box::new(BusyTimeout(5_000)))
        .build(manager)?;
    Ok(pool)
}
