pub mod from_row;
mod schema;
pub mod queries;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::AnalyticsScope;
use crate::pricing::PricingPolicy;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Milliseconds a connection waits on a locked database before SQLITE_BUSY.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Application state shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Default analytics scope; requests may override it.
    pub analytics: AnalyticsScope,
    /// Default pricing policy; requests may override it.
    pub pricing: PricingPolicy,
}

/// Connection manager with foreign keys enforced and a busy timeout, so
/// concurrent writers queue instead of failing immediately.
pub fn connection_manager(database_path: &str) -> SqliteConnectionManager {
    SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
    })
}

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    Pool::builder()
        .max_size(10)
        .build(connection_manager(database_path))
}
