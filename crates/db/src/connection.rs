use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use travelink_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(database_url, 5, 30).await
}

pub async fn connect_with_config(database: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&database.url, database.max_connections, database.timeout_secs).await
}

/// Opens a pool with the pragmas every workflow connection relies on:
/// cascading event deletes and WAL for concurrent readers.
pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(timeout_secs.max(1)))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(sqlite_url(database_url).as_str())
        .await
}

/// Round-trips a trivial query; used by readiness checks.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// Accepts the bare `:memory:` shorthand alongside regular sqlite URLs and
/// creates file databases on first use.
fn sqlite_url(database_url: &str) -> String {
    let trimmed = database_url.trim();
    if trimmed == ":memory:" {
        return "sqlite::memory:".to_string();
    }
    if trimmed.starts_with("sqlite://") && !trimmed.contains('?') {
        return format!("{trimmed}?mode=rwc");
    }
    trimmed.to_string()
}
