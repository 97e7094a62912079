use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use vitrine_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

pub async fn connect_with_config(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

/// Event batches are appended in one short transaction each. WAL plus a busy
/// timeout lets concurrent batches wait for the write lock instead of failing.
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
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA busy_timeout = 5000").execute(&mut *conn).await?;
                Ok(())
            })
        })
        .connect(&sqlite_url(database_url))
        .await
}

/// Round trip used by health checks.
pub async fn ping(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}

/// `sqlite://` URLs create the file when it does not exist yet.
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

#[cfg(test)]
mod tests {
    use super::{connect_with_settings, ping, sqlite_url};

    #[test]
    fn file_urls_are_created_on_demand() {
        assert_eq!(sqlite_url("sqlite://vitrine.db"), "sqlite://vitrine.db?mode=rwc");
        assert_eq!(sqlite_url("sqlite://vitrine.db?mode=ro"), "sqlite://vitrine.db?mode=ro");
        assert_eq!(sqlite_url(":memory:"), "sqlite::memory:");
        assert_eq!(sqlite_url("sqlite::memory:"), "sqlite::memory:");
    }

    #[tokio::test]
    async fn in_memory_pool_answers_ping() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("connect");
        ping(&pool).await.expect("ping");
    }
}
