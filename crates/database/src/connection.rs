//! Database connection management
//!
//! Every pool this module hands out enforces foreign keys: tombstone
//! application counts on child rows cascading with their parents, and a
//! pool without the pragma would silently strand them. On-disk pools run
//! in WAL mode so effective-position reads never block the sync and
//! event-append transactions.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use talekeeper_core::AppError;

/// Database connection pool
pub type DbPool = Pool<Sqlite>;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    pub path: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "talekeeper.db".to_string(),
            max_connections: 5,
        }
    }
}

impl DatabaseConfig {
    /// Creates a configuration for a database file
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Sets the maximum number of connections
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

/// Opens the database, creating the file if it does not exist
pub async fn connect(config: DatabaseConfig) -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            AppError::database(format!("Failed to open database at {}", config.path), e)
        })
}

/// Creates an in-memory database for testing
///
/// A single connection, because each SQLite in-memory database lives and
/// dies with its connection.
pub async fn create_test_db() -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Memory);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database("Failed to open in-memory database", e))
}

/// Closes the database connection pool
pub async fn close(pool: DbPool) {
    pool.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::run_migrations;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_connect_creates_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talekeeper.db");

        let pool = connect(DatabaseConfig::new(path.to_str().unwrap()))
            .await
            .unwrap();

        assert!(path.exists());
        close(pool).await;
    }

    #[tokio::test]
    async fn test_on_disk_pool_uses_wal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("talekeeper.db");

        let pool = connect(DatabaseConfig::new(path.to_str().unwrap()))
            .await
            .unwrap();

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode;")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        close(pool).await;
    }

    #[tokio::test]
    async fn test_orphaned_child_rows_are_rejected() {
        let pool = create_test_db().await.unwrap();
        run_migrations(&pool).await.unwrap();

        // An author without its person row must fail, not insert silently;
        // the deletion processor depends on these constraints cascading.
        let result = sqlx::query(
            "INSERT INTO authors (id, source_id, person_id, name, inserted_at, updated_at)
             VALUES ('a1', 'server-1', 'missing', 'Nobody', 0, 0)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
        close(pool).await;
    }

    #[tokio::test]
    async fn test_config_builder() {
        let config = DatabaseConfig::new("test.db").with_max_connections(20);

        assert_eq!(config.path, "test.db");
        assert_eq!(config.max_connections, 20);
    }

    #[tokio::test]
    async fn test_config_default() {
        let config = DatabaseConfig::default();

        assert_eq!(config.path, "talekeeper.db");
        assert_eq!(config.max_connections, 5);
    }
}
